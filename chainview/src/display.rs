//! Cosmetic display settings: zoom level and colour theme.

use derive_more::Display;

use crate::config::ChainConfig;

/// Preference key holding the theme.
pub const THEME_KEY: &str = "darkMode";

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Display)]
pub enum Theme {
    #[default]
    #[display("light")]
    Light,
    #[display("dark")]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Theme::Dark)
    }

    /// Stored form: `"true"` for dark.
    pub fn as_pref(&self) -> &'static str {
        if self.is_dark() { "true" } else { "false" }
    }

    pub fn from_pref(value: &str) -> Option<Self> {
        match value {
            "true" => Some(Theme::Dark),
            "false" => Some(Theme::Light),
            _ => None,
        }
    }
}

/// Zoom percentage clamped to a fixed range and moved in fixed steps.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Zoom {
    percent: u16,
    min: u16,
    max: u16,
    step: u16,
    default: u16,
}

impl Default for Zoom {
    fn default() -> Self {
        Self::from(&ChainConfig::default())
    }
}

impl From<&ChainConfig> for Zoom {
    fn from(config: &ChainConfig) -> Self {
        Self {
            percent: config.zoom_default,
            min: config.zoom_min,
            max: config.zoom_max,
            step: config.zoom_step.max(1),
            default: config.zoom_default,
        }
    }
}

impl Zoom {
    pub fn percent(&self) -> u16 {
        self.percent
    }

    pub fn factor(&self) -> f64 {
        f64::from(self.percent) / 100.0
    }

    pub fn set(&mut self, percent: u16) -> u16 {
        self.percent = percent.clamp(self.min, self.max);
        self.percent
    }

    pub fn zoom_in(&mut self) -> u16 {
        self.set(self.percent.saturating_add(self.step))
    }

    pub fn zoom_out(&mut self) -> u16 {
        self.set(self.percent.saturating_sub(self.step))
    }

    pub fn reset(&mut self) -> u16 {
        self.set(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_clamps() {
        struct TestCase {
            input: u16,
            expected: u16,
        }

        let tests = vec![
            TestCase {
                // TC0: within range
                input: 120,
                expected: 120,
            },
            TestCase {
                // TC1: below minimum
                input: 10,
                expected: 70,
            },
            TestCase {
                // TC2: above maximum
                input: 400,
                expected: 150,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut zoom = Zoom::default();
            assert_eq!(zoom.set(test.input), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_zoom_steps() {
        let mut zoom = Zoom::default();
        assert_eq!(zoom.zoom_in(), 102);
        zoom.set(149);
        assert_eq!(zoom.zoom_in(), 150);
        assert_eq!(zoom.zoom_in(), 150);
        zoom.set(71);
        assert_eq!(zoom.zoom_out(), 70);
        assert_eq!(zoom.reset(), 100);
        assert_eq!(zoom.factor(), 1.0);
    }

    #[test]
    fn test_theme_pref_round_trip() {
        assert_eq!(Theme::from_pref(Theme::Dark.as_pref()), Some(Theme::Dark));
        assert_eq!(Theme::from_pref("maybe"), None);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Dark.to_string(), "dark");
    }
}
