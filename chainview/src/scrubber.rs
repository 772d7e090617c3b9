//! Historical playback state machine.
//!
//! The scrubber never touches a timer itself. Every transition returns a [`PlaybackEvent`] naming
//! the minute to render and how the caller should adjust the playback task.

use std::time::Duration;

use derive_more::Display;
use tracing::{debug, info, warn};

use crate::history::{SESSION_MINUTES, session_clock};

/// Accepted playback speed multipliers.
pub const SPEEDS: [u32; 4] = [1, 2, 5, 10];

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// What the caller must do with the recurring playback task.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TimerChange {
    Keep,
    /// (Re)start the advance task with this period.
    Start(Duration),
    Cancel,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PlaybackEvent {
    /// Minute to render, if the transition changed anything visible.
    pub render: Option<usize>,
    pub timer: TimerChange,
}

impl PlaybackEvent {
    const NONE: PlaybackEvent = PlaybackEvent {
        render: None,
        timer: TimerChange::Keep,
    };

    fn new(render: usize, timer: TimerChange) -> Self {
        Self {
            render: Some(render),
            timer,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scrubber {
    state: PlaybackState,
    minute: usize,
    speed: u32,
    session_minutes: usize,
}

impl Default for Scrubber {
    fn default() -> Self {
        Self::new(SESSION_MINUTES)
    }
}

impl Scrubber {
    pub fn new(session_minutes: usize) -> Self {
        Self {
            state: PlaybackState::Stopped,
            minute: 0,
            speed: 1,
            session_minutes: session_minutes.max(1),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn minute(&self) -> usize {
        self.minute
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn last_minute(&self) -> usize {
        self.session_minutes - 1
    }

    /// Advance period for the current speed: `1000 / speed` ms.
    pub fn step_period(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.speed))
    }

    /// 12-hour session clock label, e.g. `09:15 AM`.
    pub fn time_label(&self) -> String {
        let (hour, minute) = session_clock(self.minute);
        let am_pm = if hour >= 12 { "PM" } else { "AM" };
        let hour12 = if hour > 12 { hour - 12 } else { hour };
        format!("{hour12:02}:{minute:02} {am_pm}")
    }

    pub fn play(&mut self) -> PlaybackEvent {
        match self.state {
            PlaybackState::Playing => PlaybackEvent::NONE,
            PlaybackState::Stopped | PlaybackState::Paused => {
                self.state = PlaybackState::Playing;
                info!(minute = self.minute, speed = self.speed, "playback started");
                PlaybackEvent::new(self.minute, TimerChange::Start(self.step_period()))
            }
        }
    }

    pub fn pause(&mut self) -> PlaybackEvent {
        match self.state {
            PlaybackState::Playing => {
                self.state = PlaybackState::Paused;
                info!(minute = self.minute, "playback paused");
                PlaybackEvent::new(self.minute, TimerChange::Cancel)
            }
            PlaybackState::Stopped | PlaybackState::Paused => PlaybackEvent::NONE,
        }
    }

    /// Reset to the session open from any state.
    pub fn stop(&mut self) -> PlaybackEvent {
        self.state = PlaybackState::Stopped;
        self.minute = 0;
        info!("playback stopped");
        PlaybackEvent::new(0, TimerChange::Cancel)
    }

    /// Jump to `minute`, clamped to the session. Play state is unchanged.
    pub fn seek(&mut self, minute: usize) -> PlaybackEvent {
        let clamped = minute.min(self.last_minute());
        if clamped != minute {
            debug!(requested = minute, clamped, "seek clamped to session");
        }
        self.minute = clamped;
        PlaybackEvent::new(clamped, TimerChange::Keep)
    }

    /// Advance task body. Reaching the end of the session stops playback.
    pub fn advance(&mut self) -> PlaybackEvent {
        if self.state != PlaybackState::Playing {
            return PlaybackEvent::NONE;
        }
        self.minute += 1;
        if self.minute >= self.session_minutes {
            info!("playback reached end of session");
            return self.stop();
        }
        PlaybackEvent::new(self.minute, TimerChange::Keep)
    }

    pub fn set_speed(&mut self, speed: u32) -> PlaybackEvent {
        if !SPEEDS.contains(&speed) {
            warn!(speed, "ignoring unsupported playback speed");
            return PlaybackEvent::NONE;
        }
        self.speed = speed;
        match self.state {
            PlaybackState::Playing => PlaybackEvent {
                render: None,
                timer: TimerChange::Start(self.step_period()),
            },
            PlaybackState::Stopped | PlaybackState::Paused => PlaybackEvent::NONE,
        }
    }

    /// Next faster (or slower) supported speed, saturating at the ends.
    pub fn cycle_speed(&mut self, faster: bool) -> PlaybackEvent {
        let index = SPEEDS.iter().position(|&s| s == self.speed).unwrap_or(0);
        let next = if faster {
            (index + 1).min(SPEEDS.len() - 1)
        } else {
            index.saturating_sub(1)
        };
        if next == index {
            return PlaybackEvent::NONE;
        }
        self.set_speed(SPEEDS[next])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_clamps_to_session() {
        let mut scrubber = Scrubber::default();
        let event = scrubber.seek(500);
        assert_eq!(scrubber.minute(), 389);
        assert_eq!(event.render, Some(389));
        assert_eq!(scrubber.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_play_then_stop_resets() {
        let mut scrubber = Scrubber::default();
        scrubber.seek(120);
        let event = scrubber.play();
        assert_eq!(event.timer, TimerChange::Start(Duration::from_millis(1000)));
        scrubber.advance();
        assert_eq!(scrubber.minute(), 121);

        let event = scrubber.stop();
        assert_eq!(event, PlaybackEvent::new(0, TimerChange::Cancel));
        assert_eq!(scrubber.minute(), 0);
        assert_eq!(scrubber.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_transitions() {
        struct TestCase {
            action: fn(&mut Scrubber) -> PlaybackEvent,
            expected_state: PlaybackState,
            expected_timer: TimerChange,
        }

        // Applied in sequence to one scrubber.
        let tests = vec![
            TestCase {
                // TC0: pause while stopped is a no-op
                action: Scrubber::pause,
                expected_state: PlaybackState::Stopped,
                expected_timer: TimerChange::Keep,
            },
            TestCase {
                // TC1: play from stopped
                action: Scrubber::play,
                expected_state: PlaybackState::Playing,
                expected_timer: TimerChange::Start(Duration::from_millis(1000)),
            },
            TestCase {
                // TC2: play while playing is a no-op
                action: Scrubber::play,
                expected_state: PlaybackState::Playing,
                expected_timer: TimerChange::Keep,
            },
            TestCase {
                // TC3: pause while playing
                action: Scrubber::pause,
                expected_state: PlaybackState::Paused,
                expected_timer: TimerChange::Cancel,
            },
            TestCase {
                // TC4: advance while paused does nothing
                action: Scrubber::advance,
                expected_state: PlaybackState::Paused,
                expected_timer: TimerChange::Keep,
            },
            TestCase {
                // TC5: resume from paused
                action: Scrubber::play,
                expected_state: PlaybackState::Playing,
                expected_timer: TimerChange::Start(Duration::from_millis(1000)),
            },
            TestCase {
                // TC6: stop from playing
                action: Scrubber::stop,
                expected_state: PlaybackState::Stopped,
                expected_timer: TimerChange::Cancel,
            },
        ];

        let mut scrubber = Scrubber::default();
        for (index, test) in tests.into_iter().enumerate() {
            let event = (test.action)(&mut scrubber);
            assert_eq!(scrubber.state(), test.expected_state, "TC{} failed", index);
            assert_eq!(event.timer, test.expected_timer, "TC{} failed", index);
        }
    }

    #[test]
    fn test_advance_past_end_stops() {
        let mut scrubber = Scrubber::default();
        scrubber.seek(389);
        scrubber.play();
        let event = scrubber.advance();
        assert_eq!(event, PlaybackEvent::new(0, TimerChange::Cancel));
        assert_eq!(scrubber.state(), PlaybackState::Stopped);
        assert_eq!(scrubber.minute(), 0);
    }

    #[test]
    fn test_set_speed() {
        let mut scrubber = Scrubber::default();
        assert_eq!(scrubber.set_speed(3), PlaybackEvent::NONE);
        assert_eq!(scrubber.speed(), 1);

        assert_eq!(scrubber.set_speed(5).timer, TimerChange::Keep);
        assert_eq!(scrubber.step_period(), Duration::from_millis(200));

        scrubber.play();
        assert_eq!(
            scrubber.set_speed(10).timer,
            TimerChange::Start(Duration::from_millis(100))
        );
        assert_eq!(scrubber.cycle_speed(true).timer, TimerChange::Keep);
        assert_eq!(scrubber.speed(), 10);
        scrubber.cycle_speed(false);
        assert_eq!(scrubber.speed(), 5);
    }

    #[test]
    fn test_time_label() {
        struct TestCase {
            input: usize,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: session open
                input: 0,
                expected: "09:15 AM",
            },
            TestCase {
                // TC1: minute field past 59 stays in the morning
                input: 165,
                expected: "11:60 AM",
            },
            TestCase {
                // TC2: noon hour keeps 12
                input: 180,
                expected: "12:15 PM",
            },
            TestCase {
                // TC3: afternoon
                input: 389,
                expected: "03:44 PM",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut scrubber = Scrubber::default();
            scrubber.seek(test.input);
            assert_eq!(scrubber.time_label(), test.expected, "TC{} failed", index);
        }
    }
}
