use smol_str::SmolStr;
use thiserror::Error;

/// All errors generated in `chainview`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("missing data: {0}")]
    MissingData(MissingData),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("presentation collaborator unavailable: {0}")]
    PresentationUnavailable(&'static str),

    #[error("preference store failure: {0}")]
    Preferences(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// What was looked up and not found.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MissingData {
    #[error("symbol {0} not present in quote store")]
    Symbol(SmolStr),

    #[error("strike {strike} not present for {symbol}")]
    Strike { symbol: SmolStr, strike: f64 },

    #[error("minute {minute} outside generated session for {symbol}")]
    Minute { symbol: SmolStr, minute: usize },

    #[error("no historical session generated for {0}")]
    History(SmolStr),

    #[error("expiry {expiry} not listed for {symbol}")]
    Expiry { symbol: SmolStr, expiry: String },

    #[error("quote store is empty")]
    EmptyStore,
}

impl From<MissingData> for ChainError {
    fn from(value: MissingData) -> Self {
        Self::MissingData(value)
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(value: serde_json::Error) -> Self {
        Self::Preferences(value.to_string())
    }
}

impl From<std::io::Error> for ChainError {
    fn from(value: std::io::Error) -> Self {
        Self::Preferences(value.to_string())
    }
}

impl ChainError {
    /// Determine if the application can continue after this error by regenerating, falling back
    /// to a previous snapshot, or skipping the affected feature.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_recoverable(&self) -> bool {
        match self {
            ChainError::Config(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_error_is_recoverable() {
        struct TestCase {
            input: ChainError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: missing symbol is recovered by regeneration
                input: ChainError::from(MissingData::Symbol(SmolStr::new("NIFTY"))),
                expected: true,
            },
            TestCase {
                // TC1: malformed snapshot is recovered by keeping the previous render
                input: ChainError::MalformedSnapshot("empty strike ladder".to_string()),
                expected: true,
            },
            TestCase {
                // TC2: absent chart widget degrades silently
                input: ChainError::PresentationUnavailable("chart"),
                expected: true,
            },
            TestCase {
                // TC3: preference i/o failure degrades silently
                input: ChainError::from(std::io::Error::other("disk full")),
                expected: true,
            },
            TestCase {
                // TC4: invalid configuration is not recoverable
                input: ChainError::Config("strike_interval must be positive".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_recoverable();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_missing_data_display() {
        let error = ChainError::from(MissingData::Minute {
            symbol: SmolStr::new("BANKNIFTY"),
            minute: 400,
        });
        assert_eq!(
            error.to_string(),
            "missing data: minute 400 outside generated session for BANKNIFTY"
        );
    }
}
