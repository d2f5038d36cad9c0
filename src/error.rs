use thiserror::Error;

use crate::StrategyKind;

pub const ALL_STRATEGIES_FAILED: &str = "All strategies failed. Try again later.";
pub const SUMMARIZATION_FAILED: &str = "Summarization failed.";

/// A failed acquisition attempt, absorbed by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub kind: StrategyKind,
    pub label: String,
    pub cause: String,
}

impl std::fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.label, self.cause)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    StrategyFailed(StrategyFailure),

    #[error("{message}")]
    AllStrategiesExhausted {
        message: String,
        failures: Vec<StrategyFailure>,
    },

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("{0} environment variable not set")]
    ConfigMissing(String),
}

impl Error {
    /// Message safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Error::SummarizationFailed(_) => SUMMARIZATION_FAILED.to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarization_failure_is_generic_for_users() {
        let err = Error::SummarizationFailed("Gemini API returned 500: boom".to_string());
        assert_eq!(err.user_message(), SUMMARIZATION_FAILED);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_exhausted_message_is_verbatim() {
        let err = Error::AllStrategiesExhausted {
            message: ALL_STRATEGIES_FAILED.to_string(),
            failures: vec![],
        };
        assert_eq!(err.user_message(), ALL_STRATEGIES_FAILED);
    }

    #[test]
    fn test_strategy_failure_display() {
        let failure = StrategyFailure {
            kind: StrategyKind::Proxied,
            label: "proxied(http://10.0.0.1:3128)".to_string(),
            cause: "connection refused".to_string(),
        };
        assert_eq!(failure.to_string(), "proxied(http://10.0.0.1:3128) failed: connection refused");
    }
}
