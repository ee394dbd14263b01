use std::error::Error;
use std::fmt;
use std::fmt::Formatter;
use serde::Serialize;

/// Why an attempt at a step failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureCause {
    /// The output was generated but the named validators rejected it
    Validation { failed_validators: Vec<String> },
    /// The text generator returned an error
    Generation(String),
    /// The step's template could not be completed with the current input
    Render(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Validation { failed_validators } => write!(f, "failed {} validation", failed_validators.join(", ")),
            FailureCause::Generation(message) => write!(f, "generation error: {}", message),
            FailureCause::Render(message) => write!(f, "template error: {}", message),
        }
    }
}

/// A sequential step that used up its attempts. Ends the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// 1-indexed
    pub step: usize,
    pub attempts: u32,
    /// Cause of the last attempt
    pub cause: FailureCause,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Chain failed at step {} after {} attempts: {}", self.step, self.attempts, self.cause)
    }
}

impl Error for StepFailure {}

#[cfg(test)]
mod test_errors {
    use super::{FailureCause, StepFailure};

    #[test]
    fn test_display() {
        let failure = StepFailure {
            step: 2,
            attempts: 3,
            cause: FailureCause::Validation { failed_validators: vec!["json".to_string(), "length".to_string()] },
        };
        assert_eq!(failure.to_string(), "Chain failed at step 2 after 3 attempts: failed json, length validation");

        let failure = StepFailure { step: 1, attempts: 1, cause: FailureCause::Generation("connection reset".to_string()) };
        assert_eq!(failure.to_string(), "Chain failed at step 1 after 1 attempts: generation error: connection reset");
    }
}
