use std::str::FromStr;

use thiserror::Error;

/// What the step loop does when an action's `execute` returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and treat the step as done.
    #[default]
    ContinueOnError,
    /// Log the failure, cancel the verb and return the error to the caller.
    AbortOnError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown failure policy '{0}' (expected continue|abort)")]
pub struct ParseFailurePolicyError(String);

impl FromStr for FailurePolicy {
    type Err = ParseFailurePolicyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::ContinueOnError),
            "abort" => Ok(FailurePolicy::AbortOnError),
            _ => Err(ParseFailurePolicyError(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub failure_policy: FailurePolicy,
}
