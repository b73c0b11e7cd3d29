//! Error categories shared by every subsystem error type.

use std::fmt;

use serde::Serialize;

/// How a caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient; trying again later may succeed.
    Retryable,
    /// Retrying will not help.
    Terminal,
    /// Progress needs a person (CAPTCHA, credentials).
    RequiresHuman,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::Terminal => "terminal",
            Self::RequiresHuman => "requires_human",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
