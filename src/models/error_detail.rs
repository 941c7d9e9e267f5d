use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SonaLinkError;

/// Code/message pair carried by status updates and diagnostic events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable machine-readable code (e.g. `SERVICE_UNREACHABLE`).
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

impl ErrorDetail {
    /// Create a new error detail.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&SonaLinkError> for ErrorDetail {
    fn from(err: &SonaLinkError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
