use serde::{Serialize, Deserialize};
use thiserror::Error;

pub mod gpio;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HalErrorKind {
    /// The driver could not reach the line (not exported, permission denied, ...)
    Io,

    /// Invalid GPIO mode
    /// Used when a line is driven or sampled in a mode that does not allow it
    InvalidGpioMode,

    /// The line does not exist on this driver
    LineUnavailable,

    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HalError {
    kind: HalErrorKind,
    message: String,
}

impl HalError {
    pub fn new(kind: HalErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> HalErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type HalResult<T> = Result<T, HalError>;
