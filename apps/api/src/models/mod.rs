pub mod heartbeat;
pub mod interview;
pub mod report;
pub mod resume;
pub mod watch;

use thiserror::Error;

/// Raised when a status column holds a value the enum does not know.
#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl From<UnknownVariant> for crate::errors::AppError {
    fn from(err: UnknownVariant) -> Self {
        crate::errors::AppError::Internal(err.into())
    }
}
