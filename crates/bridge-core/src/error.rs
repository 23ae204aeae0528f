use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("register block length mismatch (expected {expected} words, got {actual})")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Failure that ends one polling cycle. Never escapes the cycle boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("failed to read {count} values at register {start_address}: {reason}")]
    Read {
        start_address: u16,
        count: u16,
        reason: String,
    },

    #[error("failed to publish value for address {address}: {reason}")]
    Publish { address: u32, reason: String },

    #[error("failed to upload log {object}: {reason}")]
    Upload { object: String, reason: String },
}

impl CycleError {
    /// Stable label for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Connection { .. } => "connection",
            CycleError::Read { .. } => "read",
            CycleError::Publish { .. } => "publish",
            CycleError::Upload { .. } => "upload",
        }
    }
}
