use thiserror::Error;

pub type Result<T> = std::result::Result<T, MendError>;

/// Errors surfaced by the repair pipeline.
///
/// A `Structural` error means the file could not be scanned safely; the run
/// aborts before the final write so the file on disk stays byte-identical.
/// `line` values are 1-based, matching what editors display.
#[derive(Debug, Error)]
pub enum MendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("structural error at line {line}: {message}")]
    Structural { line: usize, message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("unknown profile: {name}")]
    UnknownProfile { name: String },

    #[error("repairs pending: {pending} correction(s) would be applied")]
    RepairsPending { pending: usize },
}

impl MendError {
    /// Process exit code for this error. Structural scan failures get a
    /// distinct code so callers can tell "this file is unbalanced" apart
    /// from ordinary failures.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Structural { .. } => 3,
            _ => 1,
        }
    }

    #[must_use]
    pub fn structural(line: usize, message: impl Into<String>) -> Self {
        Self::Structural {
            line,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
