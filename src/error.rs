use thiserror::Error;

/// The crate-wide error type. Every fatal condition described by the
/// configuration, loader or engine construction surfaces as one of
/// these; transient conditions (idempotent state transitions, zoom
/// bounds) are logged via `tracing::warn!` at the call site instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("validation failed: {0}")]
    ValidationFailure(String),

    #[error("runtime misconfiguration: {0}")]
    RuntimeMisconfig(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoFailure(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ConfigInvalid(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::ValidationFailure(err.to_string())
    }
}
