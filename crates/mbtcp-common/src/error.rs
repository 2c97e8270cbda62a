use thiserror::Error;

/// Slave error types covering configuration and transport setup.
///
/// The request path never produces these: a rejected frame is reported
/// as a zero-length poll result, not as an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SlaveError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Listener or connection setup failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O operation error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SlaveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Convenience type alias for slave operations.
pub type SlaveResult<T> = Result<T, SlaveError>;
