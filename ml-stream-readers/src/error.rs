//! Error types for leaf sources

use thiserror::Error;

/// Error type for leaf sources
#[derive(Error, Debug)]
pub enum Error {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] ml_stream_core::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Zip archive error
    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for leaf sources
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for ml_stream_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(err) => err,
            Error::Io(err) => ml_stream_core::Error::Io(err),
            Error::InvalidArgument(message) => ml_stream_core::Error::InvalidArgument(message),
            other => ml_stream_core::Error::nested("The leaf source has failed.", other, None),
        }
    }
}
