//! Error types for ML data streams

use std::io;
use thiserror::Error;

use crate::data::Data;

/// Result type for data pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed lower-level failure wrapped by a pipeline error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for data pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// A stage failed, optionally on one specific element
    #[error("{message}")]
    Pipeline {
        /// Human-readable description of the failure
        message: String,

        /// The element the failure is attributable to, if any
        example: Option<Data>,

        /// The lower-level failure, if any
        #[source]
        source: Option<BoxError>,
    },

    /// The pipeline was broken by an earlier error
    #[error("The data pipeline is broken by a previous operation and cannot be used.")]
    Broken,

    /// A checkpoint tape could not be read back
    #[error("Corrupt checkpoint tape: {0}")]
    CorruptTape(String),

    /// Invalid argument passed to a builder
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error from a leaf source
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error while encoding a tape
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Worker pool or thread could not be created or died
    #[error("Resource error: {0}")]
    Resource(String),
}

impl Error {
    /// Create a pipeline error without a lower-level cause
    pub fn pipeline(message: impl Into<String>, example: Option<Data>) -> Self {
        Error::Pipeline {
            message: message.into(),
            example,
            source: None,
        }
    }

    /// Wrap a lower-level failure in a pipeline error
    ///
    /// If `inner` is itself a pipeline error that carries an element, that
    /// element is kept; otherwise `example` is attached.
    pub fn nested(message: impl Into<String>, inner: impl Into<BoxError>, example: Option<Data>) -> Self {
        let inner = inner.into();

        let example = match inner.downcast_ref::<Error>() {
            Some(Error::Pipeline { example: inner_example, .. }) if inner_example.is_some() => {
                inner_example.clone()
            }
            _ => example,
        };

        Error::Pipeline {
            message: message.into(),
            example,
            source: Some(inner),
        }
    }

    /// Wrap a failure returned by a user callback
    pub(crate) fn from_callback(message: impl Into<String>, inner: anyhow::Error, example: Option<Data>) -> Self {
        let inner: BoxError = match inner.downcast::<Error>() {
            Ok(err) => Box::new(err),
            Err(other) => other.into(),
        };

        Self::nested(message, inner, example)
    }

    /// The element this error is attributable to, if known
    pub fn example(&self) -> Option<&Data> {
        match self {
            Error::Pipeline { example, .. } => example.as_ref(),
            _ => None,
        }
    }

    /// Whether this error reports an already broken pipeline
    pub fn is_broken(&self) -> bool {
        matches!(self, Error::Broken)
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Error::CorruptTape(message.into())
    }
}
