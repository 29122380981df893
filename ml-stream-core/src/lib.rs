//! Lazy, composable streaming pipelines for ML data
//!
//! A pipeline is built fluently from a leaf source and a chain of stages, then
//! pulled one element at a time. Nothing is constructed until the first pull.
//! Every stage can rewind to its first element and can record its exact
//! position on a [`Tape`] so that a freshly built pipeline resumes from it.
//!
//! ```
//! use ml_stream_core::{read_list, Data};
//!
//! let mut pipeline = read_list((0..10i64).map(Data::Int).collect())
//!     .filter(|d| Ok(d.as_int().unwrap_or(0) % 2 == 0))
//!     .bucket(2, false)
//!     .and_return()?;
//!
//! assert_eq!(pipeline.next()?, Some(Data::from(vec![Data::Int(0), Data::Int(2)])));
//! # Ok::<(), ml_stream_core::Error>(())
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod stages;
pub mod tape;

#[cfg(test)]
pub(crate) mod test_util;

// Re-export key types for convenience
pub use builder::PipelineBuilder;
pub use data::Data;
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use source::{BoxSource, Source, SourceFactory};
pub use stages::{read_list, round_robin, zip, ZipOptions};
pub use tape::{Tape, TapeValue};

static_assertions::assert_impl_all!(Pipeline: Send);
static_assertions::assert_impl_all!(PipelineBuilder: Send);
static_assertions::assert_impl_all!(Data: Send, Sync, Clone);
static_assertions::assert_impl_all!(Error: Send, Sync);
