//! Leaf sources for ML data stream pipelines
//!
//! Each function here starts a [`PipelineBuilder`] whose source supports
//! reset and checkpointing like any other stage.

mod error;
mod list_files;
mod zipped_records;

pub use error::{Error, Result};
pub use list_files::{list_files, ListFilesSource};
pub use zipped_records::{read_zipped_records, ZippedRecordsSource};

// Re-export core types
pub use ml_stream_core::{Data, Pipeline, PipelineBuilder, Source, Tape};
