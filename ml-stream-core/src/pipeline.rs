//! Lazily materialized pipeline handle

use std::fmt;

use tracing::{debug, trace};

use crate::builder::PipelineBuilder;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::source::{BoxSource, Source, SourceFactory};
use crate::stages::{round_robin, zip, ZipOptions};
use crate::tape::Tape;

/// Materialization state of a pipeline; transitions only move forward
enum State {
    /// The source tree has not been built yet
    Unmaterialized(SourceFactory),

    /// The source tree is built and being consumed
    Materialized(BoxSource),

    /// A previous operation failed; the source tree has been dropped
    Broken,
}

/// A pull-based chain of sources producing a sequence of elements
///
/// The source tree is built on first use. Any error escaping an operation
/// leaves the pipeline permanently broken, and every later operation fails
/// with [`Error::Broken`] without touching the stages.
pub struct Pipeline {
    state: State,
}

impl Pipeline {
    pub(crate) fn new(factory: SourceFactory) -> Self {
        Self {
            state: State::Unmaterialized(factory),
        }
    }

    /// Pull the next element, or `None` at the end of the stream
    pub fn next(&mut self) -> Result<Option<Data>> {
        self.with_source(|source| source.next())
    }

    /// Rewind every stage to its first element
    ///
    /// A pipeline that has never been pulled is left untouched.
    pub fn reset(&mut self) -> Result<()> {
        match self.state {
            State::Unmaterialized(_) => Ok(()),
            State::Broken => Err(Error::Broken),
            State::Materialized(_) => {
                debug!("Resetting data pipeline");

                self.with_source(|source| source.reset())
            }
        }
    }

    /// Write the current position of every stage to `tape`
    pub fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        trace!("Recording data pipeline position");

        self.with_source(|source| source.record_position(tape))
    }

    /// Restore a position written by [`Pipeline::record_position`]
    ///
    /// The pipeline must have been built the same way as the one the position
    /// was recorded from.
    pub fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        trace!("Reloading data pipeline position");

        self.with_source(|source| source.reload_position(tape))
    }

    /// Record the current position as an encoded checkpoint
    pub fn save_checkpoint(&mut self) -> Result<Vec<u8>> {
        let mut tape = Tape::new();

        self.record_position(&mut tape)?;

        tape.to_bytes()
    }

    /// Restore a checkpoint produced by [`Pipeline::save_checkpoint`]
    pub fn load_checkpoint(&mut self, bytes: &[u8]) -> Result<()> {
        let mut tape = match Tape::from_bytes(bytes) {
            Ok(tape) => tape,
            Err(err) => {
                self.state = State::Broken;

                return Err(err);
            }
        };

        self.reload_position(&mut tape)
    }

    /// Whether a previous error has left this pipeline unusable
    pub fn is_broken(&self) -> bool {
        matches!(self.state, State::Broken)
    }

    /// Whether the source tree has been built
    pub fn is_materialized(&self) -> bool {
        matches!(self.state, State::Materialized(_))
    }

    /// Combine the elements of several pipelines position by position
    pub fn zip(pipelines: Vec<Pipeline>, options: ZipOptions) -> PipelineBuilder {
        zip(pipelines, options)
    }

    /// Interleave several pipelines, one element from each in turn
    pub fn round_robin(pipelines: Vec<Pipeline>) -> PipelineBuilder {
        round_robin(pipelines)
    }

    /// Give up the handle and hand over its source tree, building it if needed
    pub(crate) fn into_source(self) -> Result<BoxSource> {
        match self.state {
            State::Unmaterialized(factory) => factory(),
            State::Materialized(source) => Ok(source),
            State::Broken => Err(Error::Broken),
        }
    }

    fn ensure_materialized(&mut self) -> Result<()> {
        // The state stays `Broken` if the factory fails.
        match std::mem::replace(&mut self.state, State::Broken) {
            State::Unmaterialized(factory) => {
                debug!("Materializing data pipeline");

                self.state = State::Materialized(factory()?);
            }
            State::Materialized(source) => self.state = State::Materialized(source),
            State::Broken => return Err(Error::Broken),
        }

        Ok(())
    }

    fn with_source<T>(&mut self, op: impl FnOnce(&mut dyn Source) -> Result<T>) -> Result<T> {
        self.ensure_materialized()?;

        let State::Materialized(source) = &mut self.state else {
            return Err(Error::Broken);
        };

        let result = op(source.as_mut());

        if let Err(err) = &result {
            debug!(error = %err, "Data pipeline is broken");

            self.state = State::Broken;
        }

        result
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Unmaterialized(_) => "unmaterialized",
            State::Materialized(_) => "materialized",
            State::Broken => "broken",
        };

        f.debug_struct("Pipeline").field("state", &state).finish()
    }
}
