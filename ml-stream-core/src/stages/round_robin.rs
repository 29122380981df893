//! Cyclic interleaving of several pipelines

use super::{into_sources, record_sources, reload_sources};
use crate::builder::PipelineBuilder;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Takes one element from each live source in turn
pub struct RoundRobinSource {
    sources: Vec<BoxSource>,

    /// Index of the pipeline to pull next
    cursor: usize,

    /// Sources that have reached the end of their stream
    exhausted: Vec<bool>,
}

impl RoundRobinSource {
    /// Interleave `sources`, starting with the first
    pub fn new(sources: Vec<BoxSource>) -> Self {
        let exhausted = vec![false; sources.len()];

        Self {
            sources,
            cursor: 0,
            exhausted,
        }
    }
}

impl Source for RoundRobinSource {
    fn next(&mut self) -> Result<Option<Data>> {
        let num_sources = self.sources.len();

        for _ in 0..num_sources {
            let idx = self.cursor;

            self.cursor = (idx + 1) % num_sources;

            if self.exhausted[idx] {
                continue;
            }

            match self.sources[idx].next() {
                Ok(Some(example)) => return Ok(Some(example)),
                Ok(None) => self.exhausted[idx] = true,
                Err(err) => {
                    return Err(Error::nested(
                        format!("The data pipeline #{idx} has failed."),
                        err,
                        None,
                    ))
                }
            }
        }

        Ok(None)
    }

    fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        self.exhausted.fill(false);

        for source in &mut self.sources {
            source.reset()?;
        }

        Ok(())
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(self.cursor);
        tape.record(self.exhausted.clone());

        record_sources(&mut self.sources, tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        let cursor: usize = tape.read()?;
        let exhausted: Vec<bool> = tape.read()?;

        if exhausted.len() != self.sources.len() || (cursor >= self.sources.len() && !self.sources.is_empty()) {
            return Err(Error::corrupt("the round robin position does not match its pipelines"));
        }

        self.cursor = cursor;
        self.exhausted = exhausted;

        reload_sources(&mut self.sources, tape)
    }
}

/// Interleave `pipelines` one element at a time
///
/// Pipelines that end early are skipped; the output ends when every pipeline
/// has ended.
pub fn round_robin(pipelines: Vec<Pipeline>) -> PipelineBuilder {
    PipelineBuilder::new(move || Ok(Box::new(RoundRobinSource::new(into_sources(pipelines)?))))
}
