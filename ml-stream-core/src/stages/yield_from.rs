//! Sub-pipeline expansion

use super::YieldFn;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Replaces each upstream element with the full output of a pipeline built from it
pub struct YieldFromSource {
    inner: BoxSource,
    yield_fn: YieldFn,

    /// The upstream element being expanded and its sub-pipeline
    current: Option<(Data, Pipeline)>,
}

impl YieldFromSource {
    /// Expand every element of `inner` with `yield_fn`
    pub fn new(inner: BoxSource, yield_fn: YieldFn) -> Self {
        Self {
            inner,
            yield_fn,
            current: None,
        }
    }

    fn build(&self, example: &Data) -> Result<Pipeline> {
        (self.yield_fn)(example)
            .map_err(|err| Error::from_callback("The yield_from function has failed.", err, Some(example.clone())))
    }
}

impl Source for YieldFromSource {
    fn next(&mut self) -> Result<Option<Data>> {
        loop {
            if let Some((example, pipeline)) = self.current.as_mut() {
                match pipeline.next() {
                    Ok(Some(output)) => return Ok(Some(output)),
                    Ok(None) => {}
                    Err(err) => {
                        return Err(Error::nested(
                            "The sub-pipeline of yield_from has failed.",
                            err,
                            Some(example.clone()),
                        ))
                    }
                }

                self.current = None;
            }

            let Some(example) = self.inner.next()? else {
                return Ok(None);
            };

            let pipeline = self.build(&example)?;

            self.current = Some((example, pipeline));
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.current = None;

        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        match self.current.as_mut() {
            Some((example, pipeline)) => {
                let mut child = Tape::new();

                pipeline.record_position(&mut child)?;

                tape.record(Some(example.clone()));
                tape.record_tape(child);
            }
            None => tape.record::<Option<Data>>(None),
        }

        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.current = None;

        if let Some(example) = tape.read::<Option<Data>>()? {
            let mut pipeline = self.build(&example)?;

            let mut child = tape.read_tape()?;

            pipeline.reload_position(&mut child)?;

            self.current = Some((example, pipeline));
        }

        self.inner.reload_position(tape)
    }
}
