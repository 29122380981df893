//! Predicate filtering

use super::PredicateFn;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Skips elements rejected by a predicate
pub struct FilterSource {
    inner: BoxSource,
    predicate: PredicateFn,
}

impl FilterSource {
    /// Keep the elements of `inner` accepted by `predicate`
    pub fn new(inner: BoxSource, predicate: PredicateFn) -> Self {
        Self { inner, predicate }
    }
}

impl Source for FilterSource {
    fn next(&mut self) -> Result<Option<Data>> {
        while let Some(example) = self.inner.next()? {
            match (self.predicate)(&example) {
                Ok(true) => return Ok(Some(example)),
                Ok(false) => {}
                Err(err) => {
                    return Err(Error::from_callback(
                        "The filter predicate has failed.",
                        err,
                        Some(example),
                    ))
                }
            }
        }

        Ok(None)
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.inner.reload_position(tape)
    }
}
