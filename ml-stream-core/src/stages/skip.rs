//! Prefix skipping

use crate::data::Data;
use crate::error::Result;
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Drops a fixed number of leading elements
pub struct SkipSource {
    inner: BoxSource,
    num_examples: usize,

    /// Elements dropped so far
    skipped: usize,
}

impl SkipSource {
    /// Drop the first `num_examples` elements of `inner`
    pub fn new(inner: BoxSource, num_examples: usize) -> Self {
        Self {
            inner,
            num_examples,
            skipped: 0,
        }
    }
}

impl Source for SkipSource {
    fn next(&mut self) -> Result<Option<Data>> {
        while self.skipped < self.num_examples {
            if self.inner.next()?.is_none() {
                return Ok(None);
            }

            self.skipped += 1;
        }

        self.inner.next()
    }

    fn reset(&mut self) -> Result<()> {
        self.skipped = 0;

        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(self.skipped);

        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.skipped = tape.read()?;

        self.inner.reload_position(tape)
    }
}
