//! Deterministic sharding

use crate::data::Data;
use crate::error::Result;
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Keeps the elements whose ordinal position modulo `num_shards` is `shard_idx`
pub struct ShardSource {
    inner: BoxSource,
    shard_idx: usize,
    num_shards: usize,

    /// Ordinal position of the next upstream element
    position: usize,
}

impl ShardSource {
    /// Keep shard `shard_idx` of `num_shards`
    pub fn new(inner: BoxSource, shard_idx: usize, num_shards: usize) -> Self {
        Self {
            inner,
            shard_idx,
            num_shards,
            position: 0,
        }
    }
}

impl Source for ShardSource {
    fn next(&mut self) -> Result<Option<Data>> {
        while let Some(example) = self.inner.next()? {
            let position = self.position;

            self.position += 1;

            if position % self.num_shards == self.shard_idx {
                return Ok(Some(example));
            }
        }

        Ok(None)
    }

    fn reset(&mut self) -> Result<()> {
        self.position = 0;

        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(self.position);

        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.position = tape.read()?;

        self.inner.reload_position(tape)
    }
}
