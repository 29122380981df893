//! Fixed-size batching

use crate::data::Data;
use crate::error::Result;
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Groups consecutive elements into lists of a fixed size
pub struct BucketSource {
    inner: BoxSource,
    bucket_size: usize,
    drop_remainder: bool,

    /// Elements of the batch being filled
    buffer: Vec<Data>,
}

impl BucketSource {
    /// Batch `inner` into lists of `bucket_size`
    pub fn new(inner: BoxSource, bucket_size: usize, drop_remainder: bool) -> Self {
        Self {
            inner,
            bucket_size,
            drop_remainder,
            buffer: Vec::with_capacity(bucket_size),
        }
    }
}

impl Source for BucketSource {
    fn next(&mut self) -> Result<Option<Data>> {
        while self.buffer.len() < self.bucket_size {
            match self.inner.next()? {
                Some(example) => self.buffer.push(example),
                None => break,
            }
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }

        if self.buffer.len() < self.bucket_size && self.drop_remainder {
            self.buffer.clear();

            return Ok(None);
        }

        let bucket = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.bucket_size));

        Ok(Some(Data::List(bucket)))
    }

    fn reset(&mut self) -> Result<()> {
        self.buffer.clear();

        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(self.buffer.clone());

        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.buffer = tape.read()?;

        self.inner.reload_position(tape)
    }
}
