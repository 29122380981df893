//! Length-aware batching

use tracing::warn;

use super::LengthFn;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// One length range and the batch being filled for it
struct Bucket {
    size: usize,
    max_length: usize,
    examples: Vec<Data>,
}

/// Routes elements to buckets by length and emits each bucket once full
pub struct BucketByLengthSource {
    inner: BoxSource,

    /// Sorted by ascending `max_length`
    buckets: Vec<Bucket>,
    length_fn: LengthFn,
    drop_remainder: bool,
    warn_only: bool,

    /// Set once the upstream source is exhausted and partial buckets drain
    exhausted: bool,
}

impl BucketByLengthSource {
    /// Route `inner` into buckets given as `(bucket_size, max_length)` pairs
    pub fn new(
        inner: BoxSource,
        mut bucket_sizes: Vec<(usize, usize)>,
        length_fn: LengthFn,
        drop_remainder: bool,
        warn_only: bool,
    ) -> Self {
        bucket_sizes.sort_by_key(|&(_, max_length)| max_length);

        let buckets = bucket_sizes
            .into_iter()
            .map(|(size, max_length)| Bucket {
                size,
                max_length,
                examples: Vec::with_capacity(size),
            })
            .collect();

        Self {
            inner,
            buckets,
            length_fn,
            drop_remainder,
            warn_only,
            exhausted: false,
        }
    }

    /// Index of the bucket an element of `length` belongs to
    fn route(&self, length: usize) -> Option<usize> {
        self.buckets.iter().position(|bucket| length <= bucket.max_length)
    }

    fn max_length(&self) -> usize {
        self.buckets.last().map_or(0, |bucket| bucket.max_length)
    }

    /// Handle an element that cannot be bucketed
    fn reject(&self, err: Error) -> Result<()> {
        if self.warn_only {
            warn!(error = %err, example = ?err.example(), "Skipping example in bucket_by_length");

            return Ok(());
        }

        Err(err)
    }
}

impl Source for BucketByLengthSource {
    fn next(&mut self) -> Result<Option<Data>> {
        while !self.exhausted {
            let Some(example) = self.inner.next()? else {
                self.exhausted = true;
                break;
            };

            let length = match (self.length_fn)(&example) {
                Ok(length) => length,
                Err(err) => {
                    self.reject(Error::from_callback(
                        "The length function of bucket_by_length has failed.",
                        err,
                        Some(example),
                    ))?;
                    continue;
                }
            };

            let Some(idx) = self.route(length) else {
                let message = format!(
                    "The length of the example is {length}, which exceeds the maximum bucket length {}.",
                    self.max_length()
                );

                self.reject(Error::pipeline(message, Some(example)))?;
                continue;
            };

            let bucket = &mut self.buckets[idx];

            bucket.examples.push(example);

            if bucket.examples.len() >= bucket.size {
                let examples = std::mem::replace(&mut bucket.examples, Vec::with_capacity(bucket.size));

                return Ok(Some(Data::List(examples)));
            }
        }

        if self.drop_remainder {
            for bucket in &mut self.buckets {
                bucket.examples.clear();
            }

            return Ok(None);
        }

        let partial = self.buckets.iter_mut().find(|bucket| !bucket.examples.is_empty());

        Ok(partial.map(|bucket| Data::List(std::mem::take(&mut bucket.examples))))
    }

    fn reset(&mut self) -> Result<()> {
        for bucket in &mut self.buckets {
            bucket.examples.clear();
        }

        self.exhausted = false;

        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        for bucket in &self.buckets {
            tape.record(bucket.examples.clone());
        }

        tape.record(self.exhausted);

        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        for bucket in &mut self.buckets {
            let examples: Vec<Data> = tape.read()?;

            if examples.len() >= bucket.size {
                return Err(Error::corrupt(format!(
                    "a bucket of size {} cannot hold {} pending examples",
                    bucket.size,
                    examples.len()
                )));
            }

            bucket.examples = examples;
        }

        self.exhausted = tape.read()?;

        self.inner.reload_position(tape)
    }
}

#[cfg(test)]
mod tests {
    use crate::data::Data;
    use crate::error::Error;
    use crate::stages::read_list;
    use crate::test_util::{drain, strings};

    fn text_len(example: &Data) -> anyhow::Result<usize> {
        example.as_str().map(str::len).ok_or_else(|| anyhow::anyhow!("not a string"))
    }

    #[test]
    fn test_routes_by_length() {
        let input = strings(&["a", "bbbb", "cc", "dddd", "e", "ff"]);

        let mut pipeline = read_list(input)
            .bucket_by_length(vec![(3, 2), (2, 4)], text_len, false, false)
            .and_return()
            .unwrap();

        let output = drain(&mut pipeline);

        assert_eq!(
            output,
            vec![
                Data::List(strings(&["bbbb", "dddd"])),
                Data::List(strings(&["a", "cc", "e"])),
                Data::List(strings(&["ff"])),
            ]
        );
    }

    #[test]
    fn test_drop_remainder() {
        let input = strings(&["a", "bb", "c"]);

        let mut pipeline = read_list(input)
            .bucket_by_length(vec![(2, 4)], text_len, true, false)
            .and_return()
            .unwrap();

        assert_eq!(drain(&mut pipeline), vec![Data::List(strings(&["a", "bb"]))]);
    }

    #[test]
    fn test_too_long_is_fatal_with_example() {
        let input = strings(&["a", "toolong"]);

        let mut pipeline = read_list(input)
            .bucket_by_length(vec![(2, 4)], text_len, false, false)
            .and_return()
            .unwrap();

        let err = pipeline.next().unwrap_err();

        assert!(matches!(err, Error::Pipeline { .. }));
        assert_eq!(err.example(), Some(&Data::from("toolong")));
        assert!(pipeline.is_broken());
    }

    #[test]
    fn test_too_long_is_skipped_when_warn_only() {
        let input = strings(&["a", "toolong", "b"]);

        let mut pipeline = read_list(input)
            .bucket_by_length(vec![(2, 4)], text_len, false, true)
            .and_return()
            .unwrap();

        assert_eq!(drain(&mut pipeline), lists_of_strings());
    }

    fn lists_of_strings() -> Vec<Data> {
        vec![Data::List(strings(&["a", "b"]))]
    }

    #[test]
    fn test_length_fn_failure_is_skipped_when_warn_only() {
        let input = vec![Data::from("a"), Data::Int(1), Data::from("b")];

        let mut pipeline = read_list(input)
            .bucket_by_length(vec![(2, 4)], text_len, false, true)
            .and_return()
            .unwrap();

        assert_eq!(drain(&mut pipeline), lists_of_strings());
    }
}
