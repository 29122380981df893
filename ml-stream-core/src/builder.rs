//! Fluent construction of pipelines

use crate::data::Data;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::source::{BoxSource, SourceFactory};
use crate::stages::{
    BucketByLengthSource, BucketSource, FilterSource, MapSource, PrefetchSource, ShardSource,
    ShuffleSource, SkipSource, TakeSource, YieldFromSource, DEFAULT_SHUFFLE_SEED,
};

/// A builder for creating pipelines
///
/// Every method consumes the builder and returns a new one whose factory wraps
/// the previous factory in one more stage. Nothing is allocated until the
/// resulting [`Pipeline`] is first pulled. An invalid argument is kept and
/// reported by [`PipelineBuilder::and_return`].
#[must_use = "a builder does nothing until `and_return` is called"]
pub struct PipelineBuilder {
    factory: Result<SourceFactory>,
}

impl PipelineBuilder {
    /// Create a builder from a source factory
    pub fn new<F>(factory: F) -> Self
    where
        F: FnOnce() -> Result<BoxSource> + Send + 'static,
    {
        Self {
            factory: Ok(Box::new(factory)),
        }
    }

    /// Create a builder that fails with `err` when frozen
    pub fn invalid(err: Error) -> Self {
        Self { factory: Err(err) }
    }

    /// Group consecutive elements into lists of `bucket_size`
    pub fn bucket(self, bucket_size: usize, drop_remainder: bool) -> Self {
        if bucket_size == 0 {
            return Self::invalid(Error::InvalidArgument("`bucket_size` must be greater than zero".into()));
        }

        self.chain(move |inner| Ok(Box::new(BucketSource::new(inner, bucket_size, drop_remainder))))
    }

    /// Group elements into lists by length
    ///
    /// `bucket_sizes` holds `(bucket_size, max_length)` pairs. An element goes
    /// to the bucket with the smallest `max_length` not below its length.
    pub fn bucket_by_length<F>(
        self,
        bucket_sizes: Vec<(usize, usize)>,
        length_fn: F,
        drop_remainder: bool,
        warn_only: bool,
    ) -> Self
    where
        F: Fn(&Data) -> anyhow::Result<usize> + Send + 'static,
    {
        if bucket_sizes.is_empty() {
            return Self::invalid(Error::InvalidArgument("`bucket_sizes` must contain at least one bucket".into()));
        }

        if bucket_sizes.iter().any(|&(size, _)| size == 0) {
            return Self::invalid(Error::InvalidArgument("bucket sizes must be greater than zero".into()));
        }

        self.chain(move |inner| {
            Ok(Box::new(BucketByLengthSource::new(
                inner,
                bucket_sizes,
                Box::new(length_fn),
                drop_remainder,
                warn_only,
            )))
        })
    }

    /// Keep only the elements for which `predicate` returns true
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Data) -> anyhow::Result<bool> + Send + 'static,
    {
        self.chain(move |inner| Ok(Box::new(FilterSource::new(inner, Box::new(predicate)))))
    }

    /// Apply `map_fn` to every element, on `num_parallel_calls` threads
    pub fn map<F>(self, map_fn: F, num_parallel_calls: usize, warn_only: bool) -> Self
    where
        F: Fn(Data) -> anyhow::Result<Data> + Send + Sync + 'static,
    {
        if num_parallel_calls == 0 {
            return Self::invalid(Error::InvalidArgument("`num_parallel_calls` must be greater than zero".into()));
        }

        self.chain(move |inner| {
            let source = MapSource::new(inner, Box::new(map_fn), num_parallel_calls, warn_only)?;

            Ok(Box::new(source))
        })
    }

    /// Read up to `num_examples` elements ahead on a background thread
    pub fn prefetch(self, num_examples: usize) -> Self {
        if num_examples == 0 {
            return self;
        }

        self.chain(move |inner| Ok(Box::new(PrefetchSource::new(inner, num_examples))))
    }

    /// Keep every `num_shards`-th element, starting at `shard_idx`
    pub fn shard(self, shard_idx: usize, num_shards: usize) -> Self {
        if shard_idx >= num_shards {
            return Self::invalid(Error::InvalidArgument(format!(
                "`shard_idx` must be less than `num_shards` ({num_shards}), but is {shard_idx}"
            )));
        }

        self.chain(move |inner| Ok(Box::new(ShardSource::new(inner, shard_idx, num_shards))))
    }

    /// Shuffle elements within a window of `shuffle_window` (0 for the whole stream)
    pub fn shuffle(self, shuffle_window: usize, strict: bool, enabled: bool) -> Self {
        self.shuffle_with_seed(shuffle_window, strict, enabled, DEFAULT_SHUFFLE_SEED)
    }

    /// Same as [`PipelineBuilder::shuffle`] with an explicit seed
    pub fn shuffle_with_seed(self, shuffle_window: usize, strict: bool, enabled: bool, seed: u64) -> Self {
        if !enabled {
            return self;
        }

        self.chain(move |inner| Ok(Box::new(ShuffleSource::new(inner, shuffle_window, strict, seed))))
    }

    /// Drop the first `num_examples` elements
    pub fn skip(self, num_examples: usize) -> Self {
        self.chain(move |inner| Ok(Box::new(SkipSource::new(inner, num_examples))))
    }

    /// Stop after `num_examples` elements
    pub fn take(self, num_examples: usize) -> Self {
        self.chain(move |inner| Ok(Box::new(TakeSource::new(inner, num_examples))))
    }

    /// Replace every element with the output of the pipeline `yield_fn` builds from it
    pub fn yield_from<F>(self, yield_fn: F) -> Self
    where
        F: Fn(&Data) -> anyhow::Result<Pipeline> + Send + 'static,
    {
        self.chain(move |inner| Ok(Box::new(YieldFromSource::new(inner, Box::new(yield_fn)))))
    }

    /// Freeze the builder into a pipeline
    pub fn and_return(self) -> Result<Pipeline> {
        Ok(Pipeline::new(self.factory?))
    }

    /// Build the source tree right away
    pub fn into_source(self) -> Result<BoxSource> {
        (self.factory?)()
    }

    fn chain<F>(self, stage: F) -> Self
    where
        F: FnOnce(BoxSource) -> Result<BoxSource> + Send + 'static,
    {
        match self.factory {
            Ok(factory) => Self {
                factory: Ok(Box::new(move || stage(factory()?))),
            },
            Err(err) => Self::invalid(err),
        }
    }
}
