//! Stage implementations
//!
//! Every stage is a [`Source`](crate::source::Source) that owns its upstream
//! source(s). Builders and the multiplexing entry points compose them.

mod bucket;
mod bucket_by_length;
mod filter;
mod list;
mod map;
mod prefetch;
mod round_robin;
mod shard;
mod shuffle;
mod skip;
mod take;
mod yield_from;
mod zip;

pub use bucket::BucketSource;
pub use bucket_by_length::BucketByLengthSource;
pub use filter::FilterSource;
pub use list::{read_list, ListSource};
pub use map::MapSource;
pub use prefetch::PrefetchSource;
pub use round_robin::{round_robin, RoundRobinSource};
pub use shard::ShardSource;
pub use shuffle::{ShuffleSource, DEFAULT_SHUFFLE_SEED};
pub use skip::SkipSource;
pub use take::TakeSource;
pub use yield_from::YieldFromSource;
pub use zip::{zip, ZipOptions, ZipSource};

use crate::data::Data;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::source::BoxSource;
use crate::tape::Tape;

/// Function applied by `map`
pub type MapFn = Box<dyn Fn(Data) -> anyhow::Result<Data> + Send + Sync>;

/// Predicate applied by `filter`
pub type PredicateFn = Box<dyn Fn(&Data) -> anyhow::Result<bool> + Send>;

/// Length function applied by `bucket_by_length`
pub type LengthFn = Box<dyn Fn(&Data) -> anyhow::Result<usize> + Send>;

/// Sub-pipeline constructor applied by `yield_from`
pub type YieldFn = Box<dyn Fn(&Data) -> anyhow::Result<Pipeline> + Send>;

/// Write an element or a pending failure
pub(crate) fn record_outcome(tape: &mut Tape, outcome: &Result<Data>) {
    match outcome {
        Ok(example) => {
            tape.record(true);
            tape.record(example.clone());
        }
        Err(err) => {
            tape.record(false);
            tape.record(err.to_string());
            tape.record(err.example().cloned());
        }
    }
}

/// Read back a value written by [`record_outcome`]
pub(crate) fn read_outcome(tape: &mut Tape) -> Result<Result<Data>> {
    if tape.read::<bool>()? {
        return Ok(Ok(tape.read::<Data>()?));
    }

    let message: String = tape.read()?;
    let example: Option<Data> = tape.read()?;

    Ok(Err(Error::pipeline(message, example)))
}

/// Record every child source position on its own nested tape
pub(crate) fn record_sources(sources: &mut [BoxSource], tape: &mut Tape) -> Result<()> {
    for source in sources {
        let mut child = Tape::new();

        source.record_position(&mut child)?;

        tape.record_tape(child);
    }

    Ok(())
}

/// Reload positions written by [`record_sources`]
pub(crate) fn reload_sources(sources: &mut [BoxSource], tape: &mut Tape) -> Result<()> {
    for source in sources {
        let mut child = tape.read_tape()?;

        source.reload_position(&mut child)?;
    }

    Ok(())
}

/// Take over the source trees of `pipelines`, building those not yet built
pub(crate) fn into_sources(pipelines: Vec<Pipeline>) -> Result<Vec<BoxSource>> {
    pipelines.into_iter().map(Pipeline::into_source).collect()
}
