//! Element-wise mapping, optionally on a worker pool

use std::collections::VecDeque;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use super::{read_outcome, record_outcome, MapFn};
use crate::data::Data;
use crate::error::{Error, Result};
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Applies a function to every element
///
/// With more than one parallel call, up to `num_parallel_calls` elements are
/// pulled into a window and mapped on a dedicated pool. Outputs leave the
/// window in input order, whatever order the workers finish in.
pub struct MapSource {
    inner: BoxSource,
    map_fn: MapFn,
    num_parallel_calls: usize,
    warn_only: bool,

    /// Present when `num_parallel_calls > 1`
    pool: Option<ThreadPool>,

    /// Mapped outputs not yet emitted, in input order
    pending: VecDeque<Result<Data>>,
}

impl MapSource {
    /// Map `inner` with `map_fn`, starting a pool if `num_parallel_calls > 1`
    pub fn new(inner: BoxSource, map_fn: MapFn, num_parallel_calls: usize, warn_only: bool) -> Result<Self> {
        let pool = if num_parallel_calls > 1 {
            debug!(num_parallel_calls, "Starting map worker pool");

            let pool = ThreadPoolBuilder::new()
                .num_threads(num_parallel_calls)
                .thread_name(|idx| format!("ml-stream-map-{idx}"))
                .build()
                .map_err(|err| Error::Resource(format!("cannot start the map worker pool: {err}")))?;

            Some(pool)
        } else {
            None
        };

        Ok(Self {
            inner,
            map_fn,
            num_parallel_calls,
            warn_only,
            pool,
            pending: VecDeque::with_capacity(num_parallel_calls),
        })
    }

    /// Pull and map the next window; returns false if upstream is exhausted
    fn fill(&mut self) -> Result<bool> {
        let mut window = Vec::with_capacity(self.num_parallel_calls);

        while window.len() < self.num_parallel_calls {
            match self.inner.next()? {
                Some(example) => window.push(example),
                None => break,
            }
        }

        if window.is_empty() {
            return Ok(false);
        }

        let map_fn = &self.map_fn;

        let outputs: Vec<Result<Data>> = match &self.pool {
            Some(pool) => pool.install(|| window.into_par_iter().map(|example| apply(map_fn, example)).collect()),
            None => window.into_iter().map(|example| apply(map_fn, example)).collect(),
        };

        self.pending.extend(outputs);

        Ok(true)
    }
}

fn apply(map_fn: &MapFn, example: Data) -> Result<Data> {
    let original = example.clone();

    map_fn(example).map_err(|err| Error::from_callback("The map operation has failed.", err, Some(original)))
}

impl Source for MapSource {
    fn next(&mut self) -> Result<Option<Data>> {
        loop {
            while let Some(output) = self.pending.pop_front() {
                match output {
                    Ok(example) => return Ok(Some(example)),
                    Err(err) if self.warn_only => {
                        warn!(error = %err, example = ?err.example(), "Skipping example after map failure");
                    }
                    Err(err) => return Err(err),
                }
            }

            if !self.fill()? {
                return Ok(None);
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.pending.clear();

        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(self.pending.len());

        for output in &self.pending {
            record_outcome(tape, output);
        }

        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        let num_pending: usize = tape.read()?;

        self.pending.clear();

        for _ in 0..num_pending {
            self.pending.push_back(read_outcome(tape)?);
        }

        self.inner.reload_position(tape)
    }
}
