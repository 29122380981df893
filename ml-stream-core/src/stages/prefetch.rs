//! Read-ahead buffering on a background thread

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver};
use tracing::debug;

use super::{read_outcome, record_outcome};
use crate::data::Data;
use crate::error::{Error, Result};
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// A running prefetch thread
struct Worker {
    receiver: Receiver<Result<Option<Data>>>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<BoxSource>,
}

/// Pulls upstream elements ahead of the consumer into a bounded queue
///
/// The upstream source moves onto a worker thread on the first pull. Reset,
/// checkpoint operations and drop stop the worker, keep whatever it already
/// produced and take the upstream source back.
pub struct PrefetchSource {
    /// `None` while the worker owns it
    inner: Option<BoxSource>,
    num_examples: usize,
    worker: Option<Worker>,

    /// Elements drained from a stopped worker, served before restarting it
    buffer: VecDeque<Data>,

    /// Failure drained from a stopped worker, served after `buffer`
    deferred: Option<Error>,

    /// Set once upstream reported the end of the stream
    exhausted: bool,
}

impl PrefetchSource {
    /// Read up to `num_examples` elements of `inner` ahead
    pub fn new(inner: BoxSource, num_examples: usize) -> Self {
        Self {
            inner: Some(inner),
            num_examples,
            worker: None,
            buffer: VecDeque::new(),
            deferred: None,
            exhausted: false,
        }
    }

    fn start(&mut self) -> Result<()> {
        let mut inner = self.take_inner()?;

        let (sender, receiver) = bounded(self.num_examples);

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        debug!(num_examples = self.num_examples, "Starting prefetch worker");

        let handle = thread::Builder::new()
            .name("ml-stream-prefetch".into())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    let output = inner.next();

                    let last = !matches!(output, Ok(Some(_)));

                    if sender.send(output).is_err() || last {
                        break;
                    }
                }

                inner
            })
            .map_err(|err| Error::Resource(format!("cannot start the prefetch worker: {err}")))?;

        self.worker = Some(Worker { receiver, stop, handle });

        Ok(())
    }

    /// Stop the worker, keeping everything it has already produced
    fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker.stop.store(true, Ordering::Release);

        // Draining unblocks a worker waiting on a full queue; the iterator
        // ends once the worker drops its sender.
        for output in worker.receiver.iter() {
            match output {
                Ok(Some(example)) => self.buffer.push_back(example),
                Ok(None) => self.exhausted = true,
                Err(err) => self.deferred = Some(err),
            }
        }

        let inner = worker
            .handle
            .join()
            .map_err(|_| Error::Resource("the prefetch worker has panicked".into()))?;

        debug!(buffered = self.buffer.len(), "Stopped prefetch worker");

        self.inner = Some(inner);

        Ok(())
    }

    fn take_inner(&mut self) -> Result<BoxSource> {
        self.inner
            .take()
            .ok_or_else(|| Error::Resource("the prefetch upstream source has been lost".into()))
    }

    fn inner_mut(&mut self) -> Result<&mut BoxSource> {
        self.inner
            .as_mut()
            .ok_or_else(|| Error::Resource("the prefetch upstream source has been lost".into()))
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.deferred = None;
        self.exhausted = false;
    }
}

impl Source for PrefetchSource {
    fn next(&mut self) -> Result<Option<Data>> {
        if let Some(example) = self.buffer.pop_front() {
            return Ok(Some(example));
        }

        if let Some(err) = self.deferred.take() {
            return Err(err);
        }

        if self.exhausted {
            return Ok(None);
        }

        if self.worker.is_none() {
            self.start()?;
        }

        let received = match &self.worker {
            Some(worker) => worker.receiver.recv(),
            None => return Err(Error::Resource("the prefetch worker is not running".into())),
        };

        match received {
            Ok(Ok(Some(example))) => Ok(Some(example)),
            Ok(Ok(None)) => {
                self.exhausted = true;
                self.stop()?;

                Ok(None)
            }
            Ok(Err(err)) => {
                self.stop()?;

                Err(err)
            }
            Err(_) => {
                self.stop()?;

                Err(Error::Resource("the prefetch worker has stopped unexpectedly".into()))
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.stop()?;
        self.clear();

        self.inner_mut()?.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.stop()?;

        tape.record(self.buffer.iter().cloned().collect::<Vec<Data>>());

        match &self.deferred {
            Some(err) => {
                tape.record(true);
                record_outcome(tape, &Err(Error::pipeline(err.to_string(), err.example().cloned())));
            }
            None => tape.record(false),
        }

        tape.record(self.exhausted);

        self.inner_mut()?.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.stop()?;
        self.clear();

        let buffer: Vec<Data> = tape.read()?;
        self.buffer = buffer.into();

        if tape.read::<bool>()? {
            self.deferred = read_outcome(tape)?.err();
        }

        self.exhausted = tape.read()?;

        self.inner_mut()?.reload_position(tape)
    }
}

impl Drop for PrefetchSource {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            debug!(error = %err, "Prefetch worker did not stop cleanly");
        }
    }
}
