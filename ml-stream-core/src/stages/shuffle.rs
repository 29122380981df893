//! Windowed shuffling

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::data::Data;
use crate::error::Result;
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Seed used by `shuffle` when none is given
pub const DEFAULT_SHUFFLE_SEED: u64 = 0x6d6c_2d73_7472_6d00;

/// Emits elements from a bounded reservoir in pseudo-random order
///
/// In strict mode the reservoir is a sliding window: it is topped up to
/// `window` elements before every emission and a random slot is emitted.
/// Otherwise the reservoir is filled, shuffled as a block and drained in that
/// order before it is refilled, so the tail of the stream leaves without
/// waiting for a full window. A window of zero holds the whole stream.
pub struct ShuffleSource {
    inner: BoxSource,
    window: usize,
    strict: bool,
    seed: u64,
    rng: ChaCha8Rng,
    reservoir: Vec<Data>,

    /// Next slot to emit in block mode
    cursor: usize,

    /// Set once upstream reported the end of the stream
    exhausted: bool,
}

impl ShuffleSource {
    /// Shuffle `inner` within `window` elements using `seed`
    pub fn new(inner: BoxSource, window: usize, strict: bool, seed: u64) -> Self {
        Self {
            inner,
            window,
            strict,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            reservoir: Vec::new(),
            cursor: 0,
            exhausted: false,
        }
    }

    fn is_full(&self) -> bool {
        self.window != 0 && self.reservoir.len() >= self.window
    }

    fn fill(&mut self) -> Result<()> {
        while !self.exhausted && !self.is_full() {
            match self.inner.next()? {
                Some(example) => self.reservoir.push(example),
                None => self.exhausted = true,
            }
        }

        Ok(())
    }

    fn next_strict(&mut self) -> Result<Option<Data>> {
        self.fill()?;

        if self.reservoir.is_empty() {
            return Ok(None);
        }

        let idx = self.rng.gen_range(0..self.reservoir.len());

        Ok(Some(self.reservoir.swap_remove(idx)))
    }

    fn next_block(&mut self) -> Result<Option<Data>> {
        if self.cursor >= self.reservoir.len() {
            self.reservoir.clear();
            self.cursor = 0;

            self.fill()?;

            if self.reservoir.is_empty() {
                return Ok(None);
            }

            self.reservoir.shuffle(&mut self.rng);
        }

        let example = std::mem::take(&mut self.reservoir[self.cursor]);

        self.cursor += 1;

        Ok(Some(example))
    }
}

impl Source for ShuffleSource {
    fn next(&mut self) -> Result<Option<Data>> {
        if self.strict {
            self.next_strict()
        } else {
            self.next_block()
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.reservoir.clear();
        self.cursor = 0;
        self.exhausted = false;

        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(self.reservoir[self.cursor..].to_vec());
        tape.record(self.rng.get_word_pos());
        tape.record(self.exhausted);

        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.reservoir = tape.read()?;
        self.cursor = 0;

        let word_pos: u128 = tape.read()?;

        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.rng.set_word_pos(word_pos);

        self.exhausted = tape.read()?;

        self.inner.reload_position(tape)
    }
}
