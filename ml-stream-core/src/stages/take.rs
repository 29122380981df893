//! Prefix limiting

use crate::data::Data;
use crate::error::Result;
use crate::source::{BoxSource, Source};
use crate::tape::Tape;

/// Stops after a fixed number of elements
pub struct TakeSource {
    inner: BoxSource,
    num_examples: usize,

    /// Elements emitted so far
    taken: usize,
}

impl TakeSource {
    /// Stop after `num_examples` elements of `inner`
    pub fn new(inner: BoxSource, num_examples: usize) -> Self {
        Self {
            inner,
            num_examples,
            taken: 0,
        }
    }
}

impl Source for TakeSource {
    fn next(&mut self) -> Result<Option<Data>> {
        if self.taken >= self.num_examples {
            return Ok(None);
        }

        let example = self.inner.next()?;

        if example.is_some() {
            self.taken += 1;
        }

        Ok(example)
    }

    fn reset(&mut self) -> Result<()> {
        self.taken = 0;

        self.inner.reset()
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(self.taken);

        self.inner.record_position(tape)
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        self.taken = tape.read()?;

        self.inner.reload_position(tape)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::stages::read_list;
    use crate::test_util::{drain, ints};

    #[test]
    fn test_take() {
        let mut pipeline = read_list(ints(&[1, 2, 3])).take(2).and_return().unwrap();

        assert_eq!(drain(&mut pipeline), ints(&[1, 2]));
    }

    proptest! {
        #[test]
        fn prop_take_then_skip_rebuilds_stream(values in prop::collection::vec(any::<i64>(), 0..40), k in 0usize..50) {
            let mut head = read_list(ints(&values)).take(k).and_return().unwrap();
            let mut tail = read_list(ints(&values)).skip(k).and_return().unwrap();

            let mut output = drain(&mut head);
            output.extend(drain(&mut tail));

            prop_assert_eq!(output, ints(&values));
        }
    }
}
