//! In-memory list replay

use crate::builder::PipelineBuilder;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::source::Source;
use crate::tape::Tape;

/// Replays a list of elements
pub struct ListSource {
    /// The elements to replay
    list: Vec<Data>,

    /// Index of the next element
    position: usize,
}

impl ListSource {
    /// Replay `list` from its first element
    pub fn new(list: Vec<Data>) -> Self {
        Self { list, position: 0 }
    }
}

impl Source for ListSource {
    fn next(&mut self) -> Result<Option<Data>> {
        let Some(example) = self.list.get(self.position) else {
            return Ok(None);
        };

        self.position += 1;

        Ok(Some(example.clone()))
    }

    fn reset(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn record_position(&mut self, tape: &mut Tape) -> Result<()> {
        tape.record(self.position);
        Ok(())
    }

    fn reload_position(&mut self, tape: &mut Tape) -> Result<()> {
        let position: usize = tape.read()?;

        if position > self.list.len() {
            return Err(Error::corrupt(format!(
                "list position {position} is beyond the list length {}",
                self.list.len()
            )));
        }

        self.position = position;
        Ok(())
    }
}

/// Start a pipeline that replays `list`
pub fn read_list(list: Vec<Data>) -> PipelineBuilder {
    PipelineBuilder::new(move || Ok(Box::new(ListSource::new(list))))
}
