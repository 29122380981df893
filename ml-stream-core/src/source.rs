//! Source trait implemented by every pipeline stage

use crate::data::Data;
use crate::error::Result;
use crate::tape::Tape;

/// A pull-based producer of pipeline elements
///
/// Leaf readers and transformation stages alike implement this trait; a
/// transformation owns its upstream source(s) and pulls from them on demand.
pub trait Source: Send {
    /// Retrieve the next element from this source
    /// Returns `None` when exhausted
    fn next(&mut self) -> Result<Option<Data>>;

    /// Rewind the source, and every source it owns, to the first element
    fn reset(&mut self) -> Result<()>;

    /// Write the current position to `tape`
    fn record_position(&mut self, tape: &mut Tape) -> Result<()>;

    /// Restore a position previously written by [`Source::record_position`]
    fn reload_position(&mut self, tape: &mut Tape) -> Result<()>;
}

/// A boxed source, the unit stages compose over
pub type BoxSource = Box<dyn Source>;

/// A one-shot constructor for a source tree
pub type SourceFactory = Box<dyn FnOnce() -> Result<BoxSource> + Send>;
