//! Sequential reading of zip archive entries

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use ml_stream_core::{Data, PipelineBuilder, Source, Tape};

use crate::error::Result;

/// Yields the raw bytes of each file entry of a zip archive, in archive order
pub struct ZippedRecordsSource {
    pathname: PathBuf,
    archive: ZipArchive<BufReader<File>>,

    /// Index of the next archive entry
    index: usize,
}

impl ZippedRecordsSource {
    /// Open the archive at `pathname`
    pub fn open(pathname: &Path) -> Result<Self> {
        let file = File::open(pathname)?;

        let archive = ZipArchive::new(BufReader::new(file))?;

        debug!(path = %pathname.display(), num_entries = archive.len(), "Opened zip archive");

        Ok(Self {
            pathname: pathname.to_path_buf(),
            archive,
            index: 0,
        })
    }

    fn read_next(&mut self) -> Result<Option<Data>> {
        while self.index < self.archive.len() {
            let mut entry = self.archive.by_index(self.index)?;

            self.index += 1;

            if entry.is_dir() {
                continue;
            }

            let mut record = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));

            entry.read_to_end(&mut record)?;

            return Ok(Some(Data::Bytes(record)));
        }

        Ok(None)
    }
}

impl Source for ZippedRecordsSource {
    fn next(&mut self) -> ml_stream_core::Result<Option<Data>> {
        let index = self.index;

        self.read_next().map_err(|err| {
            ml_stream_core::Error::nested(
                format!("Cannot read the record at entry {index} of the zip archive."),
                ml_stream_core::Error::from(err),
                Some(Data::String(self.pathname.to_string_lossy().into_owned())),
            )
        })
    }

    fn reset(&mut self) -> ml_stream_core::Result<()> {
        self.index = 0;
        Ok(())
    }

    fn record_position(&mut self, tape: &mut Tape) -> ml_stream_core::Result<()> {
        tape.record(self.index);
        Ok(())
    }

    fn reload_position(&mut self, tape: &mut Tape) -> ml_stream_core::Result<()> {
        let index: usize = tape.read()?;

        if index > self.archive.len() {
            return Err(ml_stream_core::Error::CorruptTape(format!(
                "entry index {index} is beyond the {} entries of the archive",
                self.archive.len()
            )));
        }

        self.index = index;
        Ok(())
    }
}

/// Start a pipeline over the records of the zip archive at `pathname`
pub fn read_zipped_records(pathname: impl AsRef<Path>) -> PipelineBuilder {
    let pathname = pathname.as_ref().to_path_buf();

    PipelineBuilder::new(move || {
        let source = ZippedRecordsSource::open(&pathname)?;

        Ok(Box::new(source))
    })
}
