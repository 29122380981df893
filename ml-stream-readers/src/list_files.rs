//! Recursive file listing

use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::debug;
use walkdir::WalkDir;

use ml_stream_core::{Data, PipelineBuilder, Source, Tape};

use crate::error::Result;

/// Yields the paths of the regular files under a directory
///
/// The listing is taken once, when the source is built, and sorted so that a
/// rebuilt source replays the same sequence.
pub struct ListFilesSource {
    files: Vec<String>,
    position: usize,
}

impl ListFilesSource {
    /// List the files under `pathname` whose path matches `pattern`
    ///
    /// If `pathname` is a file, it is the only candidate.
    pub fn open(pathname: &Path, pattern: Option<&Pattern>) -> Result<Self> {
        if !pathname.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", pathname.display()),
            )
            .into());
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(pathname).follow_links(true) {
            let entry = entry?;

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(pattern) = pattern {
                if !pattern.matches_path(entry.path()) {
                    continue;
                }
            }

            files.push(entry.path().to_string_lossy().into_owned());
        }

        files.sort();

        debug!(path = %pathname.display(), num_files = files.len(), "Listed files");

        Ok(Self { files, position: 0 })
    }

    /// Number of files found
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no file was found
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Source for ListFilesSource {
    fn next(&mut self) -> ml_stream_core::Result<Option<Data>> {
        let Some(file) = self.files.get(self.position) else {
            return Ok(None);
        };

        self.position += 1;

        Ok(Some(Data::String(file.clone())))
    }

    fn reset(&mut self) -> ml_stream_core::Result<()> {
        self.position = 0;
        Ok(())
    }

    fn record_position(&mut self, tape: &mut Tape) -> ml_stream_core::Result<()> {
        tape.record(self.position);
        Ok(())
    }

    fn reload_position(&mut self, tape: &mut Tape) -> ml_stream_core::Result<()> {
        let position: usize = tape.read()?;

        if position > self.files.len() {
            return Err(ml_stream_core::Error::CorruptTape(format!(
                "file position {position} is beyond the {} listed files",
                self.files.len()
            )));
        }

        self.position = position;
        Ok(())
    }
}

/// Start a pipeline over the files under `pathname`
///
/// `pattern` is a glob matched against the full path of each file.
pub fn list_files(pathname: impl AsRef<Path>, pattern: Option<&str>) -> PipelineBuilder {
    let pattern = match pattern.map(Pattern::new).transpose() {
        Ok(pattern) => pattern,
        Err(err) => {
            return PipelineBuilder::invalid(ml_stream_core::Error::InvalidArgument(format!(
                "invalid glob pattern: {err}"
            )))
        }
    };

    let pathname: PathBuf = pathname.as_ref().to_path_buf();

    PipelineBuilder::new(move || {
        let source = ListFilesSource::open(&pathname, pattern.as_ref())?;

        Ok(Box::new(source))
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();

        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();

        for name in ["b.txt", "a.txt", "c.bin", "nested/d.txt", "nested/deeper/e.bin"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        dir
    }

    fn collect(dir: &Path, pattern: Option<&str>) -> Vec<String> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let mut pipeline = list_files(dir, pattern).and_return().unwrap();

        let mut names = Vec::new();

        while let Some(path) = pipeline.next().unwrap() {
            let path = PathBuf::from(path.as_str().unwrap());

            names.push(path.strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"));
        }

        names
    }

    #[test_case(None, &["a.txt", "b.txt", "c.bin", "nested/d.txt", "nested/deeper/e.bin"] ; "all files")]
    #[test_case(Some("*.txt"), &["a.txt", "b.txt", "nested/d.txt"] ; "text files")]
    #[test_case(Some("*/deeper/*"), &["nested/deeper/e.bin"] ; "sub directory")]
    fn test_lists_sorted_files(pattern: Option<&str>, expected: &[&str]) {
        let dir = fixture();

        assert_eq!(collect(dir.path(), pattern), expected);
    }

    #[test]
    fn test_single_file() {
        let dir = fixture();
        let file = dir.path().join("a.txt");

        let mut pipeline = list_files(&file, None).and_return().unwrap();

        assert_eq!(pipeline.next().unwrap(), Some(Data::String(file.to_string_lossy().into_owned())));
        assert_eq!(pipeline.next().unwrap(), None);
    }

    #[test]
    fn test_missing_path_breaks_pipeline() {
        let dir = fixture();

        let mut pipeline = list_files(dir.path().join("missing"), None).and_return().unwrap();

        assert!(matches!(pipeline.next(), Err(ml_stream_core::Error::Io(_))));
        assert!(pipeline.is_broken());
    }

    #[test]
    fn test_invalid_pattern() {
        let result = list_files("/tmp", Some("[unclosed")).and_return();

        assert!(matches!(result, Err(ml_stream_core::Error::InvalidArgument(_))));
    }

    #[test]
    fn test_checkpoint() {
        let dir = fixture();

        let mut pipeline = list_files(dir.path(), None).and_return().unwrap();
        pipeline.next().unwrap();
        pipeline.next().unwrap();

        let checkpoint = pipeline.save_checkpoint().unwrap();

        let mut restored = list_files(dir.path(), None).and_return().unwrap();
        restored.load_checkpoint(&checkpoint).unwrap();

        assert_eq!(restored.next().unwrap(), pipeline.next().unwrap());
    }
}
