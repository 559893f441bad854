//! Per-item pipeline contract shared by the image and signal variants.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::ProcessingParameters;

/// Boxed error from a collaborator (loader, writer, or transform provider).
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single item. Never aborts a batch.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: SourceError,
    },

    #[error("Could not write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: SourceError,
    },

    #[error("Transform failed for {}: {source}", .path.display())]
    Transform {
        path: PathBuf,
        #[source]
        source: SourceError,
    },
}

impl ItemError {
    pub fn read(path: &Path, source: impl Into<SourceError>) -> Self {
        ItemError::Read {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn write(path: &Path, source: impl Into<SourceError>) -> Self {
        ItemError::Write {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    pub fn transform(path: &Path, source: impl Into<SourceError>) -> Self {
        ItemError::Transform {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    /// The file the failure relates to.
    pub fn path(&self) -> &Path {
        match self {
            ItemError::Read { path, .. }
            | ItemError::Write { path, .. }
            | ItemError::Transform { path, .. } => path,
        }
    }
}

/// Variant-specific telemetry for a processed item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemDetail {
    Image {
        width: u32,
        height: u32,
        edges_blended: bool,
    },
    Signal {
        samples: usize,
        skipped_lines: usize,
        peaks: usize,
    },
    EdgeMap {
        width: u32,
        height: u32,
    },
}

/// Result of running one item through a pipeline.
#[derive(Debug)]
pub enum ItemOutcome {
    Processed {
        input: PathBuf,
        output: PathBuf,
        detail: ItemDetail,
        elapsed: Duration,
    },
    Skipped {
        input: PathBuf,
        error: ItemError,
    },
}

impl ItemOutcome {
    #[inline]
    pub fn is_processed(&self) -> bool {
        matches!(self, ItemOutcome::Processed { .. })
    }

    pub fn input(&self) -> &Path {
        match self {
            ItemOutcome::Processed { input, .. } | ItemOutcome::Skipped { input, .. } => input,
        }
    }

    pub fn output(&self) -> Option<&Path> {
        match self {
            ItemOutcome::Processed { output, .. } => Some(output),
            ItemOutcome::Skipped { .. } => None,
        }
    }
}

/// Transforms one input file into one output file.
///
/// Implementations report per-item failures through [`ItemOutcome::Skipped`]
/// and never panic or abort on a bad file.
pub trait ItemPipeline: Send + Sync {
    /// Short name used in log and summary output.
    fn name(&self) -> &'static str;

    /// Where `process` writes the result for `input`, or `None` if `input`
    /// has no file name. Items with equal output paths are never run
    /// concurrently.
    fn output_path(&self, input: &Path, output_dir: &Path) -> Option<PathBuf>;

    /// Process `input`, writing the result into `output_dir`.
    fn process(
        &self,
        input: &Path,
        output_dir: &Path,
        params: &ProcessingParameters,
    ) -> ItemOutcome;
}

/// Output path for a file kept under its own name.
pub(crate) fn same_name_output(input: &Path, output_dir: &Path) -> Option<PathBuf> {
    input.file_name().map(|name| output_dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_item_error_display_and_path() {
        let err = ItemError::read(
            Path::new("/data/a.csv"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.path(), Path::new("/data/a.csv"));
        assert_eq!(err.to_string(), "Could not read /data/a.csv: gone");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_same_name_output() {
        let out = same_name_output(Path::new("/in/sub/photo.JPG"), Path::new("/out"));
        assert_eq!(out, Some(PathBuf::from("/out/photo.JPG")));
        assert_eq!(same_name_output(Path::new("/"), Path::new("/out")), None);
    }

    #[test]
    fn test_outcome_accessors() {
        let skipped = ItemOutcome::Skipped {
            input: PathBuf::from("x.png"),
            error: ItemError::write(Path::new("y.png"), "disk full"),
        };
        assert!(!skipped.is_processed());
        assert_eq!(skipped.input(), Path::new("x.png"));
        assert!(skipped.output().is_none());
    }
}
