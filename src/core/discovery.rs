//! Recursive discovery of input files by extension.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::config::Mode;

/// Image extensions, matched case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// Signal extension, matched case-sensitively.
pub const SIGNAL_EXTENSION: &str = "csv";

/// Errors that abort discovery of a file set.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Input directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to traverse {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// How a discovered file's extension is compared to the recognized set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionMatch {
    /// Lowercase the extension before comparing
    CaseInsensitive,
    /// Compare the extension byte-for-byte
    Exact,
}

/// A set of recognized extensions and how to compare against them.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
    matching: ExtensionMatch,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I, matching: ExtensionMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            matching,
        }
    }

    /// Filter recognising raster image files.
    pub fn images() -> Self {
        Self::new(IMAGE_EXTENSIONS.iter().copied(), ExtensionMatch::CaseInsensitive)
    }

    /// Filter recognising signal trace files. Only lowercase `.csv` matches.
    pub fn signals() -> Self {
        Self::new([SIGNAL_EXTENSION], ExtensionMatch::Exact)
    }

    /// Filter for the given pipeline mode.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Image => Self::images(),
            Mode::Signal => Self::signals(),
        }
    }

    /// Returns true if the path's extension is in the recognized set.
    pub fn matches(&self, path: &Path) -> bool {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => return false,
        };

        match self.matching {
            ExtensionMatch::CaseInsensitive => {
                let lower = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == lower)
            }
            ExtensionMatch::Exact => self.extensions.iter().any(|e| e == ext),
        }
    }
}

/// Ordered sequence of discovered paths.
///
/// Duplicates are kept; the order is stable for a given filesystem state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSet {
    paths: Vec<PathBuf>,
}

impl FileSet {
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// Recursively collect every regular file under `root` accepted by `filter`.
///
/// Returned paths are absolute. Entries are visited in file-name order
/// within each directory so the result is stable between calls.
///
/// # Errors
///
/// Returns [`DiscoveryError`] if `root` does not exist, is not a directory,
/// or cannot be traversed.
pub fn discover(root: &Path, filter: &ExtensionFilter) -> Result<FileSet, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let root = root
        .canonicalize()
        .map_err(|_| DiscoveryError::NotFound(root.to_path_buf()))?;

    let mut paths = Vec::with_capacity(64);

    for entry in WalkDir::new(&root)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| DiscoveryError::Walk {
            root: root.clone(),
            source: e,
        })?;

        if entry.file_type().is_file() && filter.matches(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    log::debug!("Discovered {} files under {}", paths.len(), root.display());

    Ok(FileSet::from_paths(paths))
}
