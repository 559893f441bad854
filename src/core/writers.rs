//! Writers for processed signal files.
//!
//! Output rows pair each parsed sample with its filtered value and a binary
//! peak flag, in original row order.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use crate::processors::signal_filter::PeakSet;

/// Header row of a processed signal file.
pub const SIGNAL_HEADER: [&str; 3] = ["original", "filtered", "is_peak"];

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Mismatched array lengths.
    #[error(
        "array length mismatch: original has {original_len} samples, filtered has {filtered_len}"
    )]
    LengthMismatch {
        original_len: usize,
        filtered_len: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write a processed signal CSV.
///
/// # Arguments
///
/// * `path` - Output file path; the parent directory must already exist
/// * `original` - Parsed samples
/// * `filtered` - Filtered samples, same length as `original`
/// * `peaks` - Peak indices into `filtered`
///
/// # Errors
///
/// Returns an error if the lengths differ or the file cannot be created or written.
pub fn write_signal_csv(
    path: &Path,
    original: &[f64],
    filtered: &[f64],
    peaks: &PeakSet,
) -> Result<()> {
    if original.len() != filtered.len() {
        return Err(WriteError::LengthMismatch {
            original_len: original.len(),
            filtered_len: filtered.len(),
        });
    }

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    let path_str = path.display().to_string();

    csv_writer
        .write_record(SIGNAL_HEADER)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for (i, (orig, filt)) in original.iter().zip(filtered).enumerate() {
        let flag = if peaks.contains(i) { "1" } else { "0" };
        csv_writer
            .write_record(&[orig.to_string(), filt.to_string(), flag.to_string()])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
