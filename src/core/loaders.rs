//! Loaders for signal trace files.
//!
//! This module provides lenient parsers for:
//! - Raw signal files (one header line, then one real number per line)
//! - Processed signal CSVs (`original,filtered,is_peak`) for plotting

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read line {line}: {source}")]
    ReadLine {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Why a data line was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The line was blank after trimming
    Empty,
    /// The line did not start with a real number
    NotNumeric(String),
    /// The line was not valid UTF-8
    NotUtf8,
}

/// Outcome of parsing one data line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Parsed(f64),
    Skipped { line: usize, reason: SkipReason },
}

/// Parse a single data line. `line` is the 1-based line number in the file.
///
/// Leading whitespace is ignored and the longest leading real number is
/// taken, so `1.5,0.2` yields 1.5 and `2.5 V` yields 2.5.
pub fn parse_line(text: &str, line: usize) -> LineOutcome {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return LineOutcome::Skipped {
            line,
            reason: SkipReason::Empty,
        };
    }

    match leading_number(trimmed) {
        Some(value) => LineOutcome::Parsed(value),
        None => LineOutcome::Skipped {
            line,
            reason: SkipReason::NotNumeric(trimmed.to_string()),
        },
    }
}

/// Parse the longest prefix of `text` that forms a decimal real number,
/// `inf`/`infinity` or `nan` (any case, optional sign).
fn leading_number(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    for word in ["infinity", "inf", "nan"] {
        let matched = s
            .get(end..end + word.len())
            .map_or(false, |candidate| candidate.eq_ignore_ascii_case(word));
        if matched {
            let negative = bytes.first() == Some(&b'-');
            return Some(match (word, negative) {
                ("nan", _) => f64::NAN,
                (_, true) => f64::NEG_INFINITY,
                _ => f64::INFINITY,
            });
        }
    }

    let int_digits = digits_from(end);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = digits_from(exp_end);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse().ok()
}

/// A parsed signal with a record of every dropped line.
#[derive(Debug, Clone, Default)]
pub struct ParsedSignal {
    /// The discarded first line, if the file had one.
    pub header: Option<String>,
    /// Parsed values in original row order.
    pub values: Vec<f64>,
    /// Dropped lines as (1-based line number, reason).
    pub skipped: Vec<(usize, SkipReason)>,
}

impl ParsedSignal {
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn skip_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Parse a signal from any reader.
///
/// The first line is always discarded, even when it holds a number, and is
/// never required to be valid UTF-8. Every following line is parsed
/// independently; lines that do not start with a real number are recorded as
/// skipped and otherwise ignored.
///
/// # Errors
///
/// Returns an error only if the underlying reader fails.
pub fn parse_signal<R: Read>(reader: R) -> Result<ParsedSignal> {
    let reader = BufReader::new(reader);
    let mut signal = ParsedSignal::default();

    for (idx, raw) in reader.split(b'\n').enumerate() {
        let line_no = idx + 1;
        let raw = raw.map_err(|e| LoaderError::ReadLine {
            line: line_no,
            source: e,
        })?;

        if idx == 0 {
            let header = String::from_utf8_lossy(&raw);
            signal.header = Some(header.trim_end_matches('\r').to_string());
            continue;
        }

        let outcome = match std::str::from_utf8(&raw) {
            Ok(text) => parse_line(text, line_no),
            Err(_) => LineOutcome::Skipped {
                line: line_no,
                reason: SkipReason::NotUtf8,
            },
        };

        match outcome {
            LineOutcome::Parsed(value) => signal.values.push(value),
            LineOutcome::Skipped { line, reason } => signal.skipped.push((line, reason)),
        }
    }

    Ok(signal)
}

/// Load a signal file from disk.
///
/// # Errors
///
/// Returns [`LoaderError::Open`] if the file cannot be opened.
pub fn load_signal_file<P: AsRef<Path>>(path: P) -> Result<ParsedSignal> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LoaderError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_signal(file)
}

/// Columns of a processed signal CSV.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSignal {
    pub original: Vec<f64>,
    pub filtered: Vec<f64>,
    pub peaks: Vec<usize>,
}

/// Load a processed signal CSV with `original,filtered,is_peak` columns.
///
/// Rows with unparseable fields are dropped.
///
/// # Errors
///
/// Returns an error if the file cannot be read or lacks the required columns.
pub fn load_processed_csv<P: AsRef<Path>>(path: P) -> Result<ProcessedSignal> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LoaderError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));

    let columns = (find("original"), find("filtered"), find("is_peak"));
    let (orig_idx, filt_idx, peak_idx) = match columns {
        (Some(o), Some(f), Some(p)) => (o, f, p),
        _ => {
            return Err(LoaderError::MissingColumns(
                "original, filtered, is_peak".to_string(),
            ))
        }
    };

    let mut processed = ProcessedSignal::default();

    for result in reader.records() {
        let record = result?;

        let original = record.get(orig_idx).and_then(|s| s.trim().parse::<f64>().ok());
        let filtered = record.get(filt_idx).and_then(|s| s.trim().parse::<f64>().ok());
        let is_peak = record.get(peak_idx).map(|s| s.trim() == "1");

        if let (Some(o), Some(f), Some(p)) = (original, filtered, is_peak) {
            if p {
                processed.peaks.push(processed.original.len());
            }
            processed.original.push(o);
            processed.filtered.push(f);
        }
    }

    Ok(processed)
}
