//! Signal variant of the item pipeline.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};

use crate::config::ProcessingParameters;
use crate::core::loaders::load_signal_file;
use crate::core::writers::write_signal_csv;
use super::pipeline::{ItemDetail, ItemError, ItemOutcome, ItemPipeline};
use super::signal_filter::SignalFilter;

/// Prefix added to a signal file's name in the output directory.
pub const OUTPUT_PREFIX: &str = "processed_";

/// Output path for a processed signal: `<output_dir>/processed_<file name>`.
pub fn signal_output_path(input: &Path, output_dir: &Path) -> Option<PathBuf> {
    input.file_name().map(|name| {
        let mut prefixed = std::ffi::OsString::from(OUTPUT_PREFIX);
        prefixed.push(name);
        output_dir.join(prefixed)
    })
}

/// Parses, filters, and annotates signal trace files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalPipeline;

impl SignalPipeline {
    fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        params: &ProcessingParameters,
    ) -> Result<(PathBuf, ItemDetail), ItemError> {
        let signal = load_signal_file(input).map_err(|e| ItemError::read(input, e))?;

        let output = signal_output_path(input, output_dir)
            .ok_or_else(|| ItemError::read(input, "input path has no file name"))?;

        let result = SignalFilter::from(&params.signal).apply(&signal.values);

        write_signal_csv(&output, &signal.values, &result.filtered, &result.peaks)
            .map_err(|e| ItemError::write(&output, e))?;

        let detail = ItemDetail::Signal {
            samples: signal.len(),
            skipped_lines: signal.skip_count(),
            peaks: result.peaks.len(),
        };

        Ok((output, detail))
    }
}

impl ItemPipeline for SignalPipeline {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn output_path(&self, input: &Path, output_dir: &Path) -> Option<PathBuf> {
        signal_output_path(input, output_dir)
    }

    fn process(
        &self,
        input: &Path,
        output_dir: &Path,
        params: &ProcessingParameters,
    ) -> ItemOutcome {
        let start = Instant::now();

        match self.run(input, output_dir, params) {
            Ok((output, detail)) => {
                if let ItemDetail::Signal { peaks, .. } = &detail {
                    info!(
                        "Processed: {} (Found {} peaks)",
                        input.file_name().unwrap_or_default().to_string_lossy(),
                        peaks
                    );
                }
                ItemOutcome::Processed {
                    input: input.to_path_buf(),
                    output,
                    detail,
                    elapsed: start.elapsed(),
                }
            }
            Err(error) => {
                warn!("Skipping signal: {}", error);
                ItemOutcome::Skipped {
                    input: input.to_path_buf(),
                    error,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_signal_csv(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn identity_params(threshold: f64) -> ProcessingParameters {
        let mut params = ProcessingParameters::default();
        params.signal.window_size = 0;
        params.signal.threshold = threshold;
        params
    }

    #[test]
    fn test_signal_output_path() {
        let out = signal_output_path(Path::new("/in/run1.csv"), Path::new("/out"));
        assert_eq!(out, Some(PathBuf::from("/out/processed_run1.csv")));
    }

    #[test]
    fn test_process_identity_filter() {
        let temp_dir = TempDir::new().unwrap();
        let lines = ["value", "1", "5", "2", "8", "3"];
        let input = create_signal_csv(temp_dir.path(), "trace.csv", &lines);

        let outcome = SignalPipeline.process(&input, temp_dir.path(), &identity_params(4.0));

        let output = temp_dir.path().join("processed_trace.csv");
        assert_eq!(SignalPipeline.output_path(&input, temp_dir.path()), Some(output.clone()));
        match &outcome {
            ItemOutcome::Processed { detail, .. } => assert_eq!(
                detail,
                &ItemDetail::Signal {
                    samples: 5,
                    skipped_lines: 0,
                    peaks: 2
                }
            ),
            other => panic!("expected success, got {:?}", other),
        }

        let content = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "original,filtered,is_peak",
                "1,1,0",
                "5,5,1",
                "2,2,0",
                "8,8,1",
                "3,3,0"
            ]
        );
    }

    #[test]
    fn test_unparseable_rows_are_absent_from_output() {
        let temp_dir = TempDir::new().unwrap();
        let lines = ["t", "1", "oops", "2", "", "3"];
        let input = create_signal_csv(temp_dir.path(), "noisy.csv", &lines);

        let outcome = SignalPipeline.process(&input, temp_dir.path(), &identity_params(10.0));

        match &outcome {
            ItemOutcome::Processed { detail, .. } => assert_eq!(
                detail,
                &ItemDetail::Signal {
                    samples: 3,
                    skipped_lines: 2,
                    peaks: 0
                }
            ),
            other => panic!("expected success, got {:?}", other),
        }

        let content = fs::read_to_string(temp_dir.path().join("processed_noisy.csv")).unwrap();
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn test_latin1_header_and_multi_column_rows() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("sensor.csv");
        fs::write(&input, b"temp \xB0C,rh\n1,40\n5 V\n2\n\xFF\n8\n3\n").unwrap();

        let outcome = SignalPipeline.process(&input, temp_dir.path(), &identity_params(4.0));

        match &outcome {
            ItemOutcome::Processed { detail, .. } => assert_eq!(
                detail,
                &ItemDetail::Signal {
                    samples: 5,
                    skipped_lines: 1,
                    peaks: 2
                }
            ),
            other => panic!("expected success, got {:?}", other),
        }
        let content = fs::read_to_string(temp_dir.path().join("processed_sensor.csv")).unwrap();
        assert_eq!(content.lines().nth(1), Some("1,1,0"));
    }

    #[test]
    fn test_missing_input_is_read_skip() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("absent.csv");

        let params = ProcessingParameters::default();
        let outcome = SignalPipeline.process(&input, temp_dir.path(), &params);
        match outcome {
            ItemOutcome::Skipped { error, .. } => assert!(matches!(error, ItemError::Read { .. })),
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_unwritable_output_is_write_skip() {
        let temp_dir = TempDir::new().unwrap();
        let input = create_signal_csv(temp_dir.path(), "trace.csv", &["v", "1"]);

        let outcome = SignalPipeline.process(
            &input,
            &temp_dir.path().join("no_such_dir"),
            &ProcessingParameters::default(),
        );
        match outcome {
            ItemOutcome::Skipped { error, .. } => assert!(matches!(error, ItemError::Write { .. })),
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_header_only_file_writes_header() {
        let temp_dir = TempDir::new().unwrap();
        let input = create_signal_csv(temp_dir.path(), "empty.csv", &["value"]);

        let params = ProcessingParameters::default();
        let outcome = SignalPipeline.process(&input, temp_dir.path(), &params);
        assert!(outcome.is_processed());

        let content = fs::read_to_string(temp_dir.path().join("processed_empty.csv")).unwrap();
        assert_eq!(content.trim(), "original,filtered,is_peak");
    }
}
