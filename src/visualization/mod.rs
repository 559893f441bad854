//! Visualization of processed signals.
//!
//! Renders the original trace, the filtered trace and detected peaks to a PNG
//! using the plotters library.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::writers::{ensure_parent_dirs, WriteError};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("Output error: {0}")]
    Output(#[from] WriteError),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty signal")]
    EmptySignal,

    #[error("Series length mismatch: original {original}, filtered {filtered}")]
    LengthMismatch { original: usize, filtered: usize },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1600;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 600;

const ORIGINAL_COLOR: RGBColor = RGBColor(170, 170, 170);
const FILTERED_COLOR: RGBColor = RGBColor(55, 126, 184);
const PEAK_COLOR: RGBColor = RGBColor(228, 26, 28);

/// Plot a processed signal and save it as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `original` - Parsed samples
/// * `filtered` - Filtered samples, same length as `original`
/// * `peaks` - Peak indices into `filtered`
/// * `_title` - Title for the plot (unused; the bitmap backend is built without fonts)
pub fn plot_signal(
    output_path: &Path,
    original: &[f64],
    filtered: &[f64],
    peaks: &[usize],
    _title: &str,
) -> Result<()> {
    if original.is_empty() {
        return Err(VisualizationError::EmptySignal);
    }
    if original.len() != filtered.len() {
        return Err(VisualizationError::LengthMismatch {
            original: original.len(),
            filtered: filtered.len(),
        });
    }

    ensure_parent_dirs(output_path)?;

    let n = original.len();
    let (y_min, y_max) = compute_bounds(original.iter().chain(filtered.iter()).copied());
    let y_padding = (y_max - y_min) * 0.05;
    let x_max = (n.max(2) - 1) as f64;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(0.0..x_max, (y_min - y_padding)..(y_max + y_padding))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(
            original.iter().enumerate().map(|(i, &v)| (i as f64, v)),
            &ORIGINAL_COLOR,
        ))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(
            filtered.iter().enumerate().map(|(i, &v)| (i as f64, v)),
            FILTERED_COLOR.stroke_width(2),
        ))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(
            peaks
                .iter()
                .filter(|&&i| i < n)
                .map(|&i| Circle::new((i as f64, filtered[i]), 4, PEAK_COLOR.filled())),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Compute min/max over finite values, widening a flat range.
fn compute_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::MAX;
    let mut max = f64::MIN;

    for v in values.filter(|v| v.is_finite()) {
        if v < min { min = v; }
        if v > max { max = v; }
    }

    if min > max {
        return (-1.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        min -= 1.0;
        max += 1.0;
    }

    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compute_bounds() {
        assert_eq!(compute_bounds([1.0, -2.0, 5.0].into_iter()), (-2.0, 5.0));
        assert_eq!(compute_bounds([3.0, 3.0].into_iter()), (2.0, 4.0));
        assert_eq!(compute_bounds([f64::NAN].into_iter()), (-1.0, 1.0));
    }

    #[test]
    fn test_plot_empty_signal() {
        let temp_dir = TempDir::new().unwrap();
        let result = plot_signal(&temp_dir.path().join("x.png"), &[], &[], &[], "x");
        assert!(matches!(result, Err(VisualizationError::EmptySignal)));
    }

    #[test]
    fn test_plot_length_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let result = plot_signal(&temp_dir.path().join("x.png"), &[1.0, 2.0], &[1.0], &[], "x");
        assert!(matches!(result, Err(VisualizationError::LengthMismatch { .. })));
    }

    #[test]
    fn test_plot_signal_writes_png() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("plots").join("trace.png");

        let original = [1.0, 5.0, 2.0, 8.0, 3.0];
        let filtered = [1.0, 5.0, 2.0, 8.0, 3.0];
        plot_signal(&output, &original, &filtered, &[1, 3], "trace").unwrap();

        assert!(output.exists());
    }
}
