//! Configuration types for the batch pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Brightness offset applied after contrast scaling. Not configurable.
pub const CONTRAST_BETA: f64 = 10.0;

/// Which item pipeline a batch runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Raster images through the external transform provider
    #[default]
    Image,
    /// Delimited numeric traces through the signal filter
    Signal,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Image => write!(f, "image"),
            Mode::Signal => write!(f, "signal"),
        }
    }
}

/// Parameters for the image pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageParams {
    /// Gaussian blur kernel size
    #[serde(default = "default_blur_size")]
    pub blur_size: i32,

    /// Contrast multiplier
    #[serde(default = "default_contrast_alpha")]
    pub contrast_alpha: f64,

    /// Brightness offset applied with the contrast multiplier
    #[serde(default = "default_contrast_beta", skip_deserializing)]
    pub contrast_beta: f64,

    /// Blend an edge mask into the contrast-adjusted image
    #[serde(default = "default_edge_detection")]
    pub edge_detection: bool,
}

fn default_blur_size() -> i32 {
    5
}

fn default_contrast_alpha() -> f64 {
    1.5
}

fn default_contrast_beta() -> f64 {
    CONTRAST_BETA
}

fn default_edge_detection() -> bool {
    true
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            blur_size: default_blur_size(),
            contrast_alpha: default_contrast_alpha(),
            contrast_beta: default_contrast_beta(),
            edge_detection: default_edge_detection(),
        }
    }
}

/// Parameters for the signal filter.
///
/// Values are not validated: a zero or negative window degenerates to a
/// single-sample window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalParams {
    /// Moving average window size
    #[serde(default = "default_window_size")]
    pub window_size: i32,

    /// Minimum filtered value for a local maximum to count as a peak
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_window_size() -> i32 {
    10
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            threshold: default_threshold(),
        }
    }
}

/// Immutable parameter set handed to every item pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParameters {
    #[serde(default)]
    pub image: ImageParams,

    #[serde(default)]
    pub signal: SignalParams,
}

impl ProcessingParameters {
    /// Returns a copy with the given blur/contrast pair, as used by one sweep
    /// combination. Edge detection is always enabled during sweeps.
    pub fn with_image(&self, blur_size: i32, contrast_alpha: f64) -> Self {
        Self {
            image: ImageParams {
                blur_size,
                contrast_alpha,
                contrast_beta: CONTRAST_BETA,
                edge_detection: true,
            },
            signal: self.signal.clone(),
        }
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./input")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Controls how items in a batch are executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Worker count; 1 processes items strictly sequentially
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_jobs() -> usize {
    1
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { jobs: default_jobs() }
    }
}

/// Parameter grid for sweep runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_blur_sizes")]
    pub blur_sizes: Vec<i32>,

    #[serde(default = "default_sweep_contrast_values")]
    pub contrast_values: Vec<f64>,
}

fn default_sweep_blur_sizes() -> Vec<i32> {
    vec![3, 5]
}

fn default_sweep_contrast_values() -> Vec<f64> {
    vec![1.0, 1.5]
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            blur_sizes: default_sweep_blur_sizes(),
            contrast_values: default_sweep_contrast_values(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub io: IoConfig,

    #[serde(default)]
    pub parameters: ProcessingParameters,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub sweep: SweepConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
