//! Batch processing of image collections and numeric signal traces.
//!
//! This crate provides tools for:
//! - Discovering inputs recursively by extension
//! - Running images through blur, contrast and edge-blend stages
//! - Smoothing signal traces with a moving average and flagging peaks
//! - Sweeping image parameters into isolated output directories
//!
//! # Example
//!
//! ```no_run
//! use batch_forge::core::discovery::{discover, ExtensionFilter};
//! use batch_forge::processors::{BatchOrchestrator, SignalPipeline};
//! use batch_forge::ProcessingParameters;
//!
//! let files = discover(std::path::Path::new("./traces"), &ExtensionFilter::signals()).unwrap();
//! let orchestrator = BatchOrchestrator::new(Box::new(SignalPipeline), files, "./out");
//! let summary = orchestrator.run_batch(&ProcessingParameters::default()).unwrap();
//! println!("{} of {} processed", summary.processed, summary.total);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{Mode, PipelineConfig, ProcessingParameters};
pub use core::discovery::{discover, ExtensionFilter, FileSet};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
