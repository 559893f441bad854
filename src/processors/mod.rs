//! Data processing modules.

pub mod analysis;
pub mod batch;
pub mod edge_pipeline;
pub mod image_pipeline;
pub mod pipeline;
pub mod signal_filter;
pub mod signal_pipeline;
pub mod transformer;

// Re-export key types for convenience
pub use analysis::{analyze_collection, CollectionReport, CollectionStats};
pub use batch::{
    executor_for, sweep_dir_name, BatchError, BatchOrchestrator, BatchSummary, Executor,
    ParallelExecutor, SequentialExecutor, SweepRun, SweepSummary, WorkItem, WorkQueue,
};
pub use edge_pipeline::{edge_map_output_path, EdgeMapPipeline};
pub use image_pipeline::ImagePipeline;
pub use pipeline::{ItemDetail, ItemError, ItemOutcome, ItemPipeline};
pub use signal_filter::{find_peaks, moving_average, FilterResult, PeakSet, SignalFilter};
pub use signal_pipeline::SignalPipeline;
pub use transformer::{ImageTransformer, RasterTransformer, TransformError};
