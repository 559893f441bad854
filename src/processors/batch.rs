//! Batch orchestration and parameter sweeps.
//!
//! A batch runs every file of a [`FileSet`] through one [`ItemPipeline`] via
//! an [`Executor`]. Statistics are computed only after the executor has
//! returned every outcome. A sweep repeats the batch once per blur/contrast
//! combination, each into its own subdirectory, with a fresh parameter value
//! built per combination.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::{info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::ProcessingParameters;
use crate::core::discovery::FileSet;
use super::pipeline::{ItemOutcome, ItemPipeline};

/// Errors that abort a batch or sweep.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to create output directory {}: {source}", .path.display())]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// One unit of work: a discovered file, its position in discovery order and
/// the output path it will write, when known.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub index: usize,
    pub path: PathBuf,
    pub output: Option<PathBuf>,
}

/// Ordered queue of work items.
#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    items: Vec<WorkItem>,
}

impl WorkQueue {
    /// Queue every file with no known output path.
    pub fn from_file_set(files: &FileSet) -> Self {
        Self::with_outputs(files, |_| None)
    }

    /// Queue every file, recording the output path each one writes.
    pub fn with_outputs<F>(files: &FileSet, output_for: F) -> Self
    where
        F: Fn(&Path) -> Option<PathBuf>,
    {
        let items = files
            .iter()
            .enumerate()
            .map(|(index, path)| WorkItem {
                index,
                path: path.clone(),
                output: output_for(path),
            })
            .collect();
        Self { items }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Positions into [`items`](Self::items) grouped by output path.
    ///
    /// Items sharing an output path land in one group, in queue order.
    /// Items without a known output path each form their own group. Groups
    /// are ordered by their first item.
    pub fn output_groups(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut by_output: HashMap<&Path, usize> = HashMap::new();

        for (pos, item) in self.items.iter().enumerate() {
            match item.output.as_deref() {
                Some(output) => {
                    let next = groups.len();
                    let group = *by_output.entry(output).or_insert(next);
                    if group == next {
                        groups.push(Vec::new());
                    }
                    groups[group].push(pos);
                }
                None => groups.push(vec![pos]),
            }
        }

        groups
    }
}

/// Task applied to each work item.
pub type ItemTask<'a> = dyn Fn(&WorkItem) -> ItemOutcome + Sync + 'a;

/// Runs a task over a queue. Outcomes are returned in queue order regardless
/// of the order in which items complete.
pub trait Executor: Send + Sync {
    fn execute(&self, queue: &WorkQueue, task: &ItemTask<'_>) -> Vec<ItemOutcome>;
}

/// Processes items one at a time in discovery order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn execute(&self, queue: &WorkQueue, task: &ItemTask<'_>) -> Vec<ItemOutcome> {
        queue.items().iter().map(task).collect()
    }
}

/// Processes items on a dedicated rayon pool.
///
/// Items that write the same output path run one after another in queue
/// order, so the surviving file matches a sequential run.
pub struct ParallelExecutor {
    pool: rayon::ThreadPool,
}

impl ParallelExecutor {
    pub fn new(jobs: usize) -> Result<Self, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
        Ok(Self { pool })
    }

    pub fn jobs(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Executor for ParallelExecutor {
    fn execute(&self, queue: &WorkQueue, task: &ItemTask<'_>) -> Vec<ItemOutcome> {
        let items = queue.items();
        let groups = queue.output_groups();

        let finished: Vec<Vec<(usize, ItemOutcome)>> = self.pool.install(|| {
            groups
                .par_iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|&pos| (pos, task(&items[pos])))
                        .collect::<Vec<_>>()
                })
                .collect()
        });

        let mut slots: Vec<Option<ItemOutcome>> = items.iter().map(|_| None).collect();
        for (pos, outcome) in finished.into_iter().flatten() {
            slots[pos] = Some(outcome);
        }
        slots.into_iter().flatten().collect()
    }
}

/// Pick an executor for a worker count. One or zero workers is sequential.
pub fn executor_for(jobs: usize) -> Result<Box<dyn Executor>, BatchError> {
    if jobs <= 1 {
        Ok(Box::new(SequentialExecutor))
    } else {
        Ok(Box::new(ParallelExecutor::new(jobs)?))
    }
}

/// Callback invoked with `(completed, total)` after each item.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Summary of one batch run.
#[derive(Debug)]
pub struct BatchSummary {
    pub pipeline: &'static str,
    pub output_dir: PathBuf,
    pub parameters: ProcessingParameters,
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchSummary {
    /// Mean wall-clock time per item, or `None` for an empty batch.
    pub fn average_per_item(&self) -> Option<Duration> {
        if self.total == 0 {
            None
        } else {
            Some(self.elapsed.div_f64(self.total as f64))
        }
    }
}

/// Result of one sweep combination.
#[derive(Debug)]
pub struct SweepRun {
    pub blur_size: i32,
    pub contrast: f64,
    pub summary: BatchSummary,
}

/// Results of a full sweep, in iteration order.
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub runs: Vec<SweepRun>,
}

impl SweepSummary {
    pub fn total_processed(&self) -> usize {
        self.runs.iter().map(|r| r.summary.processed).sum()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.runs.iter().map(|r| r.summary.elapsed).sum()
    }
}

/// Subdirectory name for a sweep combination.
///
/// The contrast is scaled by ten and truncated to an integer so the name
/// holds no decimal point, e.g. blur 5 / contrast 1.5 gives `blur5_contrast15`.
pub fn sweep_dir_name(blur_size: i32, contrast: f64) -> String {
    format!("blur{}_contrast{}", blur_size, (contrast * 10.0) as i32)
}

/// Drives item pipelines over a discovered file set.
pub struct BatchOrchestrator {
    pipeline: Box<dyn ItemPipeline>,
    executor: Box<dyn Executor>,
    files: FileSet,
    output_dir: PathBuf,
    progress_every: usize,
    progress: Option<ProgressFn>,
}

impl BatchOrchestrator {
    pub fn new(
        pipeline: Box<dyn ItemPipeline>,
        files: FileSet,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            executor: Box::new(SequentialExecutor),
            files,
            output_dir: output_dir.into(),
            progress_every: 10,
            progress: None,
        }
    }

    pub fn with_executor(mut self, executor: Box<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Log progress every `n` completed items (0 disables).
    pub fn with_progress_every(mut self, n: usize) -> Self {
        self.progress_every = n;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Process every file into the orchestrator's output directory.
    ///
    /// # Errors
    ///
    /// Fails only if the output directory cannot be created; individual
    /// item failures are reported in the summary.
    pub fn run_batch(&self, params: &ProcessingParameters) -> Result<BatchSummary, BatchError> {
        self.run_batch_into(&self.output_dir, params)
    }

    /// Process every file into `output_dir` with the given parameters.
    pub fn run_batch_into(
        &self,
        output_dir: &Path,
        params: &ProcessingParameters,
    ) -> Result<BatchSummary, BatchError> {
        create_output_dir(output_dir)?;

        let queue = WorkQueue::with_outputs(&self.files, |path| {
            self.pipeline.output_path(path, output_dir)
        });
        let total = queue.len();
        let completed = AtomicUsize::new(0);
        let start = Instant::now();

        let task = |item: &WorkItem| {
            let outcome = self.pipeline.process(&item.path, output_dir, params);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if self.progress_every > 0 && done % self.progress_every == 0 {
                info!("Progress: {}/{}", done, total);
            }
            if let Some(progress) = &self.progress {
                progress(done, total);
            }
            outcome
        };

        let outcomes = self.executor.execute(&queue, &task);
        let elapsed = start.elapsed();

        let processed = outcomes.iter().filter(|o| o.is_processed()).count();
        let summary = BatchSummary {
            pipeline: self.pipeline.name(),
            output_dir: output_dir.to_path_buf(),
            parameters: params.clone(),
            total,
            processed,
            skipped: total - processed,
            elapsed,
            outcomes,
        };

        info!(
            "Processed {} {} files in {:.3} seconds",
            summary.total,
            summary.pipeline,
            summary.elapsed.as_secs_f64()
        );
        match summary.average_per_item() {
            Some(avg) => info!("Average time per item: {:.6} seconds", avg.as_secs_f64()),
            None => info!("No items to process"),
        }
        if summary.skipped > 0 {
            warn!("{} of {} items were skipped", summary.skipped, summary.total);
        }

        Ok(summary)
    }

    /// Run the batch once per (blur, contrast) combination.
    ///
    /// Blur sizes form the outer loop and contrast values the inner loop.
    /// Each combination writes into `<output_dir>/<sweep_dir_name>` with
    /// parameters derived from `base` via [`ProcessingParameters::with_image`];
    /// neither `base` nor the orchestrator's output directory is modified.
    pub fn run_sweep(
        &self,
        base: &ProcessingParameters,
        blur_sizes: &[i32],
        contrast_values: &[f64],
    ) -> Result<SweepSummary, BatchError> {
        let mut sweep = SweepSummary {
            runs: Vec::with_capacity(blur_sizes.len() * contrast_values.len()),
        };

        for &blur in blur_sizes {
            for &contrast in contrast_values {
                let param_dir = self.output_dir.join(sweep_dir_name(blur, contrast));
                let params = base.with_image(blur, contrast);

                info!("Processing with blur={}, contrast={}", blur, contrast);

                let summary = self.run_batch_into(&param_dir, &params)?;
                sweep.runs.push(SweepRun {
                    blur_size: blur,
                    contrast,
                    summary,
                });
            }
        }

        Ok(sweep)
    }
}

fn create_output_dir(path: &Path) -> Result<(), BatchError> {
    fs::create_dir_all(path).map_err(|e| BatchError::CreateOutputDir {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::discovery::{discover, ExtensionFilter};
    use crate::processors::image_pipeline::ImagePipeline;
    use crate::processors::pipeline::{ItemDetail, ItemError};
    use crate::processors::signal_pipeline::SignalPipeline;
    use crate::processors::transformer::testing::RecordingTransformer;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Writes the blur/contrast pair it was called with into the output file.
    struct ParamEchoPipeline;

    impl ItemPipeline for ParamEchoPipeline {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn output_path(&self, input: &Path, output_dir: &Path) -> Option<PathBuf> {
            input.file_name().map(|name| output_dir.join(name))
        }

        fn process(
            &self,
            input: &Path,
            output_dir: &Path,
            params: &ProcessingParameters,
        ) -> ItemOutcome {
            let output = self.output_path(input, output_dir).unwrap();
            let body = format!(
                "{},{},{}",
                params.image.blur_size, params.image.contrast_alpha, params.image.edge_detection
            );
            match fs::write(&output, body) {
                Ok(()) => ItemOutcome::Processed {
                    input: input.to_path_buf(),
                    output,
                    detail: ItemDetail::Image {
                        width: 0,
                        height: 0,
                        edges_blended: params.image.edge_detection,
                    },
                    elapsed: Duration::ZERO,
                },
                Err(e) => ItemOutcome::Skipped {
                    input: input.to_path_buf(),
                    error: ItemError::write(&output, e),
                },
            }
        }
    }

    fn create_inputs(dir: &Path, names: &[&str]) -> FileSet {
        fs::create_dir_all(dir).unwrap();
        for name in names {
            fs::write(dir.join(name), b"pixels").unwrap();
        }
        discover(dir, &ExtensionFilter::images()).unwrap()
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn dir_names(dir: &Path) -> BTreeSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect()
    }

    /// Writes the name of the input's parent directory into a flat output.
    /// Inputs under `a/` finish late.
    struct ParentEchoPipeline;

    impl ItemPipeline for ParentEchoPipeline {
        fn name(&self) -> &'static str {
            "parent"
        }

        fn output_path(&self, input: &Path, output_dir: &Path) -> Option<PathBuf> {
            input.file_name().map(|name| output_dir.join(name))
        }

        fn process(
            &self,
            input: &Path,
            output_dir: &Path,
            _params: &ProcessingParameters,
        ) -> ItemOutcome {
            let parent = input.parent().unwrap().file_name().unwrap().to_string_lossy();
            if parent == "a" {
                std::thread::sleep(Duration::from_millis(20));
            }
            let output = self.output_path(input, output_dir).unwrap();
            fs::write(&output, parent.as_bytes()).unwrap();
            ItemOutcome::Processed {
                input: input.to_path_buf(),
                output,
                detail: ItemDetail::Image {
                    width: 0,
                    height: 0,
                    edges_blended: false,
                },
                elapsed: Duration::ZERO,
            }
        }
    }

    #[test]
    fn test_output_groups_keep_shared_outputs_together() {
        let files = FileSet::from_paths(vec![
            PathBuf::from("in/a/x.png"),
            PathBuf::from("in/a/y.png"),
            PathBuf::from("in/b/x.png"),
            PathBuf::from("/"),
            PathBuf::from("in/c/x.png"),
        ]);
        let queue = WorkQueue::with_outputs(&files, |path| {
            path.file_name().map(|name| Path::new("out").join(name))
        });

        assert_eq!(queue.output_groups(), vec![vec![0, 2, 4], vec![1], vec![3]]);
        assert_eq!(
            WorkQueue::from_file_set(&files).output_groups(),
            vec![vec![0], vec![1], vec![2], vec![3], vec![4]]
        );
    }

    #[test]
    fn test_parallel_output_matches_sequential_on_name_clash() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("in");
        for dir in ["a", "b"] {
            fs::create_dir_all(input_dir.join(dir)).unwrap();
            fs::write(input_dir.join(dir).join("x.png"), b"pixels").unwrap();
        }
        for name in ["p.png", "q.png", "r.png"] {
            fs::write(input_dir.join("b").join(name), b"pixels").unwrap();
        }
        let files = discover(&input_dir, &ExtensionFilter::images()).unwrap();

        let run = |jobs: usize, out: &Path| {
            BatchOrchestrator::new(Box::new(ParentEchoPipeline), files.clone(), out)
                .with_executor(executor_for(jobs).unwrap())
                .run_batch(&ProcessingParameters::default())
                .unwrap()
        };

        let seq_out = temp_dir.path().join("seq");
        let par_out = temp_dir.path().join("par");
        let seq = run(1, &seq_out);
        let par = run(4, &par_out);

        assert_eq!(seq.processed, 5);
        assert_eq!(par.processed, 5);
        assert_eq!(fs::read_to_string(seq_out.join("x.png")).unwrap(), "b");
        assert_eq!(fs::read_to_string(par_out.join("x.png")).unwrap(), "b");

        let inputs = |summary: &BatchSummary| -> Vec<PathBuf> {
            summary.outcomes.iter().map(|o| o.input().to_path_buf()).collect()
        };
        assert_eq!(inputs(&seq), inputs(&par));
    }

    #[test]
    fn test_sweep_dir_name() {
        assert_eq!(sweep_dir_name(5, 1.5), "blur5_contrast15");
        assert_eq!(sweep_dir_name(3, 1.0), "blur3_contrast10");
        assert_eq!(sweep_dir_name(7, 0.25), "blur7_contrast2");
    }

    #[test]
    fn test_empty_batch_has_no_average() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_inputs(&temp_dir.path().join("in"), &[]);
        let orchestrator = BatchOrchestrator::new(
            Box::new(ImagePipeline::new(RecordingTransformer::default())),
            files,
            temp_dir.path().join("out"),
        );

        let summary = orchestrator.run_batch(&ProcessingParameters::default()).unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.processed, 0);
        assert!(summary.average_per_item().is_none());
        assert!(temp_dir.path().join("out").is_dir());
    }

    #[test]
    fn test_batch_skips_bad_items_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_inputs(
            &temp_dir.path().join("in"),
            &["a.png", "corrupt.png", "c.jpg"],
        );
        let out = temp_dir.path().join("out");
        let orchestrator = BatchOrchestrator::new(
            Box::new(ImagePipeline::new(RecordingTransformer::default())),
            files,
            &out,
        );

        let summary = orchestrator.run_batch(&ProcessingParameters::default()).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert!(summary.average_per_item().is_some());
        assert_eq!(dir_names(&out), names(&["a.png", "c.jpg"]));
    }

    #[test]
    fn test_outcomes_follow_discovery_order() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_inputs(
            &temp_dir.path().join("in"),
            &["b.png", "a.png", "d.png", "c.png", "e.png"],
        );
        let expected: Vec<PathBuf> = files.iter().cloned().collect();

        let orchestrator = BatchOrchestrator::new(
            Box::new(ParamEchoPipeline),
            files,
            temp_dir.path().join("out"),
        )
        .with_executor(executor_for(3).unwrap());

        let summary = orchestrator.run_batch(&ProcessingParameters::default()).unwrap();
        let inputs: Vec<PathBuf> = summary
            .outcomes
            .iter()
            .map(|o| o.input().to_path_buf())
            .collect();
        assert_eq!(inputs, expected);
    }

    #[test]
    fn test_sweep_produces_isolated_directories() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_inputs(&temp_dir.path().join("in"), &["one.png", "two.png"]);
        let out = temp_dir.path().join("out");

        let orchestrator = BatchOrchestrator::new(Box::new(ParamEchoPipeline), files, &out);

        let mut base = ProcessingParameters::default();
        base.image.edge_detection = false;
        let before = base.clone();

        let sweep = orchestrator.run_sweep(&base, &[3, 5], &[1.0, 1.5]).unwrap();

        assert_eq!(sweep.runs.len(), 4);
        assert_eq!(sweep.total_processed(), 8);
        assert_eq!(
            dir_names(&out),
            names(&[
                "blur3_contrast10",
                "blur3_contrast15",
                "blur5_contrast10",
                "blur5_contrast15"
            ])
        );

        for (blur, contrast, dir) in [
            (3, 1.0, "blur3_contrast10"),
            (3, 1.5, "blur3_contrast15"),
            (5, 1.0, "blur5_contrast10"),
            (5, 1.5, "blur5_contrast15"),
        ] {
            for name in ["one.png", "two.png"] {
                let body = fs::read_to_string(out.join(dir).join(name)).unwrap();
                assert_eq!(body, format!("{},{},true", blur, contrast));
            }
        }

        // Iteration order: blur outer, contrast inner
        let order: Vec<(i32, f64)> = sweep.runs.iter().map(|r| (r.blur_size, r.contrast)).collect();
        assert_eq!(order, vec![(3, 1.0), (3, 1.5), (5, 1.0), (5, 1.5)]);

        // Shared state is untouched
        assert_eq!(base, before);
        assert_eq!(orchestrator.output_dir(), out.as_path());
        assert!(!out.join("one.png").exists());
    }

    #[test]
    fn test_sweep_with_empty_grid() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_inputs(&temp_dir.path().join("in"), &["one.png"]);
        let orchestrator = BatchOrchestrator::new(
            Box::new(ParamEchoPipeline),
            files,
            temp_dir.path().join("out"),
        );

        let sweep = orchestrator
            .run_sweep(&ProcessingParameters::default(), &[3], &[])
            .unwrap();
        assert!(sweep.runs.is_empty());
    }

    #[test]
    fn test_progress_callback() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_inputs(&temp_dir.path().join("in"), &["a.png", "b.png", "c.png"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let orchestrator = BatchOrchestrator::new(
            Box::new(ParamEchoPipeline),
            files,
            temp_dir.path().join("out"),
        )
        .with_progress_every(0)
        .with_progress(Box::new(move |done, total| sink.lock().unwrap().push((done, total))));

        orchestrator.run_batch(&ProcessingParameters::default()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_signal_batch() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("in");
        fs::create_dir_all(input_dir.join("nested")).unwrap();
        fs::write(input_dir.join("a.csv"), "value\n1\n5\n2\n8\n3\n").unwrap();
        fs::write(input_dir.join("nested").join("b.csv"), "value\n0\n1\n0\n").unwrap();
        fs::write(input_dir.join("ignored.CSV"), "value\n1\n").unwrap();

        let files = discover(&input_dir, &ExtensionFilter::signals()).unwrap();
        let out = temp_dir.path().join("out");
        let orchestrator = BatchOrchestrator::new(Box::new(SignalPipeline), files, &out)
            .with_progress_every(5);

        let mut params = ProcessingParameters::default();
        params.signal.window_size = 0;
        params.signal.threshold = 4.0;

        let summary = orchestrator.run_batch(&params).unwrap();
        assert_eq!(summary.pipeline, "signal");
        assert_eq!(summary.processed, 2);
        assert_eq!(
            dir_names(&out),
            names(&["processed_a.csv", "processed_b.csv"])
        );
    }

    #[test]
    fn test_output_dir_creation_failure_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();

        let orchestrator = BatchOrchestrator::new(
            Box::new(ParamEchoPipeline),
            FileSet::default(),
            blocker.join("out"),
        );

        let result = orchestrator.run_batch(&ProcessingParameters::default());
        assert!(matches!(result, Err(BatchError::CreateOutputDir { .. })));
    }
}
