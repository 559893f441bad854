//! Command-line interface for the batch pipeline.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};

use crate::config::{Mode, PipelineConfig};
use crate::core::discovery::{discover, ExtensionFilter, FileSet};
use crate::core::loaders::load_processed_csv;
use crate::processors::analysis::{analyze_collection, CollectionReport, Range};
use crate::processors::batch::{executor_for, BatchOrchestrator, BatchSummary, SweepSummary};
use crate::processors::edge_pipeline::EdgeMapPipeline;
use crate::processors::image_pipeline::ImagePipeline;
use crate::processors::pipeline::ItemPipeline;
use crate::processors::signal_pipeline::SignalPipeline;
use crate::processors::transformer::RasterTransformer;
use crate::visualization;

#[derive(Parser)]
#[command(name = "batch-forge")]
#[command(about = "Batch image and signal processing with parameter sweeps", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every file in the input directory once
    Run {
        /// Processing mode
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Input directory containing files to process
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output directory for processed files
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Blur kernel size for image processing
        #[arg(long, allow_negative_numbers = true)]
        blur: Option<i32>,
        /// Contrast multiplier for image processing
        #[arg(long)]
        contrast: Option<f64>,
        /// Window size for signal processing
        #[arg(long, allow_negative_numbers = true)]
        window: Option<i32>,
        /// Threshold for peak detection
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<f64>,
        /// Analyse the input images before processing
        #[arg(long)]
        analysis: bool,
        /// Number of worker threads (1 = sequential)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Repeat the image batch for every blur/contrast combination
    Sweep {
        /// Input directory containing images
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output directory; one subdirectory is created per combination
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Blur sizes to sweep (comma separated)
        #[arg(long, value_delimiter = ',')]
        blur_sizes: Vec<i32>,
        /// Contrast values to sweep (comma separated)
        #[arg(long, value_delimiter = ',')]
        contrast_values: Vec<f64>,
        /// Number of worker threads (1 = sequential)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Write a standalone edge map for every input image
    Edges {
        /// Input directory containing images
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output directory for `<stem>_edges` images
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of worker threads (1 = sequential)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Report size and dimension statistics for the input images
    Analyze {
        /// Input directory containing images
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Plot a processed signal CSV as PNG
    Plot {
        /// Processed CSV with original,filtered,is_peak columns
        csv_file: PathBuf,
        /// Output PNG file path (defaults to the CSV path with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar for a batch of `total` items
fn create_progress_bar(total: usize, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 37 {
            let truncated: String = value.chars().take(34).collect();
            format!("{}...", truncated)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<37} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(level_for_verbosity(cli.verbose))
        .format_timestamp_secs()
        .init();

    let result = load_config(cli.config.as_deref())
        .and_then(|config| dispatch(cli.command, config));

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// `-v` shows per-item `Processed:` lines and progress; `-vv` adds debug output.
fn level_for_verbosity(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml(path)
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn dispatch(command: Commands, mut config: PipelineConfig) -> Result<()> {
    match command {
        Commands::Run {
            mode,
            input,
            output,
            blur,
            contrast,
            window,
            threshold,
            analysis,
            jobs,
        } => {
            // Flags override the config file
            if let Some(mode) = mode {
                config.mode = mode;
            }
            if let Some(input) = input {
                config.io.input_dir = input;
            }
            if let Some(output) = output {
                config.io.output_dir = output;
            }
            if let Some(blur) = blur {
                config.parameters.image.blur_size = blur;
            }
            if let Some(contrast) = contrast {
                config.parameters.image.contrast_alpha = contrast;
            }
            if let Some(window) = window {
                config.parameters.signal.window_size = window;
            }
            if let Some(threshold) = threshold {
                config.parameters.signal.threshold = threshold;
            }
            if let Some(jobs) = jobs {
                config.execution.jobs = jobs;
            }
            cmd_run(&config, analysis)
        }
        Commands::Sweep {
            input,
            output,
            blur_sizes,
            contrast_values,
            jobs,
        } => {
            if let Some(input) = input {
                config.io.input_dir = input;
            }
            if let Some(output) = output {
                config.io.output_dir = output;
            }
            if !blur_sizes.is_empty() {
                config.sweep.blur_sizes = blur_sizes;
            }
            if !contrast_values.is_empty() {
                config.sweep.contrast_values = contrast_values;
            }
            if let Some(jobs) = jobs {
                config.execution.jobs = jobs;
            }
            cmd_sweep(&config)
        }
        Commands::Edges { input, output, jobs } => {
            if let Some(input) = input {
                config.io.input_dir = input;
            }
            if let Some(output) = output {
                config.io.output_dir = output;
            }
            if let Some(jobs) = jobs {
                config.execution.jobs = jobs;
            }
            cmd_edges(&config)
        }
        Commands::Analyze { input } => {
            let input_dir = input.unwrap_or(config.io.input_dir);
            cmd_analyze(&input_dir)
        }
        Commands::Plot { csv_file, output } => cmd_plot(&csv_file, output),
    }
}

fn pipeline_for(mode: Mode) -> Box<dyn ItemPipeline> {
    match mode {
        Mode::Image => Box::new(ImagePipeline::new(RasterTransformer)),
        Mode::Signal => Box::new(SignalPipeline),
    }
}

fn discover_inputs(input_dir: &Path, mode: Mode) -> Result<FileSet> {
    let files = discover(input_dir, &ExtensionFilter::for_mode(mode))
        .with_context(|| format!("Failed to scan {}", input_dir.display()))?;
    info!("Found {} {} files for processing", files.len(), mode);
    Ok(files)
}

fn build_orchestrator(
    config: &PipelineConfig,
    pipeline: Box<dyn ItemPipeline>,
    files: FileSet,
    progress: &ProgressBar,
) -> Result<BatchOrchestrator> {
    let executor = executor_for(config.execution.jobs).context("Failed to set up workers")?;
    let progress_every = match pipeline.name() {
        "signal" => 5,
        _ => 10,
    };
    let pb = progress.clone();

    Ok(BatchOrchestrator::new(pipeline, files, &config.io.output_dir)
        .with_executor(executor)
        .with_progress_every(progress_every)
        .with_progress(Box::new(move |done, _total| pb.set_position(done as u64))))
}

fn cmd_run(config: &PipelineConfig, analysis: bool) -> Result<()> {
    println!("Starting processing in {} mode", config.mode);

    let files = discover_inputs(&config.io.input_dir, config.mode)?;

    if analysis {
        match config.mode {
            Mode::Image => report_analysis(&config.io.input_dir, &files),
            Mode::Signal => warn!("--analysis only applies to image mode; ignoring"),
        }
    }

    let pb = create_progress_bar(files.len(), "Processing");
    let orchestrator = build_orchestrator(config, pipeline_for(config.mode), files, &pb)?;
    let summary = orchestrator.run_batch(&config.parameters)?;
    pb.finish_and_clear();

    print_batch_summary("Batch Complete", &summary);
    println!("Processing completed successfully");

    Ok(())
}

fn cmd_sweep(config: &PipelineConfig) -> Result<()> {
    let mut config = config.clone();
    config.mode = Mode::Image;

    println!("Starting parameter sweep in image mode");
    println!("Blur sizes: {:?}", config.sweep.blur_sizes);
    println!("Contrast values: {:?}", config.sweep.contrast_values);

    let files = discover_inputs(&config.io.input_dir, config.mode)?;
    let combinations = config.sweep.blur_sizes.len() * config.sweep.contrast_values.len();

    let pb = create_progress_bar(files.len(), "Sweep");
    let orchestrator = build_orchestrator(&config, pipeline_for(config.mode), files, &pb)?;
    let sweep = orchestrator.run_sweep(
        &config.parameters,
        &config.sweep.blur_sizes,
        &config.sweep.contrast_values,
    )?;
    pb.finish_and_clear();

    print_sweep_summary(&config.io.output_dir, combinations, &sweep);
    println!("Processing completed successfully");

    Ok(())
}

fn cmd_edges(config: &PipelineConfig) -> Result<()> {
    println!("Starting edge extraction");

    let files = discover_inputs(&config.io.input_dir, Mode::Image)?;
    if files.is_empty() {
        warn!("No images found in {}", config.io.input_dir.display());
    }

    let pb = create_progress_bar(files.len(), "Edges");
    let pipeline = Box::new(EdgeMapPipeline::new(RasterTransformer));
    let orchestrator = build_orchestrator(config, pipeline, files, &pb)?;
    let summary = orchestrator.run_batch(&config.parameters)?;
    pb.finish_and_clear();

    print_batch_summary("Edge Extraction Complete", &summary);
    println!("Processing completed successfully");

    Ok(())
}

fn cmd_analyze(input_dir: &Path) -> Result<()> {
    let files = discover_inputs(input_dir, Mode::Image)?;
    report_analysis(input_dir, &files);
    Ok(())
}

fn report_analysis(input_dir: &Path, files: &FileSet) {
    let start = Instant::now();
    let spinner = create_spinner("Analysing images...");
    let report = analyze_collection(files, &RasterTransformer);
    spinner.finish_and_clear();

    let stats = match report {
        CollectionReport::NoItems => {
            println!("No images to analyze");
            return;
        }
        CollectionReport::Stats(stats) => stats,
    };

    let range = |r: Option<Range>| match r {
        Some(r) => format!("{} - {} pixels", r.min, r.max),
        None => "n/a (nothing decoded)".to_string(),
    };

    print_summary(
        "Image Analysis",
        &[
            ("Input directory", input_dir.display().to_string()),
            ("Number of images", stats.count.to_string()),
            ("Decoded", stats.decoded.to_string()),
            ("Total size", format!("{:.3} MB", stats.total_megabytes())),
            ("Average size", format!("{:.3} KB/image", stats.average_kilobytes())),
            ("Width range", range(stats.width)),
            ("Height range", range(stats.height)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_plot(csv_file: &Path, output: Option<PathBuf>) -> Result<()> {
    let output_path = output.unwrap_or_else(|| csv_file.with_extension("png"));

    let title = csv_file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Signal".to_string());

    let spinner = create_spinner("Loading processed signal...");
    let processed = load_processed_csv(csv_file)
        .with_context(|| format!("Failed to load {}", csv_file.display()));
    let processed = match processed {
        Ok(p) => p,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    spinner.set_message("Generating plot...");
    let plotted = visualization::plot_signal(
        &output_path,
        &processed.original,
        &processed.filtered,
        &processed.peaks,
        &title,
    );
    spinner.finish_and_clear();
    plotted.with_context(|| format!("Failed to plot {}", csv_file.display()))?;

    print_summary(
        "Plot Complete",
        &[
            ("Input file", csv_file.display().to_string()),
            ("Output PNG", output_path.display().to_string()),
            ("Samples", processed.original.len().to_string()),
            ("Peaks", processed.peaks.len().to_string()),
        ],
    );

    Ok(())
}

fn format_average(summary: &BatchSummary) -> String {
    match summary.average_per_item() {
        Some(avg) => format!("{:.6} s/item", avg.as_secs_f64()),
        None => "n/a (no items)".to_string(),
    }
}

fn print_batch_summary(title: &str, summary: &BatchSummary) {
    print_summary(
        title,
        &[
            ("Mode", summary.pipeline.to_string()),
            ("Output directory", summary.output_dir.display().to_string()),
            ("Items found", summary.total.to_string()),
            ("Processed", summary.processed.to_string()),
            ("Skipped", summary.skipped.to_string()),
            ("Total time", format!("{:.3} s", summary.elapsed.as_secs_f64())),
            ("Average time", format_average(summary)),
        ],
    );
}

fn print_sweep_summary(output_dir: &Path, combinations: usize, sweep: &SweepSummary) {
    let mut items: Vec<(&str, String)> = vec![
        ("Output directory", output_dir.display().to_string()),
        ("Combinations", combinations.to_string()),
        ("Items processed", sweep.total_processed().to_string()),
        ("Total time", format!("{:.3} s", sweep.total_elapsed().as_secs_f64())),
    ];

    for run in &sweep.runs {
        let dir = run
            .summary
            .output_dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        items.push((
            "Run",
            format!("{} {}/{} ok", dir, run.summary.processed, run.summary.total),
        ));
    }

    print_summary("Sweep Complete", &items);
}
