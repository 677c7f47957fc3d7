//! houghpix command-line interface.
//!
//! Turns Hough accumulator histograms and simulated particles into labelled
//! training squares.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand, ValueEnum};
use houghpix_algorithms::{HistogramJob, HoughPipeline};
use houghpix_core::{
    AnalysisConfig, AnalysisStatistics, ChargeRegistry, HoughHistogram, SquareCollection,
    TrackTable,
};
use houghpix_io::{
    find_histogram_files, load_config, load_track_table, parse_histogram_name,
    HistogramFileReader, TrackBuilder, TrackCsvWriter, TrainingDataWriter,
};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    HoughpixIo(#[from] houghpix_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] houghpix_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

/// Training-sample output format.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Binary HSQR container
    Bin,
    /// HDF5 X/y datasets (requires the `hdf5` feature)
    Hdf5,
}

/// Hough accumulator peak finding and truth matching.
#[derive(Parser)]
#[command(name = "houghpix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract labelled training squares from histogram files
    Process {
        /// Histogram files or directories containing them
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Particle file (JSON lines, one event per line)
        #[arg(short, long)]
        particles: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Slices to process, e.g. `-1` or `0,5,32`
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        slices: Option<Vec<i32>>,

        /// Easing strategy (Linear, InSine, InSquare, InCubic, InCirc)
        #[arg(long)]
        easing: Option<String>,

        /// Maximum number of histogram files
        #[arg(long)]
        num_files: Option<usize>,

        /// Square half-width (bins)
        #[arg(long)]
        square_size: Option<usize>,

        /// Matching tolerance (bins)
        #[arg(long)]
        tolerance: Option<f64>,

        /// Absolute peak threshold
        #[arg(long)]
        threshold: Option<f64>,

        /// Minimum peak distance (bins)
        #[arg(long)]
        min_distance: Option<usize>,

        /// Gaussian smoothing sigma before detection
        #[arg(long)]
        smooth_sigma: Option<f64>,

        /// Histogram file name prefix when scanning directories
        #[arg(long, default_value = "")]
        prefix: String,

        /// Histogram file extension when scanning directories
        #[arg(long, default_value = "hgrm")]
        extension: String,

        /// Training-sample output format
        #[arg(short, long, value_enum, default_value = "bin")]
        format: OutputFormat,
    },

    /// Show information about a histogram file
    Info {
        /// Input histogram file
        input: PathBuf,
    },

    /// Print the default configuration as JSON
    Config {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Command-line overrides applied on top of the configuration file.
struct Overrides {
    slices: Option<Vec<i32>>,
    easing: Option<String>,
    num_files: Option<usize>,
    square_size: Option<usize>,
    tolerance: Option<f64>,
    threshold: Option<f64>,
    min_distance: Option<usize>,
    smooth_sigma: Option<f64>,
}

impl Overrides {
    fn apply(self, mut config: AnalysisConfig) -> Result<AnalysisConfig> {
        if let Some(slices) = self.slices {
            config.processing.slice_list = slices;
        }
        if let Some(name) = self.easing {
            config = config.with_easing_name(&name)?;
        }
        if let Some(n) = self.num_files {
            config.processing.num_files = n;
        }
        if let Some(size) = self.square_size {
            config.hough.square_size = size;
        }
        if let Some(tolerance) = self.tolerance {
            config.hough.tolerance = tolerance;
        }
        if let Some(threshold) = self.threshold {
            config.peak_detection.threshold_abs = threshold;
        }
        if let Some(distance) = self.min_distance {
            config.peak_detection.min_distance = distance;
        }
        if let Some(sigma) = self.smooth_sigma {
            config.peak_detection.smooth_sigma = sigma;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Process {
            input,
            particles,
            output,
            config,
            slices,
            easing,
            num_files,
            square_size,
            tolerance,
            threshold,
            min_distance,
            smooth_sigma,
            prefix,
            extension,
            format,
        } => {
            let base = match &config {
                Some(path) => load_config(path)?,
                None => AnalysisConfig::default(),
            };
            let config = Overrides {
                slices,
                easing,
                num_files,
                square_size,
                tolerance,
                threshold,
                min_distance,
                smooth_sigma,
            }
            .apply(base)?;

            let files = collect_inputs(&input, &prefix, &extension)?;
            process(&config, &files, &particles, &output, format)
        }
        Commands::Info { input } => info_command(&input),
        Commands::Config { output } => {
            let json = serde_json::to_string_pretty(&AnalysisConfig::default())?;
            match output {
                Some(path) => fs::write(path, format!("{json}\n"))?,
                None => println!("{json}"),
            }
            Ok(())
        }
    }
}

fn collect_inputs(input: &[PathBuf], prefix: &str, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in input {
        if path.is_dir() {
            files.extend(find_histogram_files(path, prefix, extension)?);
        } else {
            files.push(path.clone());
        }
    }
    if files.is_empty() {
        return Err(CliError::Usage("no histogram files found".to_string()));
    }
    Ok(files)
}

fn process(
    config: &AnalysisConfig,
    files: &[PathBuf],
    particles: &Path,
    output: &Path,
    format: OutputFormat,
) -> Result<()> {
    let start = Instant::now();
    let pipeline = HoughPipeline::new(config)?;

    let registry = ChargeRegistry::new();
    let mut table = load_track_table(particles, &TrackBuilder::from_config(config), &registry)?;

    let limit = config.processing.num_files.min(files.len());
    if limit < files.len() {
        info!("processing the first {limit} of {} files", files.len());
    }

    let mut stats = AnalysisStatistics::new(limit);
    let mut squares = SquareCollection::new();

    let chunk_size = rayon::current_num_threads().max(1);
    for path in &files[..limit] {
        let newly = if is_hdf5(path) {
            process_hdf5_file(&pipeline, path, chunk_size, &mut table, &mut stats, &mut squares)?
        } else {
            let reader = HistogramFileReader::open(path)?;
            let newly = process_histogram_file(
                &pipeline,
                &reader,
                chunk_size,
                &mut table,
                &mut stats,
                &mut squares,
            )?;
            debug!(
                "{}: decoded {} of {} records",
                path.display(),
                reader.decoded_count(),
                reader.len()
            );
            newly
        };
        stats.increment_files();
        info!("{}: {} newly reconstructed tracks", path.display(), newly);
    }

    fs::create_dir_all(output)?;
    let training_path = write_training(output, &squares, format)?;

    let events: Vec<u64> = stats
        .event_ids()
        .iter()
        .copied()
        .filter(|&e| table.contains_event(e))
        .collect();
    let tracks_path = output.join("tracks.csv");
    let rows = TrackCsvWriter::create(&tracks_path)?.write_tracks(&table, &events)?;

    let stats_path = output.join("statistics.json");
    fs::write(&stats_path, serde_json::to_string_pretty(&stats)?)?;

    let elapsed = start.elapsed();
    println!(
        "Processed {} files ({} histograms, {} events) in {:.2}s",
        stats.processed_files,
        stats.processed_histograms,
        stats.total_events(),
        elapsed.as_secs_f64()
    );
    println!("True tracks: {}", stats.true_tracks_total);
    println!(
        "Squares: {} true, {} false",
        stats.true_squares, stats.false_squares
    );
    println!(
        "Reconstruction efficiency: {:.2}%",
        stats.reconstruction_efficiency() * 100.0
    );
    println!("Training data: {}", training_path.display());
    println!("Tracks: {} ({} rows)", tracks_path.display(), rows);
    Ok(())
}

/// Returns true if a tagged histogram will be processed, so its grid is
/// worth decoding.
fn wanted(pipeline: &HoughPipeline, table: &TrackTable, event_id: u64, slice_num: i32) -> bool {
    if !pipeline.wants_slice(slice_num) {
        return false;
    }
    if !table.contains_event(event_id) {
        debug!("event {event_id} has no particle record, skipping slice {slice_num}");
        return false;
    }
    true
}

/// Streams one histogram file through the pipeline.
///
/// Every record counts as a visit, but only wanted records are decoded, at
/// most `chunk_size` grids at a time.
fn process_histogram_file(
    pipeline: &HoughPipeline,
    reader: &HistogramFileReader,
    chunk_size: usize,
    table: &mut TrackTable,
    stats: &mut AnalysisStatistics,
    squares: &mut SquareCollection,
) -> Result<usize> {
    let chunk_size = chunk_size.max(1);
    let mut pending = Vec::with_capacity(chunk_size);
    let mut newly = 0;

    for tag in reader.tagged_entries() {
        stats.visit_histogram(tag.event_id);
        if !wanted(pipeline, table, tag.event_id, tag.slice_num) {
            continue;
        }
        pending.push((reader.read(tag.index)?, tag.event_id, tag.slice_num));
        if pending.len() == chunk_size {
            newly += fold_pending(pipeline, &mut pending, table, stats, squares)?;
        }
    }
    newly += fold_pending(pipeline, &mut pending, table, stats, squares)?;
    Ok(newly)
}

fn fold_pending(
    pipeline: &HoughPipeline,
    pending: &mut Vec<(HoughHistogram, u64, i32)>,
    table: &mut TrackTable,
    stats: &mut AnalysisStatistics,
    squares: &mut SquareCollection,
) -> Result<usize> {
    if pending.is_empty() {
        return Ok(0);
    }
    let newly = {
        let jobs: Vec<_> = pending
            .iter()
            .map(|(h, event_id, slice_num)| HistogramJob::new(h, *event_id, *slice_num))
            .collect();
        pipeline.fold_batch(&jobs, table, stats, squares)?
    };
    pending.clear();
    Ok(newly)
}

fn is_hdf5(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("h5") || e.eq_ignore_ascii_case("hdf5"))
}

/// Loads the wanted groups of an HDF5 histogram file and processes them in
/// chunks of `chunk_size`.
#[cfg(feature = "hdf5")]
fn process_hdf5_file(
    pipeline: &HoughPipeline,
    path: &Path,
    chunk_size: usize,
    table: &mut TrackTable,
    stats: &mut AnalysisStatistics,
    squares: &mut SquareCollection,
) -> Result<usize> {
    let mut tags = Vec::new();
    let histograms = houghpix_io::read_histograms_hdf5_where(path, |name| {
        match parse_histogram_name(name) {
            Ok((event_id, slice_num)) => {
                stats.visit_histogram(event_id);
                let keep = wanted(pipeline, table, event_id, slice_num);
                if keep {
                    tags.push((event_id, slice_num));
                }
                keep
            }
            Err(e) => {
                warn!("{}: skipping histogram: {e}", path.display());
                false
            }
        }
    })?;

    let jobs: Vec<_> = histograms
        .iter()
        .zip(tags)
        .map(|(h, (event_id, slice_num))| HistogramJob::new(h, event_id, slice_num))
        .collect();
    let mut newly = 0;
    for chunk in jobs.chunks(chunk_size.max(1)) {
        newly += pipeline.fold_batch(chunk, table, stats, squares)?;
    }
    Ok(newly)
}

#[cfg(not(feature = "hdf5"))]
fn process_hdf5_file(
    _pipeline: &HoughPipeline,
    path: &Path,
    _chunk_size: usize,
    _table: &mut TrackTable,
    _stats: &mut AnalysisStatistics,
    _squares: &mut SquareCollection,
) -> Result<usize> {
    Err(CliError::Usage(format!(
        "{}: HDF5 input requires the `hdf5` feature",
        path.display()
    )))
}

fn write_training(output: &Path, squares: &SquareCollection, format: OutputFormat) -> Result<PathBuf> {
    match format {
        OutputFormat::Bin => {
            let path = output.join("training_data.bin");
            TrainingDataWriter::create(&path)?.write_squares(squares)?;
            Ok(path)
        }
        #[cfg(feature = "hdf5")]
        OutputFormat::Hdf5 => {
            let path = output.join("training_data.h5");
            houghpix_io::write_training_hdf5(
                &path,
                squares,
                &houghpix_io::TrainingWriteOptions::default(),
            )?;
            Ok(path)
        }
        #[cfg(not(feature = "hdf5"))]
        OutputFormat::Hdf5 => Err(CliError::Usage(
            "HDF5 output requires the `hdf5` feature".to_string(),
        )),
    }
}

fn info_command(input: &Path) -> Result<()> {
    let reader = HistogramFileReader::open(input)?;
    let file_size = reader.file_size();

    println!("File: {}", input.display());
    println!(
        "Size: {} bytes ({:.2} MB)",
        file_size,
        file_size as f64 / 1_000_000.0
    );
    println!("Histograms: {}", reader.len());

    for entry in reader.entries() {
        match parse_histogram_name(&entry.name) {
            Ok((event_id, slice_num)) => println!(
                "  {:<24} {:>6} x {:<6} event {:<8} slice {}",
                entry.name, entry.rows, entry.cols, event_id, slice_num
            ),
            Err(_) => {
                warn!("unparseable histogram name '{}'", entry.name);
                println!("  {:<24} {:>6} x {:<6}", entry.name, entry.rows, entry.cols);
            }
        }
    }
    Ok(())
}
