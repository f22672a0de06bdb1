//! rf-compare - sample-accurate comparison of rendered audio
//!
//! Usage:
//!   rf-compare compare A B [--options STR | --config FILE] [--json]
//!   rf-compare batch DIR_A DIR_B [--options STR | --config FILE] [--jobs N] [--json]
//!   rf-compare align A B [--window SECS] [--max SECS]
//!
//! Exit status is 0 when everything compared identical (or aligned), 1 otherwise.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use rf_audio_compare::{
    open_stream, CollectSink, CompareOptions, CompareOutcome, Comparator, ContainerFormat, LogSink,
    NullSink, WindowAligner,
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "rf-compare", about = "Compare rendered audio files sample by sample")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two files
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
        /// Print the outcome as JSON instead of report lines
        #[arg(long)]
        json: bool,
    },
    /// Compare every audio file in DIR_A with the same-named file in DIR_B
    Batch {
        dir_a: PathBuf,
        dir_b: PathBuf,
        #[command(flatten)]
        options: OptionArgs,
        /// Worker threads (defaults to one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Print all outcomes as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Only estimate the offset between two files
    Align {
        a: PathBuf,
        b: PathBuf,
        /// Correlation window (seconds)
        #[arg(short, long, default_value_t = 0.5)]
        window: f64,
        /// Give up after this much audio (seconds)
        #[arg(long, default_value_t = 60.0)]
        max: f64,
    },
}

#[derive(Args)]
struct OptionArgs {
    /// Option string, e.g. "sigbits=16;autoalign=0.5;histo"
    #[arg(short, long, default_value = "")]
    options: String,
    /// JSON options file
    #[arg(short, long, conflicts_with = "options")]
    config: Option<PathBuf>,
}

impl OptionArgs {
    fn resolve(&self) -> Result<CompareOptions> {
        match &self.config {
            Some(path) => CompareOptions::from_json_file(path)
                .with_context(|| format!("Failed to load options from {}", path.display())),
            None => CompareOptions::parse(&self.options).context("Invalid option string"),
        }
    }
}

/// Prints report lines as they are produced
struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&mut self, line: &str) {
        println!("{}", line);
    }
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    let success = match cli.command {
        Commands::Compare {
            a,
            b,
            options,
            json,
        } => compare(&a, &b, options.resolve()?, json)?,
        Commands::Batch {
            dir_a,
            dir_b,
            options,
            jobs,
            json,
        } => batch(&dir_a, &dir_b, options.resolve()?, jobs, json)?,
        Commands::Align { a, b, window, max } => align(&a, &b, window, max)?,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn compare(a: &Path, b: &Path, options: CompareOptions, json: bool) -> Result<bool> {
    let comparator = Comparator::new(options);

    let outcome = if json {
        let outcome = comparator.compare_files(a, b, &mut NullSink)?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        outcome
    } else {
        let outcome = comparator.compare_files(a, b, &mut StdoutSink)?;
        println!("{}", outcome.summary());
        outcome
    };

    Ok(outcome.is_identical())
}

/// Audio files under `dir`, relative to it
fn audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if matches!(ContainerFormat::detect(path), Ok(Some(_))) {
            let relative = path
                .strip_prefix(dir)
                .context("Walked outside of the batch directory")?;
            files.push(relative.to_path_buf());
        }
    }
    Ok(files)
}

struct BatchEntry {
    file: PathBuf,
    outcome: rf_audio_compare::Result<CompareOutcome>,
    report: CollectSink,
}

fn batch(
    dir_a: &Path,
    dir_b: &Path,
    options: CompareOptions,
    jobs: Option<usize>,
    json: bool,
) -> Result<bool> {
    let files = audio_files(dir_a)?;
    if files.is_empty() {
        bail!("No audio files found in {}", dir_a.display());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .build()
        .context("Failed to build worker pool")?;
    log::info!(
        "Comparing {} file(s) on {} thread(s)",
        files.len(),
        pool.current_num_threads()
    );

    let comparator = Comparator::new(options);
    let entries: Vec<BatchEntry> = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                let mut report = CollectSink::new();
                let outcome =
                    comparator.compare_files(dir_a.join(file), dir_b.join(file), &mut report);
                BatchEntry {
                    file: file.clone(),
                    outcome,
                    report,
                }
            })
            .collect()
    });

    let identical = entries
        .iter()
        .filter(|e| matches!(&e.outcome, Ok(outcome) if outcome.is_identical()))
        .count();

    if json {
        let values: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| match &entry.outcome {
                Ok(outcome) => serde_json::json!({
                    "file": entry.file,
                    "outcome": outcome,
                }),
                Err(e) => serde_json::json!({
                    "file": entry.file,
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else {
        for entry in &entries {
            println!("== {} ==", entry.file.display());
            for line in &entry.report.lines {
                println!("  {}", line);
            }
            match &entry.outcome {
                Ok(outcome) => println!("  {}", outcome.summary()),
                Err(e) => println!("  ERROR: {}", e),
            }
        }
        println!();
        println!("{} of {} file(s) identical", identical, entries.len());
    }

    Ok(identical == entries.len())
}

fn align(a: &Path, b: &Path, window: f64, max: f64) -> Result<bool> {
    if window.is_nan() || window <= 0.0 {
        bail!("Window must be a positive duration, got {}", window);
    }

    let Some((_, mut stream_a)) = open_stream(a)? else {
        bail!("Cannot read {}", a.display());
    };
    let Some((_, mut stream_b)) = open_stream(b)? else {
        bail!("Cannot read {}", b.display());
    };

    let outcome = WindowAligner::new(window, Some(max)).align(
        stream_a.as_mut(),
        stream_b.as_mut(),
        &mut StdoutSink,
    )?;

    let skips = outcome.skips();
    println!("skip A: {} frames, skip B: {} frames", skips.a, skips.b);
    Ok(outcome.is_aligned())
}
