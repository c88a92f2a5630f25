//! hullmerge-bench: CLI tool for merge parameter experimentation and statistics.
//!
//! Splits a polyline into fragments, merges them with the batch or sweep
//! driver, and prints what happened. Useful for:
//!
//! - Comparing the batch and sweep drivers on the same input
//! - Tuning the score threshold and fragment sizes
//! - Checking which vertices a protected set keeps alive
//! - Inspecting the result visually via `--svg`
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin hullmerge-bench -- [OPTIONS] <INPUT>
//! ```
//!
//! `INPUT` is a JSON array of `[x, y]` pairs.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser, ValueEnum};
use hullmerge_core::{
    MergeConfig, MergeMode, Point, Polyline, Range, SimplifyResult, SweepStats,
};
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

/// Fragment merge experimentation and statistics for hullmerge.
///
/// Splits the input polyline into fragments, merges contiguous fragments
/// whose merged shape stays within the threshold, and reports counts,
/// timings and the simplified line.
#[derive(Parser)]
#[command(name = "hullmerge-bench", version)]
struct Cli {
    /// Path to the input polyline (JSON array of `[x, y]` pairs).
    input: PathBuf,

    /// Largest accepted chord offset for a merged fragment.
    #[arg(long, default_value_t = MergeConfig::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Candidate fragment size of the first pass.
    #[arg(long, default_value_t = MergeConfig::DEFAULT_FRAGMENT_SIZE, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    fragment_size: usize,

    /// Candidate fragment size of the last pass.
    #[arg(long, default_value_t = MergeConfig::DEFAULT_MAX_FRAGMENT_SIZE, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    max_fragment_size: usize,

    /// Envelope expansion for neighbour queries.
    #[arg(long, default_value_t = MergeConfig::DEFAULT_NEIGHBOUR_TOLERANCE)]
    tolerance: f64,

    /// Merge driver.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_MODE)]
    mode: Mode,

    /// Let sweep merges cross other fragments.
    #[arg(long)]
    allow_new_intersections: bool,

    /// Vertex indices to split the input at (comma-separated).
    ///
    /// Defaults to every vertex, i.e. one fragment per segment.
    #[arg(long, value_delimiter = ',')]
    split_at: Option<Vec<usize>>,

    /// Vertex indices that must survive simplification (comma-separated).
    #[arg(long, value_delimiter = ',')]
    protect: Vec<usize>,

    /// Write SVG output to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output the report as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Full merge config as a JSON string.
    ///
    /// When provided, all other merge parameter flags are ignored.
    /// The JSON must be a valid `MergeConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Log to stderr: `-v` for pass summaries, `-vv` for every decision.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Merge driver selection.
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Cascaded batch passes over fixed snapshots.
    Batch,
    /// Repeated left-to-right sweeps over a live index.
    Sweep,
}

/// Maps a [`MergeMode`] to the local CLI [`Mode`] enum.
const fn mode_from_core(mode: MergeMode) -> Mode {
    match mode {
        MergeMode::Batch => Mode::Batch,
        MergeMode::Sweep => Mode::Sweep,
    }
}

/// The CLI default mode, derived from [`MergeConfig::DEFAULT_MODE`] so
/// the two cannot silently diverge.
const CLI_DEFAULT_MODE: Mode = mode_from_core(MergeConfig::DEFAULT_MODE);

/// Build a [`MergeConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<MergeConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(MergeConfig {
        threshold: cli.threshold,
        fragment_size: cli.fragment_size,
        max_fragment_size: cli.max_fragment_size,
        neighbour_tolerance: cli.tolerance,
        avoid_new_intersections: !cli.allow_new_intersections,
        mode: match cli.mode {
            Mode::Batch => MergeMode::Batch,
            Mode::Sweep => MergeMode::Sweep,
        },
    })
}

const fn level_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Parse a polyline from a JSON array of `[x, y]` pairs.
fn parse_polyline(json: &str) -> Result<Polyline, serde_json::Error> {
    let pairs: Vec<[f64; 2]> = serde_json::from_str(json)?;
    Ok(Polyline::new(
        pairs.into_iter().map(|[x, y]| Point::new(x, y)).collect(),
    ))
}

fn read_polyline(path: &Path) -> Result<Polyline, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    parse_polyline(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

/// Everything one run reports.
#[derive(Serialize)]
struct Report<'a> {
    input: String,
    points: usize,
    config: &'a MergeConfig,
    input_fragments: usize,
    output_fragments: usize,
    merges: usize,
    unmerged: &'a [Range],
    sweep: Option<SweepStats>,
    simplified: &'a [Point],
    duration_ms: f64,
}

impl<'a> Report<'a> {
    fn new(
        input: &Path,
        polyline: &Polyline,
        config: &'a MergeConfig,
        result: &'a SimplifyResult,
        duration: Duration,
    ) -> Self {
        Self {
            input: input.display().to_string(),
            points: polyline.len(),
            config,
            input_fragments: result.input_fragments,
            output_fragments: result.fragments.len(),
            merges: result.merges,
            unmerged: &result.unmerged,
            sweep: result.sweep,
            simplified: result.polyline.points(),
            duration_ms: duration.as_secs_f64() * 1000.0,
        }
    }

    /// Human-readable multi-line report.
    fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Input: {} ({} points)", self.input, self.points);
        let _ = writeln!(
            out,
            "Mode: {:?}  threshold={}  sizes={}..={}",
            self.config.mode,
            self.config.threshold,
            self.config.fragment_size,
            self.config.max_fragment_size,
        );
        let _ = writeln!(
            out,
            "Fragments: {} -> {} ({} merges)",
            self.input_fragments, self.output_fragments, self.merges,
        );
        if !self.unmerged.is_empty() {
            let ranges: Vec<String> = self.unmerged.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "Unmerged candidates: {}", ranges.join(" "));
        }
        if let Some(stats) = self.sweep {
            let _ = writeln!(
                out,
                "Sweeps: {} passes, {} visited, {} scored, {} cache hits, {} rejected by validator",
                stats.passes,
                stats.visited,
                stats.scored,
                stats.cache_hits,
                stats.rejected_by_validator,
            );
        }
        let _ = writeln!(
            out,
            "Simplified: {} points ({} dropped)",
            self.simplified.len(),
            self.points.saturating_sub(self.simplified.len()),
        );
        let _ = write!(out, "Duration: {:.3}ms", self.duration_ms);
        out
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level_filter(cli.verbose))
        .init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let polyline = match read_polyline(&cli.input) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let split_at = cli
        .split_at
        .clone()
        .unwrap_or_else(|| (0..polyline.len()).collect());
    let protected: BTreeSet<usize> = cli.protect.iter().copied().collect();

    eprintln!(
        "Input: {} ({} points)",
        cli.input.display(),
        polyline.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut durations = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let start = Instant::now();
        let result = match hullmerge_core::simplify(&polyline, &split_at, &protected, &config) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Merge error: {e}");
                return ExitCode::FAILURE;
            }
        };
        let elapsed = start.elapsed();
        tracing::info!(run, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "run complete");

        let report = Report::new(&cli.input, &polyline, &config, &result, elapsed);
        if cli.json {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing report: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", report.render());
        }

        // Write SVG on the first run only.
        if run == 0
            && let Some(ref svg_path) = cli.svg
        {
            let title = cli
                .input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("hullmerge");
            let desc = format!("{config:#?}");
            let config_json = serde_json::to_string(&config).ok();
            let metadata = hullmerge_export::SvgMetadata {
                title: Some(title),
                description: Some(&desc),
                config_json: config_json.as_deref(),
            };
            let svg = hullmerge_export::to_svg(&result.fragments, &metadata);
            match std::fs::write(svg_path, &svg) {
                Ok(()) => {
                    eprintln!(
                        "SVG written to {} ({} bytes)",
                        svg_path.display(),
                        svg.len(),
                    );
                }
                Err(e) => {
                    eprintln!("Error writing SVG to {}: {e}", svg_path.display());
                }
            }
        }

        durations.push(elapsed);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&durations);
    }

    ExitCode::SUCCESS
}

/// Print aggregated timing across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(durations: &[Duration]) {
    if durations.is_empty() {
        println!("Warning: no runs to summarize");
        return;
    }

    let millis: Vec<f64> = durations.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
    let min = millis.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = millis.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = millis.iter().sum::<f64>() / millis.len() as f64;

    println!();
    println!("Summary ({} runs)\n{}", millis.len(), "=".repeat(60));
    println!("Duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");
}
