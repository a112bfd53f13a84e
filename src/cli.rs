// ============================================================================
// FlowFill CLI — headless flood fills via command-line arguments
// ============================================================================
//
// Usage examples:
//   flowfill -i photo.png --at 10,10 --color ff0000 -o filled.png
//   flowfill -i scan.png --at 0,0 --at 40,12 --tolerance 25 --connectivity 8
//   flowfill -i *.png --at 0,0 --color 255,255,255 --output-dir out/ --format png
//   flowfill -i sketch.png --at 5,5 --animate spread.gif --fps 24 --batch 200
//   flowfill --save-defaults --tolerance 30 --connectivity 8
//
// Each input is opened as its own fill session; the fills at `--at` points run
// in order, `--undo` steps back through them, and the current image is saved.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io::{SaveFormat, encode_and_write, encode_animation, load_image};
use crate::ops::{FillEvent, FillOutcome};
use crate::raster::{Color, Connectivity, RasterImage};
use crate::session::{FillRequest, FillSession};
use crate::settings::FillSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// FlowFill tolerance-based flood fill.
#[derive(Parser, Debug)]
#[command(
    name = "flowfill",
    about = "Tolerance-based flood fill for raster images",
    long_about = "Flood-fill regions of raster images from seed points, with\n\
                  tolerance matching and dark-edge barriers. Optionally records\n\
                  the spreading fill as an animated GIF or APNG.\n\n\
                  Example:\n  \
                  flowfill -i photo.png --at 10,10 --color ff0000 -o filled.png\n  \
                  flowfill -i *.png --at 0,0 --output-dir out/ --format png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required_unless_present = "save_defaults", num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, webp, bmp, tga.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Seed point in pixel coordinates. Repeat for several fills, applied in order.
    #[arg(long = "at", value_name = "X,Y", required_unless_present = "save_defaults", value_parser = parse_point)]
    pub at: Vec<(i64, i64)>,

    /// Fill color: hex (rrggbb / rrggbbaa, optional '#') or r,g,b[,a].
    #[arg(short, long, default_value = "000000", value_parser = parse_color)]
    pub color: Color,

    /// Tolerance 0-100. Defaults to the saved setting.
    #[arg(short, long, value_name = "0-100")]
    pub tolerance: Option<u8>,

    /// Neighbor set for both fill modes: 4 or 8.
    #[arg(long, value_name = "4|8", value_parser = parse_connectivity)]
    pub connectivity: Option<Connectivity>,

    /// Pixels per animation frame.
    #[arg(long, value_name = "N")]
    pub batch: Option<usize>,

    /// Record the animated fill to FILE (.gif, .png or .apng). Single input only.
    #[arg(long, value_name = "FILE")]
    pub animate: Option<PathBuf>,

    /// Playback speed of the recorded animation.
    #[arg(long, default_value_t = 30.0)]
    pub fps: f32,

    /// Watchdog deadline for each animated fill, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Undo this many fills before saving.
    #[arg(long, default_value_t = 0, value_name = "N")]
    pub undo: usize,

    /// JPEG quality (1–100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Store --tolerance, --connectivity, --batch and --timeout-ms as the new
    /// defaults. Inputs become optional.
    #[arg(long)]
    pub save_defaults: bool,

    /// Print per-fill results, timing and log output.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    crate::logger::set_echo(args.verbose);
    if args.verbose
        && let Some(path) = crate::logger::log_path()
    {
        println!("log: {}", path.display());
    }

    let defaults = effective_settings(FillSettings::load(), &args);
    if args.save_defaults {
        let Some(path) = FillSettings::settings_path() else {
            eprintln!("error: no settings directory on this platform.");
            return ExitCode::FAILURE;
        };
        if let Err(e) = defaults.save_to(&path) {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
        log_info!("saved defaults to {}", path.display());
        println!("saved defaults → {}", path.display());
        if args.input.is_empty() {
            return ExitCode::SUCCESS;
        }
    }

    if args.at.is_empty() {
        eprintln!("error: no --at seed points given.");
        return ExitCode::FAILURE;
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.animate.is_some() {
        eprintln!("error: --animate records a single input; {} given.", inputs.len());
        return ExitCode::FAILURE;
    }

    let settings = session_settings(&defaults, args.at.len());
    let tolerance = settings.default_tolerance;
    let save_format = parse_format(args.format.as_deref(), args.output.as_deref());

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let job = FillJob {
        points: &args.at,
        color: args.color,
        tolerance,
        settings: &settings,
        animate: args.animate.as_deref(),
        fps: args.fps,
        undo: args.undo,
        verbose: args.verbose,
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, save_format, args.quality, &job) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// Saved settings with command-line overrides applied.
fn effective_settings(mut settings: FillSettings, args: &CliArgs) -> FillSettings {
    if let Some(t) = args.tolerance {
        settings.default_tolerance = t.min(100);
    }
    if let Some(c) = args.connectivity {
        settings.sync_connectivity = c;
        settings.animated_connectivity = c;
    }
    if let Some(b) = args.batch {
        settings.batch_limit = b.max(1);
    }
    if let Some(ms) = args.timeout_ms {
        settings.fill_timeout_ms = ms;
    }
    settings
}

/// Settings for one input's session: every requested fill stays undoable.
fn session_settings(defaults: &FillSettings, fills: usize) -> FillSettings {
    FillSettings {
        max_history: defaults.max_history.max(fills + 1),
        ..defaults.clone()
    }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

struct FillJob<'a> {
    points: &'a [(i64, i64)],
    color: Color,
    tolerance: u8,
    settings: &'a FillSettings,
    animate: Option<&'a Path>,
    fps: f32,
    undo: usize,
    verbose: bool,
}

fn run_one(
    input: &Path,
    output: &Path,
    format: SaveFormat,
    quality: u8,
    job: &FillJob<'_>,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let image = load_image(input).map_err(|e| format!("load failed: {}", e))?;
    let session = FillSession::new(image, job.settings.clone());
    let mut frames: Vec<RasterImage> = Vec::new();

    // -- Step 2: Fill each point -----------------------------------------
    for &(x, y) in job.points {
        let request = FillRequest::new(x, y, job.color, job.tolerance);
        let outcome = match job.animate {
            Some(_) => animate_one(&session, request, &mut frames),
            None => session.fill(request).outcome,
        };
        if job.verbose {
            println!("  ({}, {}): {}", x, y, outcome);
        }
        match outcome {
            FillOutcome::Rejected(e) => return Err(format!("fill at ({}, {}): {}", x, y, e)),
            FillOutcome::TimedOut => {
                eprintln!("  warning: fill at ({}, {}) timed out; kept partial result", x, y);
            }
            FillOutcome::Filled { .. } | FillOutcome::Unchanged(_) => {}
        }
    }

    // -- Step 3: Undo ----------------------------------------------------
    for _ in 0..job.undo {
        if session.undo().is_none() {
            break;
        }
    }

    // -- Step 4: Save ----------------------------------------------------
    encode_and_write(&session.current_image(), output, format, quality)
        .map_err(|e| format!("save failed: {}", e))?;

    if let Some(path) = job.animate {
        encode_animation(&frames, job.fps, path)
            .map_err(|e| format!("animation save failed: {}", e))?;
        if job.verbose {
            println!("  recorded {} frames → {}", frames.len(), path.display());
        }
    }

    Ok(())
}

/// Run one animated fill to completion, collecting its snapshots.
fn animate_one(session: &FillSession, request: FillRequest, frames: &mut Vec<RasterImage>) -> FillOutcome {
    let events = session.fill_animated_channel(request);
    for event in events.iter() {
        match event {
            FillEvent::Progress(image) => frames.push(image),
            FillEvent::Completed(outcome) => return outcome,
        }
    }
    // all senders gone without a completion
    FillOutcome::TimedOut
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse `X,Y` into signed pixel coordinates.
fn parse_point(s: &str) -> Result<(i64, i64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
    let x = x.trim().parse().map_err(|_| format!("bad x coordinate in '{}'", s))?;
    let y = y.trim().parse().map_err(|_| format!("bad y coordinate in '{}'", s))?;
    Ok((x, y))
}

fn parse_color(s: &str) -> Result<Color, String> {
    Color::parse(s).ok_or_else(|| format!("unrecognised color '{}'", s))
}

fn parse_connectivity(s: &str) -> Result<Connectivity, String> {
    s.trim()
        .parse()
        .ok()
        .and_then(Connectivity::from_count)
        .ok_or_else(|| format!("connectivity must be 4 or 8, got '{}'", s))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from `--format` or the output extension.
/// Defaults to PNG when neither is known.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> SaveFormat {
    format_arg
        .and_then(SaveFormat::from_extension)
        .or_else(|| output.and_then(SaveFormat::from_path))
        .unwrap_or(SaveFormat::Png)
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir`, keeping the input stem
/// 3. next to the input as `<stem>_filled.<ext>`
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_filled.{}", stem, ext)))
}
