//! Tilecap
//!
//! Captures a scene larger than one frame by moving a camera across a grid of
//! viewport-sized tiles, reading each tile back and stitching them into one
//! PNG.

mod capture;
mod error;
mod grid;
mod paths;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use capture::{
    CaptureConfig, CaptureSequencer, HeadlessScreen, ImageScene, PngExporter, TriggerEvent,
};
use grid::{GridPlan, GridPoint, TileSize, WorldPoint};

/// Resolution the headless display starts at before matching the tile size.
const INITIAL_DISPLAY: (u32, u32) = (1920, 1080);

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("tilecap.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

#[derive(Parser)]
#[command(name = "tilecap", version, about = "Capture a large scene as a grid of tiles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the grid plan for a scan
    Plan {
        /// Tile size, e.g. 800x600
        #[arg(long, value_parser = parse_tile)]
        tile: (i64, i64),
        /// Scan start X,Y (use --start=-10,5 for negative values)
        #[arg(long, value_parser = parse_point, default_value = "0,0")]
        start: [f64; 2],
        /// Scan end X,Y; a single tile when omitted
        #[arg(long, value_parser = parse_point)]
        end: Option<[f64; 2]>,
    },
    /// Capture once and exit
    Capture(CaptureArgs),
    /// Capture on every line read from stdin until `q` or EOF
    Watch(CaptureArgs),
    /// Print the effective configuration
    Config {
        /// Config file (defaults to config.json next to the executable)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CaptureArgs {
    /// Scene image to capture from
    #[arg(long)]
    scene: PathBuf,
    /// Config file (defaults to config.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Project root the output directory is created in
    #[arg(long)]
    root: Option<PathBuf>,
    /// Tile size, e.g. 800x600
    #[arg(long, value_parser = parse_tile)]
    tile: Option<(i64, i64)>,
    /// Scan start X,Y
    #[arg(long, value_parser = parse_point)]
    start: Option<[f64; 2]>,
    /// Scan end X,Y
    #[arg(long, value_parser = parse_point)]
    end: Option<[f64; 2]>,
    /// Output directory name
    #[arg(long)]
    directory: Option<String>,
    /// Output file name without extension
    #[arg(long)]
    filename: Option<String>,
    /// Settle delay in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,
    /// Also write a JSON manifest next to the image
    #[arg(long)]
    manifest: bool,
}

impl CaptureArgs {
    /// Loads the config file and applies command-line overrides.
    fn resolve_config(&self) -> Result<CaptureConfig> {
        let mut config = capture::load_config(self.config.as_deref())?;
        if let Some((width, height)) = self.tile {
            config.tile_width = width;
            config.tile_height = height;
        }
        if self.start.is_some() {
            config.start_marker = self.start;
        }
        if self.end.is_some() {
            config.end_marker = self.end;
        }
        if let Some(directory) = &self.directory {
            config.directory = directory.clone();
        }
        if let Some(filename) = &self.filename {
            config.filename = filename.clone();
        }
        if let Some(settle_ms) = self.settle_ms {
            config.settle_delay_ms = settle_ms;
        }
        if self.manifest {
            config.write_manifest = true;
        }
        Ok(config)
    }
}

fn parse_tile(s: &str) -> Result<(i64, i64), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w = w.trim().parse().map_err(|e| format!("bad width '{}': {}", w, e))?;
    let h = h.trim().parse().map_err(|e| format!("bad height '{}': {}", h, e))?;
    Ok((w, h))
}

fn parse_point(s: &str) -> Result<[f64; 2], String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x '{}': {}", x, e))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y '{}': {}", y, e))?;
    if !x.is_finite() || !y.is_finite() {
        return Err(format!("position '{}' is not finite", s));
    }
    Ok([x, y])
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log(&format!("[PANIC]{} {}", location, msg));
    }));

    let cli = Cli::parse();

    if let Err(e) = paths::ensure_directories() {
        eprintln!("Warning: could not create log directory: {}", e);
    }

    match cli.command {
        Command::Plan { tile, start, end } => print_plan(tile, start, end),
        Command::Capture(args) => run_capture(&args),
        Command::Watch(args) => run_watch(&args),
        Command::Config { config } => {
            let config = capture::load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct PlanOutput {
    origin: GridPoint,
    #[serde(flatten)]
    plan: GridPlan,
    tiles: u64,
}

fn print_plan(tile: (i64, i64), start: [f64; 2], end: Option<[f64; 2]>) -> Result<()> {
    let tile = TileSize::new(tile.0, tile.1)?;
    let start = WorldPoint::new(start[0], start[1]);
    let end = end.map(|[x, y]| WorldPoint::new(x, y));
    let plan = grid::plan(tile, start, end)?;

    let output = PlanOutput {
        origin: start.round(),
        plan,
        tiles: plan.tile_count(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Builds the sequencer for the image scene and matches the display to the tile.
fn build_sequencer(
    config: &CaptureConfig,
    scene: &Path,
    root: Option<&Path>,
) -> Result<CaptureSequencer<ImageScene, PngExporter>> {
    let settings = config.to_settings()?;

    let mut screen = HeadlessScreen::new(INITIAL_DISPLAY.0, INITIAL_DISPLAY.1);
    capture::match_tile_resolution(&mut screen, settings.tile)?;

    let renderer = ImageScene::open(scene, settings.tile, config.camera_position())?;
    let root = root
        .map(Path::to_path_buf)
        .unwrap_or_else(paths::get_default_project_root);
    let exporter = PngExporter::new(root, &config.directory, &config.filename)
        .with_manifest(config.write_manifest);

    let sequencer = CaptureSequencer::new(renderer, exporter, settings);
    log(&format!(
        "Output: {}",
        sequencer.exporter().output_path().display()
    ));
    Ok(sequencer)
}

fn run_capture(args: &CaptureArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let mut sequencer = build_sequencer(&config, &args.scene, args.root.as_deref())?;

    let abort = sequencer.abort_handle();
    ctrlc::set_handler(move || abort.request_abort()).context("Failed to set Ctrl+C handler")?;

    match sequencer.capture()? {
        Some(report) => {
            println!("{}", report.path.display());
            Ok(())
        }
        None => Err(anyhow!("Capture aborted")),
    }
}

fn run_watch(args: &CaptureArgs) -> Result<()> {
    let config = args.resolve_config()?;
    let mut sequencer = build_sequencer(&config, &args.scene, args.root.as_deref())?;

    let (sender, receiver) = capture::create_trigger_queue();

    let abort = sequencer.abort_handle();
    let quit = sender.clone();
    ctrlc::set_handler(move || {
        abort.request_abort();
        let _ = quit.send(TriggerEvent::Quit);
    })
    .context("Failed to set Ctrl+C handler")?;

    // Detached: a blocked stdin read must not keep the process alive
    let _stdin = capture::spawn_stdin_triggers(sender);

    let summary = capture::watch(&mut sequencer, &receiver);
    for report in &summary.completed {
        println!("{}", report.path.display());
    }
    Ok(())
}
