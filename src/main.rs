//! Floorplan Editor CLI
//!
//! Usage:
//!   floorplan-editor [OPTIONS] check <FILE>
//!   floorplan-editor [OPTIONS] place <FILE> --space <ID> --width <W> --height <H>
//!
//! Options:
//!   -c, --config <FILE>  Editor configuration (TOML format)
//!   -h, --help           Print help

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use floorplan_editor::{EditorConfig, EntityId, FloorFile, LayoutSession, MemoryStorage, Point};

#[derive(Parser)]
#[command(name = "floorplan-editor")]
#[command(about = "Validate and plan office floor layouts")]
struct Cli {
    /// Editor configuration file (TOML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report overlapping spaces and desks, and desks outside their space
    Check {
        /// Floor layout file
        file: PathBuf,
    },
    /// Print the free position a new desk would be placed at
    Place {
        /// Floor layout file
        file: PathBuf,

        /// Space id as written in the layout file
        #[arg(long)]
        space: u64,

        #[arg(long)]
        width: f64,

        #[arg(long)]
        height: f64,

        /// Rotation in degrees
        #[arg(long, default_value_t = 0.0)]
        rotation: f64,

        /// Preferred center as X,Y (defaults to the space's center)
        #[arg(long, value_parser = parse_point)]
        near: Option<Point>,
    },
}

fn parse_point(value: &str) -> Result<Point, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", value))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x: {}", e))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y: {}", e))?;
    Ok(Point::new(x, y))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match EditorConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => EditorConfig::default(),
    };

    let code = match cli.command {
        Command::Check { file } => check(&file, config),
        Command::Place {
            file,
            space,
            width,
            height,
            rotation,
            near,
        } => place(&file, config, space, (width, height), rotation, near),
    };
    process::exit(code);
}

/// Load a layout file into an in-memory session
fn open(
    path: &Path,
    config: EditorConfig,
) -> Result<(LayoutSession<MemoryStorage>, std::collections::BTreeMap<u64, u64>), String> {
    let file = FloorFile::from_file(path)
        .map_err(|e| format!("Error reading layout '{}': {}", path.display(), e))?;
    let storage = MemoryStorage::new();
    let ids = file.seed(&storage).map_err(|e| format!("Error: {}", e))?;
    let session = pollster::block_on(LayoutSession::open(storage, file.floor_id, config))
        .map_err(|e| format!("Error: {}", e))?;
    Ok((session, ids))
}

fn check(path: &Path, config: EditorConfig) -> i32 {
    let (session, _) = match open(path, config) {
        Ok(opened) => opened,
        Err(message) => {
            eprintln!("{}", message);
            return 1;
        }
    };

    let violations = session.violations();
    if violations.is_empty() {
        println!(
            "ok: {} space(s), {} desk(s)",
            session.spaces().len(),
            session.desks().len()
        );
        return 0;
    }
    for violation in &violations {
        println!("{}", violation);
    }
    1
}

fn place(
    path: &Path,
    config: EditorConfig,
    space: u64,
    size: (f64, f64),
    rotation: f64,
    near: Option<Point>,
) -> i32 {
    let (session, ids) = match open(path, config) {
        Ok(opened) => opened,
        Err(message) => {
            eprintln!("{}", message);
            return 1;
        }
    };
    let Some(stored) = ids.get(&space) else {
        eprintln!("Error: unknown space {}", space);
        return 1;
    };

    match session.suggest_desk_position(EntityId::Remote(*stored), size, rotation, near) {
        Ok(center) => {
            println!("{:.1},{:.1}", center.x, center.y);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
