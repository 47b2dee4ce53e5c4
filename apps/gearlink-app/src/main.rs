//! Gearlink transmission-joint CLI.
//!
//! Provides three modes of operation:
//! - `run`: Build a scene from TOML, step it, and print coupling statistics
//! - `validate`: Parse and validate a scene file without running it
//! - `info`: Print workspace crate versions and configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gearlink_core::config::SceneConfig;
use gearlink_core::error::GearlinkError;
use gearlink_physics::joint::AxisId;
use gearlink_sim::{CouplingStats, SceneBuilder};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Gearlink transmission-joint simulator.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a scene from a TOML file, run it, and print statistics.
    Run {
        /// Path to the scene TOML file.
        scene: PathBuf,

        /// Step count override (default: the scene's max_steps).
        #[arg(short, long)]
        steps: Option<u32>,

        /// Drive the primary axis to this position (rad) before stepping.
        #[arg(short, long)]
        drive: Option<f32>,
    },

    /// Parse and validate a scene file without running it.
    Validate {
        /// Path to the scene TOML file.
        scene: PathBuf,
    },

    /// Print crate information.
    Info,
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run_scene(path: &PathBuf, steps: Option<u32>, drive: Option<f32>) -> Result<(), GearlinkError> {
    let builder = SceneBuilder::from_file(path)?;
    let steps = steps.unwrap_or(builder.scene().simulation.max_steps);
    let backlash = builder.scene().transmission.backlash;

    let mut scene = builder.build()?;

    if let Some(position) = drive {
        if let Some(mut joint) = scene.joint_mut() {
            joint.set_position(position, AxisId::Axis1);
        }
    }

    scene.step_n(steps);

    if let Some(joint) = scene.joint() {
        println!(
            "gear={}, position1={:.4}, position2={:.4}",
            joint.gear_type(),
            joint.position(AxisId::Axis1),
            joint.position(AxisId::Axis2),
        );
    }

    let stats = scene.app.world().resource::<CouplingStats>();
    println!(
        "steps={}, deviation={:.5} (max {:.5}), within_backlash={}",
        stats.steps,
        stats.last_deviation,
        stats.max_abs_deviation,
        stats.within_backlash(backlash),
    );
    Ok(())
}

fn validate_scene(path: &PathBuf) -> Result<(), GearlinkError> {
    let scene = SceneConfig::from_file(path)?;
    println!(
        "ok: {} bodies, transmission {} -> {}{}, multiplier={}, backlash={}",
        scene.bodies.len(),
        scene.transmission.parent,
        scene.transmission.end_point,
        scene
            .transmission
            .start_point
            .as_ref()
            .map(|sp| format!(" (via {})", sp.body_name()))
            .unwrap_or_default(),
        scene.transmission.multiplier,
        scene.transmission.backlash,
    );
    Ok(())
}

fn run_info() {
    println!("gearlink v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  gearlink-core    {}", env!("CARGO_PKG_VERSION"));
    println!("  gearlink-model   {}", env!("CARGO_PKG_VERSION"));
    println!("  gearlink-physics {}", env!("CARGO_PKG_VERSION"));
    println!("  gearlink-sim     {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("edition: 2024");
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            scene,
            steps,
            drive,
        } => run_scene(&scene, steps, drive),
        Commands::Validate { scene } => validate_scene(&scene),
        Commands::Info => {
            run_info();
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
