use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};

use swimmer_common::{PhysicsConfig, SimulationConfig};
use swimmer_engine::cell::CellShape;
use swimmer_engine::output::{save_histories, HistoryFormat};
use swimmer_engine::simulation::resolve_cell_size;
use swimmer_engine::{Analyzer, FrameSettings, ReplicaDriver};

/// Simulates run-and-tumble swimmers over many independent replicas.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Physics parameters (.toml or .json)
    #[arg(short, long)]
    physics: PathBuf,

    /// Simulation parameters (.toml or .json)
    #[arg(short, long)]
    simulation: PathBuf,

    /// Output directory, overriding the one in the simulation parameters
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Starting swimmer engine...");

    // --- Load Configuration ---
    let physics = PhysicsConfig::load(&args.physics)?;
    let config = SimulationConfig::load(&args.simulation)?;
    let params = config.get_run_params();
    let cell_size = resolve_cell_size(&CellShape::from_config(&physics.cell.shape), params.cell_size)?;
    debug!("Run parameters: {:#?}", params);
    info!(
        "{} ticks of {} ({} saved every {} ticks), spatial index bucket {:.3}.",
        params.n_time_steps, params.dt, params.n_saved_time_steps, params.saved_time_step_size, cell_size
    );

    let output_dir = args.output.unwrap_or_else(|| PathBuf::from(&config.output.directory));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory '{}'", output_dir.display()))?;
    let base_filename = config.output.base_filename.as_str();

    // --- Run Replicas ---
    let frames = config.output.visualization.then(|| FrameSettings {
        directory: output_dir.clone(),
        base_filename: base_filename.to_string(),
        width: config.output.frame_width,
        height: config.output.frame_height,
        stride: config.output.frame_stride,
    });
    let analyzer = Analyzer::new(&physics, &config.analysis, &params);
    let outcome = ReplicaDriver::new(&physics, &params)
        .keep_histories(config.output.save_history)
        .render_frames(frames)
        .run(analyzer)?;

    let summary = outcome.summary;
    info!(
        "Finished {} of {} replicas in {:.3} seconds: {} failed, {} errors.",
        summary.completed,
        summary.n_simulations,
        outcome.elapsed.as_secs_f64(),
        summary.failed,
        summary.n_errors
    );
    if summary.failed > 0 {
        warn!("{} replicas failed and are missing from the statistics.", summary.failed);
    }

    // --- Save Recorded Data ---
    if config.output.save_stats {
        if let Err(e) = outcome.analyzer.save_csv(&output_dir, base_filename) {
            error!("Error saving statistics: {:#}", e);
        }
        let summary_path = output_dir.join(format!("{}_run.json", base_filename));
        match File::create(&summary_path) {
            Ok(file) => match serde_json::to_writer_pretty(file, &summary) {
                Ok(()) => info!("Run summary saved to {}", summary_path.display()),
                Err(e) => error!("Error serializing run summary: {}", e),
            },
            Err(e) => error!("Error creating summary file '{}': {}", summary_path.display(), e),
        }
    } else {
        info!("Skipping statistics as per config (save_stats is false).");
    }

    if config.output.save_history {
        let format = HistoryFormat::from_name(config.output.format.as_deref());
        if let Err(e) = save_histories(&outcome.histories, &output_dir, base_filename, format) {
            error!("Error saving histories: {:#}", e);
        }
    }

    info!("Simulation Complete.");
    Ok(())
}
