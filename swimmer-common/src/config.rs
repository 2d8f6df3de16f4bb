use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use crate::sim_params::{OverflowPolicy, RunParams};
use std::path::Path;

// ---------------------------------------------------------------------------
// Physics parameters
// ---------------------------------------------------------------------------

/// Geometry of an agent: a body disk and a flagellum disk ahead of it.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ShapeConfig {
    pub body_radius: f64,
    pub flagellum_radius: f64,
    /// Distance from the body centre to the flagellum centre, along the heading.
    pub body_flagellum_distance: f64,
    /// Offset of the rotation centre from the body centre, along the heading.
    #[serde(default)]
    pub rotation_center: f64,
}

// Run-and-tumble timing; `strength_mean == 0` disables tumbling and
// `duration_mean == 0` selects instantaneous tumbles.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TumbleConfig {
    #[serde(default = "default_tumble_delay")]
    pub delay: f64,
    #[serde(default)]
    pub strength_mean: f64,
    #[serde(default)]
    pub strength_std: f64,
    #[serde(default)]
    pub duration_mean: f64,
    #[serde(default)]
    pub duration_std: f64,
}

impl Default for TumbleConfig {
    fn default() -> Self {
        TumbleConfig {
            delay: default_tumble_delay(),
            strength_mean: 0.0,
            strength_std: 0.0,
            duration_mean: 0.0,
            duration_std: 0.0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PropulsionConfig {
    pub speed: f64,
    #[serde(default)]
    pub tumble: TumbleConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FluidConfig {
    pub diffusivity: f64,
    /// Shear relaxation time dividing the torque.
    pub shear_time: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct NoiseConfig {
    #[serde(default)]
    pub force_strength: f64,
    #[serde(default)]
    pub torque_strength: f64,
}

/// Parameters shared by every agent of a replica.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CellConfig {
    pub shape: ShapeConfig,
    pub propulsion: PropulsionConfig,
    pub fluid: FluidConfig,
    #[serde(default)]
    pub noise: NoiseConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CellInteractionConfig {
    #[serde(default = "default_cell_hardness")]
    pub hardness: f64,
}

impl Default for CellInteractionConfig {
    fn default() -> Self {
        CellInteractionConfig { hardness: default_cell_hardness() }
    }
}

/// A rigid boundary. Half-plane walls keep the agents on the side named by
/// their kind: a `top` wall at `y` confines agents to `y' > y`, a `right` wall
/// at `x` confines them to `x' < x`, and so on.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WallConfig {
    Disk {
        x: f64,
        y: f64,
        inner_radius: f64,
        thickness: f64,
        hardness: f64,
    },
    Top { y: f64, thickness: f64, hardness: f64 },
    Bottom { y: f64, thickness: f64, hardness: f64 },
    Left { x: f64, thickness: f64, hardness: f64 },
    Right { x: f64, thickness: f64, hardness: f64 },
}

impl WallConfig {
    pub fn hardness(&self) -> f64 {
        match *self {
            WallConfig::Disk { hardness, .. }
            | WallConfig::Top { hardness, .. }
            | WallConfig::Bottom { hardness, .. }
            | WallConfig::Left { hardness, .. }
            | WallConfig::Right { hardness, .. } => hardness,
        }
    }

    pub fn thickness(&self) -> f64 {
        match *self {
            WallConfig::Disk { thickness, .. }
            | WallConfig::Top { thickness, .. }
            | WallConfig::Bottom { thickness, .. }
            | WallConfig::Left { thickness, .. }
            | WallConfig::Right { thickness, .. } => thickness,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct InitialCellConfig {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub direction: f64,
}

/// Where the agents of a replica start.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum InitialConditions {
    Explicit { cells: Vec<InitialCellConfig> },
    UniformDisk { count: usize, x: f64, y: f64, radius: f64 },
    UniformBox { count: usize, left: f64, top: f64, right: f64, bottom: f64 },
}

impl InitialConditions {
    pub fn count(&self) -> usize {
        match self {
            InitialConditions::Explicit { cells } => cells.len(),
            InitialConditions::UniformDisk { count, .. } | InitialConditions::UniformBox { count, .. } => *count,
        }
    }
}

/// Physics document: agents, boundaries and initial conditions.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PhysicsConfig {
    pub cell: CellConfig,
    #[serde(default)]
    pub cell_interaction: CellInteractionConfig,
    #[serde(default)]
    pub walls: Vec<WallConfig>,
    pub initial_conditions: InitialConditions,
}

impl PhysicsConfig {
    /// Loads the physics parameters from a TOML (or `.json`) file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: PhysicsConfig = read_document(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let shape = &self.cell.shape;
        if shape.body_radius <= 0.0 || shape.flagellum_radius <= 0.0 {
            anyhow::bail!("body_radius and flagellum_radius must be positive.");
        }
        if shape.body_flagellum_distance < 0.0 {
            anyhow::bail!("body_flagellum_distance must not be negative.");
        }
        if self.cell.fluid.diffusivity < 0.0 {
            anyhow::bail!("diffusivity must not be negative.");
        }
        if self.cell.fluid.shear_time <= 0.0 {
            anyhow::bail!("shear_time must be positive.");
        }
        if self.cell.noise.force_strength < 0.0 || self.cell.noise.torque_strength < 0.0 {
            anyhow::bail!("noise strengths must not be negative.");
        }
        let tumble = &self.cell.propulsion.tumble;
        if tumble.strength_mean != 0.0 {
            if tumble.delay <= 0.0 {
                anyhow::bail!("tumble delay must be positive when tumbling is enabled.");
            }
            if tumble.strength_std < 0.0 || tumble.duration_std < 0.0 || tumble.duration_mean < 0.0 {
                anyhow::bail!("tumble standard deviations and duration must not be negative.");
            }
        }
        for wall in &self.walls {
            if wall.hardness() < 0.0 || wall.thickness() < 0.0 {
                anyhow::bail!("wall hardness and thickness must not be negative: {:?}", wall);
            }
            if let WallConfig::Disk { inner_radius, .. } = wall {
                if *inner_radius <= 0.0 {
                    anyhow::bail!("disk wall inner_radius must be positive.");
                }
            }
        }
        if self.initial_conditions.count() == 0 {
            anyhow::bail!("initial_conditions must place at least one cell.");
        }
        Ok(())
    }

    /// The first disk wall, which also defines the radial statistics frame.
    pub fn disk_wall(&self) -> Option<&WallConfig> {
        self.walls.iter().find(|wall| matches!(wall, WallConfig::Disk { .. }))
    }
}

// ---------------------------------------------------------------------------
// Simulation parameters
// ---------------------------------------------------------------------------

// Settings for the statistics collected over all replicas.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_map_resolution")]
    pub probability_map_width: usize,
    #[serde(default = "default_map_resolution")]
    pub probability_map_height: usize,
    #[serde(default = "default_radial_bins")]
    pub radial_bins: usize,
    #[serde(default = "default_near_wall_distance")]
    pub near_wall_distance: f64,
    /// Largest lag, in saved steps, of the mean squared displacement.
    #[serde(default = "default_max_displacement_lag")]
    pub max_displacement_lag: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            probability_map_width: default_map_resolution(),
            probability_map_height: default_map_resolution(),
            radial_bins: default_radial_bins(),
            near_wall_distance: default_near_wall_distance(),
            max_displacement_lag: default_max_displacement_lag(),
        }
    }
}

// Configuration for output settings.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: String,
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_stats: bool,
    #[serde(default)]
    pub save_history: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    #[serde(default)]
    pub visualization: bool,
    #[serde(default = "default_frame_size")]
    pub frame_width: u32,
    #[serde(default = "default_frame_size")]
    pub frame_height: u32,
    /// Render every n-th saved step.
    #[serde(default = "default_frame_stride")]
    pub frame_stride: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: default_output_directory(),
            base_filename: default_base_filename(),
            save_stats: true,
            save_history: false,
            format: None,
            visualization: false,
            frame_width: default_frame_size(),
            frame_height: default_frame_size(),
            frame_stride: default_frame_stride(),
        }
    }
}

// Main simulation configuration structure.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub time_step: f64,
    pub duration: f64,
    pub saved_time_step: f64,
    #[serde(default)]
    pub random_seed: u64,
    #[serde(default = "default_n_threads")]
    pub n_threads: usize,
    #[serde(default = "default_n_simulations")]
    pub n_simulations: usize,
    #[serde(default)]
    pub throw_errors: bool,
    /// Squared displacement above which a force step counts as an overflow.
    #[serde(default = "default_overflow_threshold")]
    pub overflow_threshold: f64,
    /// Spatial index bucket size; derived from the agent geometry when absent.
    #[serde(default)]
    pub cell_size: Option<f64>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML (or `.json`) file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: SimulationConfig = read_document(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.time_step > 0.0) {
            anyhow::bail!("time_step must be positive.");
        }
        if !(self.duration >= self.time_step) {
            anyhow::bail!("duration must be at least one time_step.");
        }
        if self.saved_time_step < 0.0 {
            anyhow::bail!("saved_time_step must not be negative.");
        }
        if self.saved_time_step > self.duration {
            anyhow::bail!("saved_time_step must not exceed duration.");
        }
        if self.n_threads == 0 {
            anyhow::bail!("n_threads must be greater than 0.");
        }
        if !(self.overflow_threshold > 0.0) {
            anyhow::bail!("overflow_threshold must be positive.");
        }
        if let Some(cell_size) = self.cell_size {
            if !(cell_size > 0.0) {
                anyhow::bail!("cell_size must be positive.");
            }
        }
        let analysis = &self.analysis;
        if analysis.probability_map_width == 0 || analysis.probability_map_height == 0 || analysis.radial_bins == 0 {
            anyhow::bail!("analysis resolutions must be greater than 0.");
        }
        if self.output.frame_stride == 0 {
            anyhow::bail!("frame_stride must be greater than 0.");
        }
        Ok(())
    }

    /// Converts the configuration into the parameters used at runtime.
    pub fn get_run_params(&self) -> RunParams {
        let saved_time_step_size = whole_steps(self.saved_time_step, self.time_step).max(1);
        let raw_time_steps = whole_steps(self.duration, self.time_step);
        let n_saved_time_steps = (raw_time_steps / saved_time_step_size).max(1);
        // Truncate so that the history exactly covers the run.
        let n_time_steps = n_saved_time_steps * saved_time_step_size;

        RunParams {
            dt: self.time_step,
            n_time_steps,
            saved_time_step_size,
            n_saved_time_steps,
            random_seed: self.random_seed,
            n_threads: self.n_threads,
            n_simulations: self.n_simulations,
            overflow_policy: if self.throw_errors { OverflowPolicy::Abort } else { OverflowPolicy::Clamp },
            overflow_threshold: self.overflow_threshold,
            cell_size: self.cell_size,
        }
    }
}

/// Number of whole `step`s in `span`, tolerant to rounding in the ratio.
fn whole_steps(span: f64, step: f64) -> usize {
    (span / step + 1e-9).floor() as usize
}

/// Reads a TOML document, or a JSON one when the file extension says so.
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON from '{}'", path.display()))
    } else {
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse TOML from '{}'", path.display()))
    }
}

fn default_tumble_delay() -> f64 {
    1.0
}

fn default_cell_hardness() -> f64 {
    1.0
}

fn default_map_resolution() -> usize {
    100
}

fn default_radial_bins() -> usize {
    50
}

fn default_near_wall_distance() -> f64 {
    1.0
}

fn default_max_displacement_lag() -> usize {
    50
}

fn default_output_directory() -> String {
    "output".to_string()
}

fn default_base_filename() -> String {
    "swimmers".to_string()
}

fn default_true() -> bool {
    true
}

fn default_frame_size() -> u32 {
    600
}

fn default_frame_stride() -> usize {
    1
}

fn default_n_threads() -> usize {
    1
}

fn default_n_simulations() -> usize {
    1
}

fn default_overflow_threshold() -> f64 {
    4.0
}
