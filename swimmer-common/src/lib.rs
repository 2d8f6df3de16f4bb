pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    AnalysisConfig, CellConfig, CellInteractionConfig, FluidConfig, InitialCellConfig, InitialConditions,
    NoiseConfig, OutputConfig, PhysicsConfig, PropulsionConfig, ShapeConfig, SimulationConfig, TumbleConfig,
    WallConfig,
};
pub use sim_params::{OverflowPolicy, RunParams};
pub use snapshot::{AgentInstance, ReplicaHistory};
pub use vecmath::Vec2;
