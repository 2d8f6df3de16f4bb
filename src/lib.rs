//! Run-and-tumble microswimmers confined by rigid walls.
//!
//! A replica is a [`simulation::Simulation`]: an arena of agents and walls, a
//! spatial index over them and a private random generator, advanced in fixed
//! ticks. The [`driver::ReplicaDriver`] runs many replicas in parallel and
//! feeds the [`analyzer::Analyzer`].

pub mod actor;
pub mod analyzer;
pub mod boundary;
pub mod camera;
pub mod cell;
pub mod driver;
pub mod error;
pub mod force;
pub mod grid;
pub mod output;
pub mod simulation;

pub use actor::{Actor, ActorId, ActorKind};
pub use analyzer::Analyzer;
pub use driver::{FrameSettings, ReplicaDriver, RunOutcome, RunSummary};
pub use error::SimulationError;
pub use simulation::Simulation;
