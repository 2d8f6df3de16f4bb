//! Errors raised while assembling or stepping a replica.

use swimmer_common::{AgentInstance, Vec2};
use thiserror::Error;

use crate::actor::{ActorId, ActorKind};

#[derive(Debug, Error)]
pub enum SimulationError {
    /// The force-driven displacement of one tick exceeded the safety threshold
    /// while running with the abort policy.
    #[error(
        "force on cell {agent} too strong at tick {tick}: displacement {displacement:?} \
         (squared {squared:.3} > {threshold}) from position {position:?}"
    )]
    ForceOverflow {
        tick: usize,
        agent: ActorId,
        position: Vec2,
        displacement: Vec2,
        squared: f64,
        threshold: f64,
        /// Committed state the step was computed from (tick - 1).
        committed: AgentInstance,
        /// Committed state before that (tick - 2).
        previous: AgentInstance,
    },

    /// Two actors without an interaction rule were paired, e.g. two walls.
    #[error("no interaction defined between {first:?} ({first_id}) and {second:?} ({second_id})")]
    UnsupportedInteractionPair {
        first: ActorKind,
        first_id: ActorId,
        second: ActorKind,
        second_id: ActorId,
    },

    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: String,
    },

    #[error("invalid spatial index: {0}")]
    InvalidGrid(&'static str),
}
