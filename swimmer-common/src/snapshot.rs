use serde::{Deserialize, Serialize};

use crate::vecmath::Vec2;

/// Full behavioural state of one agent at one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInstance {
    /// Body centre (the tracked reference point).
    pub position: Vec2,
    /// Heading in radians; the flagellum sits along this direction.
    pub direction: f64,
    /// Time left until the next tumble starts.
    pub tumble_countdown: f64,
    /// Angular velocity of an ongoing finite-duration tumble (0 when running).
    pub tumble_speed: f64,
    /// Time left in the ongoing finite-duration tumble.
    pub tumble_duration: f64,
}

impl AgentInstance {
    /// An agent at rest with its tumble timers at zero.
    pub fn at(position: Vec2, direction: f64) -> Self {
        AgentInstance {
            position,
            direction,
            ..Default::default()
        }
    }

    pub fn heading(&self) -> Vec2 {
        Vec2::from_angle(self.direction)
    }
}

/// The downsampled trajectories produced by one replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaHistory {
    /// Index of the replica inside the run.
    pub replica: usize,
    /// Physics time step (`dt`).
    pub time_step: f64,
    /// Number of ticks between two saved instances.
    pub saved_time_step_size: usize,
    /// `agents[a][k]` is agent `a` at tick `k * saved_time_step_size`.
    pub agents: Vec<Vec<AgentInstance>>,
}

impl ReplicaHistory {
    /// Number of saved steps available for every agent.
    pub fn n_saved_steps(&self) -> usize {
        self.agents.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// Simulated time of saved step `k`.
    pub fn time_of(&self, k: usize) -> f64 {
        (k * self.saved_time_step_size) as f64 * self.time_step
    }
}
