use serde::{Deserialize, Serialize};

/// What to do when a force-driven displacement exceeds the safety threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Rescale the displacement to the threshold, count it, continue.
    Clamp,
    /// Abort the replica with a diagnostic.
    Abort,
}

/// Run parameters derived from the simulation configuration, used on every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    // Time
    pub dt: f64,
    pub n_time_steps: usize,
    pub saved_time_step_size: usize,
    pub n_saved_time_steps: usize,

    // Replicas
    pub random_seed: u64,
    pub n_threads: usize,
    pub n_simulations: usize,

    // Force overflow handling
    pub overflow_policy: OverflowPolicy,
    /// Squared distance units.
    pub overflow_threshold: f64,

    /// Explicit spatial index bucket size, if configured.
    pub cell_size: Option<f64>,
}

impl RunParams {
    /// Whether the state committed at `tick` is persisted to history.
    #[inline(always)]
    pub fn is_saved_tick(&self, tick: usize) -> bool {
        tick % self.saved_time_step_size == 0
    }
}
