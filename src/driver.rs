//! Runs many independent replicas on a fixed pool of worker threads.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use swimmer_common::{PhysicsConfig, ReplicaHistory, RunParams};

use crate::analyzer::Analyzer;
use crate::camera::Camera;
use crate::simulation::Simulation;

/// Where and how completed replicas are rendered to PNG frames.
#[derive(Debug, Clone)]
pub struct FrameSettings {
    pub directory: PathBuf,
    pub base_filename: String,
    pub width: u32,
    pub height: u32,
    /// Render every n-th saved step.
    pub stride: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub n_simulations: usize,
    pub completed: usize,
    pub failed: usize,
    /// Clamped overflows of every replica plus one per failed replica.
    pub n_errors: usize,
}

pub struct RunOutcome {
    pub summary: RunSummary,
    pub elapsed: Duration,
    pub analyzer: Analyzer,
    /// Histories of the completed replicas, by replica index; empty unless kept.
    pub histories: Vec<ReplicaHistory>,
}

/// Everything the workers share, behind one mutex.
struct SharedState {
    next_index: usize,
    analyzer: Analyzer,
    completed: usize,
    failed: usize,
    n_errors: usize,
    histories: Vec<ReplicaHistory>,
}

pub struct ReplicaDriver<'a> {
    physics: &'a PhysicsConfig,
    params: &'a RunParams,
    keep_histories: bool,
    frames: Option<FrameSettings>,
}

impl<'a> ReplicaDriver<'a> {
    pub fn new(physics: &'a PhysicsConfig, params: &'a RunParams) -> Self {
        ReplicaDriver { physics, params, keep_histories: false, frames: None }
    }

    pub fn keep_histories(mut self, keep: bool) -> Self {
        self.keep_histories = keep;
        self
    }

    pub fn render_frames(mut self, frames: Option<FrameSettings>) -> Self {
        self.frames = frames;
        self
    }

    /// Runs `n_simulations` replicas on `n_threads` workers and merges every
    /// completed one into `analyzer`. Failed replicas are logged and skipped.
    pub fn run(&self, analyzer: Analyzer) -> Result<RunOutcome> {
        let n_threads = self.params.n_threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|index| format!("replica-worker-{}", index))
            .build()
            .context("Failed to build the replica worker pool")?;

        info!(
            "Running {} replicas of {} ticks on {} threads.",
            self.params.n_simulations, self.params.n_time_steps, n_threads
        );
        let start = Instant::now();
        let shared = Mutex::new(SharedState {
            next_index: 0,
            analyzer,
            completed: 0,
            failed: 0,
            n_errors: 0,
            histories: Vec::new(),
        });

        pool.scope(|scope| {
            for thread_index in 0..n_threads {
                let shared = &shared;
                scope.spawn(move |_| self.worker(thread_index, shared));
            }
        });

        let mut state = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
        state.histories.sort_by_key(|history| history.replica);
        Ok(RunOutcome {
            summary: RunSummary {
                n_simulations: self.params.n_simulations,
                completed: state.completed,
                failed: state.failed,
                n_errors: state.n_errors,
            },
            elapsed: start.elapsed(),
            analyzer: state.analyzer,
            histories: state.histories,
        })
    }

    fn worker(&self, thread_index: usize, shared: &Mutex<SharedState>) {
        let mut worker_rng = StdRng::seed_from_u64(self.params.random_seed.wrapping_add(thread_index as u64));
        loop {
            let replica = {
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if state.next_index >= self.params.n_simulations {
                    break;
                }
                state.next_index += 1;
                state.next_index - 1
            };

            let started = Instant::now();
            let replica_rng = StdRng::from_rng(&mut worker_rng);
            let outcome = Simulation::new(replica, self.physics, self.params, replica_rng).map(|mut simulation| {
                let result = simulation.compute_simulation();
                (simulation, result)
            });

            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
            match outcome {
                Ok((simulation, Ok(n_errors))) => {
                    state.n_errors += n_errors;
                    state.analyzer.merge(&simulation);
                    if self.keep_histories {
                        state.histories.push(simulation.history());
                    }
                    if let Some(frames) = &self.frames {
                        render_replica(&simulation, frames);
                    }
                    state.completed += 1;
                    info!(
                        "Replica {} finished on worker {} in {:.2} s ({} clamped overflows).",
                        replica,
                        thread_index,
                        started.elapsed().as_secs_f64(),
                        n_errors
                    );
                }
                Ok((simulation, Err(e))) => {
                    error!("Replica {} aborted at tick {}: {}", replica, simulation.tick() + 1, e);
                    state.n_errors += simulation.n_errors() + 1;
                    state.failed += 1;
                }
                Err(e) => {
                    error!("Replica {} could not be assembled: {}", replica, e);
                    state.n_errors += 1;
                    state.failed += 1;
                }
            }
        }
    }
}

/// Writes `<base>_r<replica>_<frame>.png` for every `stride`-th saved step.
pub fn render_replica(simulation: &Simulation, frames: &FrameSettings) {
    let params = simulation.params();
    for (frame, k) in (0..params.n_saved_time_steps).step_by(frames.stride.max(1)).enumerate() {
        let tick = k * params.saved_time_step_size;
        let mut camera = Camera::fit(simulation.bounds(), frames.width, frames.height);
        simulation.draw_frame(tick, &mut camera);
        let path = frames.directory.join(format!(
            "{}_r{:03}_{:05}.png",
            frames.base_filename,
            simulation.replica(),
            frame
        ));
        if let Err(e) = camera.save(&path) {
            warn!("Failed to save frame '{}': {}", path.display(), e);
            return;
        }
    }
}
