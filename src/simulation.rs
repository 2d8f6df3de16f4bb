use std::f64::consts::PI;
use std::time::Instant;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::Rng;
use swimmer_common::{AgentInstance, InitialConditions, PhysicsConfig, ReplicaHistory, RunParams, Vec2};

use crate::actor::{Actor, ActorId};
use crate::camera::Camera;
use crate::cell::{Cell, CellShape};
use crate::error::SimulationError;
use crate::force::Force;
use crate::grid::{Bounds, Map};

/// One replica: an arena of agents followed by walls, their spatial index and
/// the replica's own generator.
///
/// Every tick runs three phases over the whole arena. Forces are gathered from
/// committed states only, then every agent computes its pending state, then all
/// of them commit. The outcome therefore does not depend on iteration order.
pub struct Simulation {
    replica: usize,
    params: RunParams,
    cell_hardness: f64,
    /// Agents occupy `actors[..n_agents]`, walls the rest.
    actors: Vec<Actor>,
    n_agents: usize,
    forces: Vec<Force>,
    map: Map,
    bounds: Bounds,
    rng: StdRng,
    tick: usize,
    n_errors: usize,
}

impl Simulation {
    /// Assembles a replica; tick 0 (the initial placement) is recorded here.
    pub fn new(
        replica: usize,
        physics: &PhysicsConfig,
        params: &RunParams,
        mut rng: StdRng,
    ) -> Result<Self, SimulationError> {
        let shape = CellShape::from_config(&physics.cell.shape);
        let cell_size = resolve_cell_size(&shape, params.cell_size)?;
        let bounds = world_bounds(physics);
        let mut map = Map::new(bounds, cell_size)?;

        let initial = place_initial_cells(&physics.initial_conditions, &mut rng);
        let mut actors = Vec::with_capacity(initial.len() + physics.walls.len());
        for instance in initial {
            actors.push(Actor::Agent(Cell::new(&physics.cell, instance, params)?));
        }
        let n_agents = actors.len();
        actors.extend(physics.walls.iter().map(Actor::from_wall_config));

        for (idx, actor) in actors.iter().enumerate() {
            actor.register(ActorId(idx), &mut map);
        }
        debug!(
            "Replica {}: {} cells, {} walls, grid {:?} of {:.3}",
            replica,
            n_agents,
            actors.len() - n_agents,
            map.dimensions(),
            cell_size
        );

        Ok(Simulation {
            replica,
            params: params.clone(),
            cell_hardness: physics.cell_interaction.hardness,
            forces: vec![Force::ZERO; actors.len()],
            actors,
            n_agents,
            map,
            bounds,
            rng,
            tick: 0,
            n_errors: 0,
        })
    }

    pub fn replica(&self) -> usize {
        self.replica
    }

    /// Last committed tick.
    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn n_errors(&self) -> usize {
        self.n_errors
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn agents(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.actors[..self.n_agents].iter().filter_map(Actor::as_cell)
    }

    pub fn walls(&self) -> &[Actor] {
        &self.actors[self.n_agents..]
    }

    /// Runs one tick: query, integrate, commit.
    pub fn compute_next_step(&mut self) -> Result<(), SimulationError> {
        let tick = self.tick + 1;

        // Query: forces from the states committed at tick - 1.
        for (idx, actor) in self.actors.iter().enumerate() {
            let id = ActorId(idx);
            let mut force = Force::ZERO;
            if let Actor::Agent(cell) = actor {
                for other in self.map.check(id, cell.committed().position) {
                    force += actor.interaction(id, &self.actors[other.0], other, self.cell_hardness)?;
                }
            }
            self.forces[idx] = force;
        }

        // Integrate
        for (idx, actor) in self.actors.iter_mut().enumerate() {
            actor.compute_step(
                ActorId(idx),
                tick,
                &self.params,
                &self.forces[idx],
                &mut self.rng,
                &mut self.n_errors,
            )?;
        }

        // Commit
        for (idx, actor) in self.actors.iter_mut().enumerate() {
            actor.update_state(ActorId(idx), tick, &self.params, &mut self.map);
        }
        self.tick = tick;
        Ok(())
    }

    /// Runs the remaining ticks and returns the number of clamped overflows.
    pub fn compute_simulation(&mut self) -> Result<usize, SimulationError> {
        let start = Instant::now();
        while self.tick + 1 < self.params.n_time_steps {
            self.compute_next_step()?;
            trace!("Replica {} tick {}/{}", self.replica, self.tick, self.params.n_time_steps - 1);
        }
        debug!(
            "Replica {} ran {} ticks in {:.3} s with {} clamped overflows",
            self.replica,
            self.tick,
            start.elapsed().as_secs_f64(),
            self.n_errors
        );
        Ok(self.n_errors)
    }

    /// The saved trajectories of every agent.
    pub fn history(&self) -> ReplicaHistory {
        ReplicaHistory {
            replica: self.replica,
            time_step: self.params.dt,
            saved_time_step_size: self.params.saved_time_step_size,
            agents: self.agents().map(|cell| cell.history().to_vec()).collect(),
        }
    }

    /// Draws walls, then agents, as saved at `tick`.
    pub fn draw_frame(&self, tick: usize, camera: &mut Camera) {
        for actor in self.walls().iter().chain(&self.actors[..self.n_agents]) {
            actor.draw(tick, camera);
        }
    }

    pub fn describe(&self, tick: usize) -> String {
        let mut out = format!("replica {} @ tick {} ({} errors)\n", self.replica, tick, self.n_errors);
        for (idx, actor) in self.actors.iter().enumerate() {
            out.push_str(&format!("[{}] {}\n", ActorId(idx), actor.describe(tick)));
        }
        out.push_str("bucket occupancy:\n");
        out.push_str(&self.map.describe());
        out
    }
}

/// Bucket size of the spatial index: the configured one if it covers the
/// interaction reach of the agents, the reach itself otherwise.
pub fn resolve_cell_size(shape: &CellShape, configured: Option<f64>) -> Result<f64, SimulationError> {
    let reach = shape.interaction_reach();
    match configured {
        None => Ok(reach),
        Some(cell_size) if cell_size >= reach => Ok(cell_size),
        Some(cell_size) => Err(SimulationError::InvalidParameter {
            name: "cell_size",
            value: cell_size,
            reason: format!("smaller than the interaction reach {reach:.4}"),
        }),
    }
}

/// World rectangle covered by the initial placement region and the walls.
pub fn world_bounds(physics: &PhysicsConfig) -> Bounds {
    let mut bounds = match &physics.initial_conditions {
        InitialConditions::Explicit { cells } => {
            let mut points = cells.iter().map(|cell| Vec2::new(cell.x, cell.y));
            let mut bounds = Bounds::around(points.next().unwrap_or_default());
            points.for_each(|point| bounds.include(point));
            bounds
        }
        InitialConditions::UniformDisk { x, y, radius, .. } => Bounds {
            left: x - radius,
            top: y - radius,
            right: x + radius,
            bottom: y + radius,
        },
        InitialConditions::UniformBox { left, top, right, bottom, .. } => Bounds {
            left: left.min(*right),
            top: top.min(*bottom),
            right: left.max(*right),
            bottom: top.max(*bottom),
        },
    };
    // Disks first: plane walls only stretch the bounds along their normal.
    let walls: Vec<Actor> = physics.walls.iter().map(Actor::from_wall_config).collect();
    for wall in walls.iter().filter(|wall| matches!(wall, Actor::Disk(_))) {
        wall.extend_bounds(&mut bounds);
    }
    for wall in walls.iter().filter(|wall| matches!(wall, Actor::Plane(_))) {
        wall.extend_bounds(&mut bounds);
    }
    bounds
}

/// Draws the initial agent states from the replica generator.
pub fn place_initial_cells(conditions: &InitialConditions, rng: &mut StdRng) -> Vec<AgentInstance> {
    match conditions {
        InitialConditions::Explicit { cells } => cells
            .iter()
            .map(|cell| AgentInstance::at(Vec2::new(cell.x, cell.y), cell.direction))
            .collect(),
        InitialConditions::UniformDisk { count, x, y, radius } => (0..*count)
            .map(|_| {
                let r = radius * rng.random::<f64>().sqrt();
                let theta = rng.random_range(-PI..PI);
                let direction = rng.random_range(-PI..PI);
                AgentInstance::at(Vec2::new(*x, *y) + Vec2::from_angle(theta) * r, direction)
            })
            .collect(),
        InitialConditions::UniformBox { count, left, top, right, bottom } => (0..*count)
            .map(|_| {
                let px = left + (right - left) * rng.random::<f64>();
                let py = top + (bottom - top) * rng.random::<f64>();
                let direction = rng.random_range(-PI..PI);
                AgentInstance::at(Vec2::new(px, py), direction)
            })
            .collect(),
    }
}
