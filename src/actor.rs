//! Closed set of simulated entities and the operations every one of them supports.

use std::fmt;

use rand::rngs::StdRng;
use swimmer_common::{AgentInstance, RunParams, Vec2, WallConfig};

use crate::boundary::{DiskWall, PlaneWall, Side};
use crate::camera::Camera;
use crate::cell::Cell;
use crate::error::SimulationError;
use crate::force::Force;
use crate::grid::{Bounds, Map};

/// Stable handle of an actor inside its replica's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub usize);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Agent,
    DiskWall,
    PlaneWall,
}

#[derive(Debug, Clone)]
pub enum Actor {
    Agent(Cell),
    Disk(DiskWall),
    Plane(PlaneWall),
}

impl Actor {
    /// Builds the stationary actor described by a wall configuration.
    pub fn from_wall_config(config: &WallConfig) -> Actor {
        match *config {
            WallConfig::Disk { x, y, inner_radius, thickness, hardness } => {
                Actor::Disk(DiskWall::new(Vec2::new(x, y), inner_radius, thickness, hardness))
            }
            WallConfig::Top { y, thickness, hardness } => Actor::Plane(PlaneWall::new(Side::Top, y, thickness, hardness)),
            WallConfig::Bottom { y, thickness, hardness } => {
                Actor::Plane(PlaneWall::new(Side::Bottom, y, thickness, hardness))
            }
            WallConfig::Left { x, thickness, hardness } => Actor::Plane(PlaneWall::new(Side::Left, x, thickness, hardness)),
            WallConfig::Right { x, thickness, hardness } => {
                Actor::Plane(PlaneWall::new(Side::Right, x, thickness, hardness))
            }
        }
    }

    pub fn kind(&self) -> ActorKind {
        match self {
            Actor::Agent(_) => ActorKind::Agent,
            Actor::Disk(_) => ActorKind::DiskWall,
            Actor::Plane(_) => ActorKind::PlaneWall,
        }
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Actor::Agent(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn is_wall(&self) -> bool {
        !matches!(self, Actor::Agent(_))
    }

    /// Force exerted on `self` by `source`, both read at their committed state.
    ///
    /// Walls never move, so any force on them is discarded as zero. Two walls
    /// have no interaction rule at all.
    pub fn interaction(
        &self,
        id: ActorId,
        source: &Actor,
        source_id: ActorId,
        cell_hardness: f64,
    ) -> Result<Force, SimulationError> {
        match (self, source) {
            (Actor::Agent(target), Actor::Agent(other)) => Ok(target.interaction(other, cell_hardness)),
            (Actor::Agent(target), Actor::Disk(wall)) => Ok(wall.interaction(target)),
            (Actor::Agent(target), Actor::Plane(wall)) => Ok(wall.interaction(target)),
            (Actor::Disk(_) | Actor::Plane(_), Actor::Agent(_)) => Ok(Force::ZERO),
            (Actor::Disk(_) | Actor::Plane(_), Actor::Disk(_) | Actor::Plane(_)) => {
                Err(SimulationError::UnsupportedInteractionPair {
                    first: self.kind(),
                    first_id: id,
                    second: source.kind(),
                    second_id: source_id,
                })
            }
        }
    }

    /// First phase of a tick: prepare the pending state. Walls have none.
    pub fn compute_step(
        &mut self,
        id: ActorId,
        tick: usize,
        params: &RunParams,
        force: &Force,
        rng: &mut StdRng,
        n_errors: &mut usize,
    ) -> Result<(), SimulationError> {
        match self {
            Actor::Agent(cell) => cell.compute_step(id, tick, params, force, rng, n_errors),
            Actor::Disk(_) | Actor::Plane(_) => Ok(()),
        }
    }

    /// Second phase of a tick: commit the pending state.
    pub fn update_state(&mut self, id: ActorId, tick: usize, params: &RunParams, map: &mut Map) {
        if let Actor::Agent(cell) = self {
            cell.update_state(id, tick, params, map);
        }
    }

    /// Registers the actor in the spatial index at its initial place.
    pub fn register(&self, id: ActorId, map: &mut Map) {
        match self {
            Actor::Agent(cell) => map.arrive(id, cell.committed().position),
            Actor::Disk(wall) => wall.register(id, map),
            Actor::Plane(wall) => wall.register(id, map),
        }
    }

    /// Saved snapshot of an agent at `tick`; walls have no history.
    pub fn get_instance(&self, tick: usize) -> Option<&AgentInstance> {
        match self {
            Actor::Agent(cell) => cell.get_instance(tick),
            Actor::Disk(_) | Actor::Plane(_) => None,
        }
    }

    /// Distance from `point` to the wall's confining surface, positive on the
    /// allowed side. `None` for agents.
    pub fn surface_distance(&self, point: Vec2) -> Option<f64> {
        match self {
            Actor::Agent(_) => None,
            Actor::Disk(wall) => Some(wall.surface_distance(point)),
            Actor::Plane(wall) => Some(wall.surface_distance(point)),
        }
    }

    /// Extends `bounds` to cover the actor's extent.
    pub fn extend_bounds(&self, bounds: &mut Bounds) {
        match self {
            Actor::Agent(cell) => bounds.include(cell.committed().position),
            Actor::Disk(wall) => wall.extend_bounds(bounds),
            Actor::Plane(wall) => wall.extend_bounds(bounds),
        }
    }

    pub fn draw(&self, tick: usize, camera: &mut Camera) {
        match self {
            Actor::Agent(cell) => cell.draw(tick, camera),
            Actor::Disk(wall) => wall.draw(camera),
            Actor::Plane(wall) => wall.draw(camera),
        }
    }

    pub fn describe(&self, tick: usize) -> String {
        match self {
            Actor::Agent(cell) => cell.describe(tick),
            Actor::Disk(wall) => wall.describe(),
            Actor::Plane(wall) => wall.describe(),
        }
    }
}
