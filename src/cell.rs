use log::warn;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Exp, Normal, StandardNormal};
use swimmer_common::{AgentInstance, CellConfig, OverflowPolicy, RunParams, ShapeConfig, TumbleConfig, Vec2};

use crate::actor::ActorId;
use crate::camera::Camera;
use crate::error::SimulationError;
use crate::force::{soft_core_magnitude, Force, SOFT_CORE_CUTOFF};
use crate::grid::Map;

const BODY_COLOR: [u8; 3] = [40, 200, 70];

/// Static geometry of an agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellShape {
    pub body_radius: f64,
    pub flagellum_radius: f64,
    pub body_flagellum_distance: f64,
    /// Offset of the rotation centre ahead of the body centre.
    pub rotation_center: f64,
}

impl CellShape {
    pub fn from_config(config: &ShapeConfig) -> Self {
        CellShape {
            body_radius: config.body_radius,
            flagellum_radius: config.flagellum_radius,
            body_flagellum_distance: config.body_flagellum_distance,
            rotation_center: config.rotation_center,
        }
    }

    pub fn max_radius(&self) -> f64 {
        self.body_radius.max(self.flagellum_radius)
    }

    /// Largest body-centre separation at which two agents still interact.
    /// Any wall in range of an agent is also within this distance of its body.
    pub fn interaction_reach(&self) -> f64 {
        2.0 * self.body_flagellum_distance + 2.0 * self.max_radius() * SOFT_CORE_CUTOFF
    }

    #[inline]
    pub fn flagellum_position(&self, instance: &AgentInstance) -> Vec2 {
        instance.position + instance.heading() * self.body_flagellum_distance
    }

    /// Centres and radii of the two collision primitives, body first.
    #[inline]
    pub fn primitives(&self, instance: &AgentInstance) -> [(Vec2, f64); 2] {
        [
            (instance.position, self.body_radius),
            (self.flagellum_position(instance), self.flagellum_radius),
        ]
    }
}

/// Timing model of the run-and-tumble renewal process.
#[derive(Debug, Clone)]
enum TumbleModel {
    Disabled,
    /// The whole reorientation is applied on the tick the countdown expires.
    Instantaneous { delay: Exp<f64>, strength: Normal<f64> },
    /// The agent turns at a constant speed for a drawn duration.
    Finite { delay: Exp<f64>, strength: Normal<f64>, duration: Normal<f64> },
}

impl TumbleModel {
    fn from_config(config: &TumbleConfig) -> Result<Self, SimulationError> {
        if config.strength_mean == 0.0 {
            return Ok(TumbleModel::Disabled);
        }
        let delay = Exp::new(1.0 / config.delay).map_err(|e| SimulationError::InvalidParameter {
            name: "tumble.delay",
            value: config.delay,
            reason: e.to_string(),
        })?;
        let strength = normal("tumble.strength_std", config.strength_mean, config.strength_std)?;
        if config.duration_mean == 0.0 {
            Ok(TumbleModel::Instantaneous { delay, strength })
        } else {
            let duration = normal("tumble.duration_std", config.duration_mean, config.duration_std)?;
            Ok(TumbleModel::Finite { delay, strength, duration })
        }
    }

    /// Advances the tumble timers from `committed` into `pending` and returns
    /// the tumble rotation of this tick.
    fn advance(&self, committed: &AgentInstance, pending: &mut AgentInstance, dt: f64, rng: &mut StdRng) -> f64 {
        match self {
            TumbleModel::Disabled => 0.0,
            TumbleModel::Instantaneous { delay, strength } => {
                pending.tumble_countdown = committed.tumble_countdown - dt;
                if committed.tumble_countdown > 0.0 {
                    return 0.0;
                }
                let magnitude = rng.sample(strength);
                let angle = random_sign(rng, magnitude);
                pending.tumble_countdown = rng.sample(delay);
                angle
            }
            TumbleModel::Finite { delay, strength, duration } => {
                pending.tumble_countdown = committed.tumble_countdown - dt;
                pending.tumble_duration = committed.tumble_duration - dt;
                if committed.tumble_countdown <= 0.0 {
                    pending.tumble_countdown = rng.sample(delay);
                    let magnitude = rng.sample(strength);
                    pending.tumble_speed = random_sign(rng, magnitude);
                    pending.tumble_duration = rng.sample(duration);
                } else if committed.tumble_duration <= 0.0 {
                    pending.tumble_speed = 0.0;
                }
                pending.tumble_speed * dt
            }
        }
    }
}

fn normal(name: &'static str, mean: f64, std: f64) -> Result<Normal<f64>, SimulationError> {
    // rand_distr only rejects a non-finite deviation.
    if !(std >= 0.0) {
        return Err(SimulationError::InvalidParameter {
            name,
            value: std,
            reason: "standard deviation must not be negative".to_string(),
        });
    }
    Normal::new(mean, std).map_err(|e| SimulationError::InvalidParameter {
        name,
        value: std,
        reason: e.to_string(),
    })
}

#[inline]
fn random_sign(rng: &mut StdRng, value: f64) -> f64 {
    if rng.random_bool(0.5) {
        -value
    } else {
        value
    }
}

/// A self-propelled swimmer with a body and a flagellum.
///
/// The state is double-buffered: [`Cell::compute_step`] only reads the
/// committed instance and writes the pending one, [`Cell::update_state`]
/// swaps them. Other agents therefore never observe a half-updated tick.
#[derive(Debug, Clone)]
pub struct Cell {
    shape: CellShape,
    speed: f64,
    diffusivity: f64,
    shear_time: f64,
    tumble: TumbleModel,
    tumble_delay: f64,
    /// `sqrt(2 D force_strength)`, multiplied by `sqrt(dt)` each tick.
    force_noise: f64,
    /// `sqrt(2 torque_strength)`, multiplied by `sqrt(dt)` each tick.
    torque_noise: f64,

    committed: AgentInstance,
    previous: AgentInstance,
    pending: Option<AgentInstance>,

    saved_time_step_size: usize,
    history: Vec<AgentInstance>,
}

impl Cell {
    /// Creates an agent at `initial`, which is recorded as its tick-0 state.
    pub fn new(config: &CellConfig, initial: AgentInstance, params: &RunParams) -> Result<Self, SimulationError> {
        let mut history = Vec::with_capacity(params.n_saved_time_steps);
        history.push(initial);
        Ok(Cell {
            shape: CellShape::from_config(&config.shape),
            speed: config.propulsion.speed,
            diffusivity: config.fluid.diffusivity,
            shear_time: config.fluid.shear_time,
            tumble: TumbleModel::from_config(&config.propulsion.tumble)?,
            tumble_delay: config.propulsion.tumble.delay,
            force_noise: 2f64.sqrt() * config.fluid.diffusivity.sqrt() * config.noise.force_strength.sqrt(),
            torque_noise: 2f64.sqrt() * config.noise.torque_strength.sqrt(),
            committed: initial,
            previous: initial,
            pending: None,
            saved_time_step_size: params.saved_time_step_size,
            history,
        })
    }

    pub fn shape(&self) -> &CellShape {
        &self.shape
    }

    pub fn committed(&self) -> &AgentInstance {
        &self.committed
    }

    pub fn pending(&self) -> Option<&AgentInstance> {
        self.pending.as_ref()
    }

    pub fn history(&self) -> &[AgentInstance] {
        &self.history
    }

    /// Saved snapshot at `tick`, or `None` if that tick was not saved (yet).
    pub fn get_instance(&self, tick: usize) -> Option<&AgentInstance> {
        if tick % self.saved_time_step_size != 0 {
            return None;
        }
        self.history.get(tick / self.saved_time_step_size)
    }

    /// Computes the pending state for `tick` from the committed one.
    pub fn compute_step(
        &mut self,
        id: ActorId,
        tick: usize,
        params: &RunParams,
        force: &Force,
        rng: &mut StdRng,
        n_errors: &mut usize,
    ) -> Result<(), SimulationError> {
        let dt = params.dt;
        let sqrt_dt = dt.sqrt();
        let committed = self.committed;
        let heading = committed.heading();
        let mut pending = committed;

        // Translation
        let mut drift = force.total() * (self.diffusivity * dt);
        let squared = drift.length_squared();
        if squared > params.overflow_threshold {
            match params.overflow_policy {
                OverflowPolicy::Abort => {
                    return Err(SimulationError::ForceOverflow {
                        tick,
                        agent: id,
                        position: committed.position,
                        displacement: drift,
                        squared,
                        threshold: params.overflow_threshold,
                        committed,
                        previous: self.previous,
                    });
                }
                OverflowPolicy::Clamp => {
                    *n_errors += 1;
                    warn!(
                        "Cell {} at tick {}: force displacement {:.3} clamped to {:.3} at {:?}",
                        id,
                        tick,
                        squared.sqrt(),
                        params.overflow_threshold.sqrt(),
                        committed.position
                    );
                    drift = drift * (params.overflow_threshold / squared).sqrt();
                }
            }
        }
        let noise_x: f64 = rng.sample(StandardNormal);
        let noise_y: f64 = rng.sample(StandardNormal);
        let noise = Vec2::new(noise_x, noise_y) * (self.force_noise * sqrt_dt);
        pending.position = committed.position + heading * (self.speed * dt) + drift + noise;

        // Rotation
        let rc = self.shape.rotation_center;
        let torque = -rc * heading.cross(force.body)
            + (self.shape.body_flagellum_distance - rc) * heading.cross(force.flagellum);
        let torque_noise: f64 = rng.sample(StandardNormal);
        let tumble = self.tumble.advance(&committed, &mut pending, dt, rng);
        let rotation = torque / self.shear_time * dt + torque_noise * self.torque_noise * sqrt_dt + tumble;
        pending.direction = committed.direction + rotation;

        // The body swings around the rotation centre.
        if rc != 0.0 {
            let lever = heading * -rc;
            pending.position += lever.rotate(rotation) - lever;
        }

        self.pending = Some(pending);
        Ok(())
    }

    /// Commits the pending state, moves the agent in `map` and saves the
    /// new state when `tick` is a saved tick.
    pub fn update_state(&mut self, id: ActorId, tick: usize, params: &RunParams, map: &mut Map) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        map.relocate(id, self.committed.position, pending.position);
        self.previous = self.committed;
        self.committed = pending;
        if params.is_saved_tick(tick) && self.history.len() < params.n_saved_time_steps {
            self.history.push(pending);
        }
    }

    /// Force exerted on this agent by `other`, over all four primitive pairs.
    pub fn interaction(&self, other: &Cell, hardness: f64) -> Force {
        let mine = self.shape.primitives(&self.committed);
        let theirs = other.shape.primitives(&other.committed);
        let mut on_primitive = [Vec2::zero(); 2];
        for (slot, &(center, radius)) in on_primitive.iter_mut().zip(mine.iter()) {
            for &(other_center, other_radius) in &theirs {
                *slot += pair_force(center, radius, other_center, other_radius, hardness);
            }
        }
        Force::new(on_primitive[0], on_primitive[1])
    }

    pub fn draw(&self, tick: usize, camera: &mut Camera) {
        if let Some(instance) = self.get_instance(tick) {
            draw_agent(camera, &self.shape, instance, self.tumble_delay);
        }
    }

    pub fn describe(&self, tick: usize) -> String {
        let shown = self.get_instance(tick).unwrap_or(&self.committed);
        format!(
            "cell @ tick {}\n  position: ({:.4}, {:.4})\n  direction: {:.4}\n  \
             tumble: countdown {:.4}, speed {:.4}, duration {:.4}",
            tick,
            shown.position.x,
            shown.position.y,
            shown.direction,
            shown.tumble_countdown,
            shown.tumble_speed,
            shown.tumble_duration
        )
    }
}

/// Soft-core force on a primitive at `center` from one at `other_center`.
/// Coincident primitives have no separation direction and exert nothing.
#[inline]
pub fn pair_force(center: Vec2, radius: f64, other_center: Vec2, other_radius: f64, hardness: f64) -> Vec2 {
    let separation = center - other_center;
    let distance = separation.length();
    if distance == 0.0 {
        return Vec2::zero();
    }
    separation * (soft_core_magnitude(radius + other_radius, distance, hardness) / distance)
}

/// Draws one agent snapshot: a green body and a flagellum that shifts from
/// red to blue as the next tumble approaches.
pub fn draw_agent(camera: &mut Camera, shape: &CellShape, instance: &AgentInstance, tumble_delay: f64) {
    camera.draw_disk(instance.position, shape.body_radius, BODY_COLOR);
    let urgency = if tumble_delay > 0.0 {
        (1.0 - instance.tumble_countdown / tumble_delay).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let c = (255.0 * urgency) as u8;
    camera.draw_disk(shape.flagellum_position(instance), shape.flagellum_radius, [255 - c, 0, c]);
}
