//! Soft-core repulsion shared by every interaction rule.

use std::ops::AddAssign;

use swimmer_common::Vec2;

/// `2^(1/6)`: the soft-core potential is truncated where its force vanishes.
pub const SOFT_CORE_CUTOFF: f64 = 1.122_462_048_309_373;

/// Magnitude returned once a primitive sits on or past a wall surface.
pub const PENETRATION_FORCE: f64 = 10_000.0;

/// The force acting on an agent, split between its two collision primitives.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Force {
    pub body: Vec2,
    pub flagellum: Vec2,
}

impl Force {
    pub const ZERO: Force = Force {
        body: Vec2::zero(),
        flagellum: Vec2::zero(),
    };

    pub fn new(body: Vec2, flagellum: Vec2) -> Self {
        Force { body, flagellum }
    }

    /// Net force on the agent as a whole.
    pub fn total(&self) -> Vec2 {
        self.body + self.flagellum
    }
}

impl AddAssign for Force {
    fn add_assign(&mut self, other: Force) {
        self.body += other.body;
        self.flagellum += other.flagellum;
    }
}

/// Repulsive force magnitude of a primitive of size `radius` at `gap` from
/// the surface it is pushed away from.
///
/// A purely repulsive Lennard-Jones branch, `24 h (2 (r/g)^12 - (r/g)^6) / g`,
/// truncated at `g = r 2^(1/6)` where it reaches zero. A non-positive gap means
/// the primitive has already crossed the surface and gets the finite
/// [`PENETRATION_FORCE`] instead of the singular value.
#[inline]
pub fn soft_core_magnitude(radius: f64, gap: f64, hardness: f64) -> f64 {
    if gap <= 0.0 {
        PENETRATION_FORCE
    } else if gap < radius * SOFT_CORE_CUTOFF {
        let ratio_6 = (radius / gap).powi(6);
        24.0 * hardness * (2.0 * ratio_6 * ratio_6 - ratio_6) / gap
    } else {
        0.0
    }
}
