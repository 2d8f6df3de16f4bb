//! Stationary walls confining the agents.

use swimmer_common::Vec2;

use crate::actor::ActorId;
use crate::camera::Camera;
use crate::cell::Cell;
use crate::force::{soft_core_magnitude, Force};
use crate::grid::{Bounds, Map};

const WALL_COLOR: [u8; 3] = [0, 200, 220];

/// Circular container: agents live inside `inner_radius`; the wall material
/// spans out to `inner_radius + thickness`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskWall {
    center: Vec2,
    inner_radius: f64,
    thickness: f64,
    hardness: f64,
}

impl DiskWall {
    pub fn new(center: Vec2, inner_radius: f64, thickness: f64, hardness: f64) -> Self {
        DiskWall { center, inner_radius, thickness, hardness }
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn inner_radius(&self) -> f64 {
        self.inner_radius
    }

    pub fn outer_radius(&self) -> f64 {
        self.inner_radius + self.thickness
    }

    /// Repulsion pushing both primitives of `cell` back toward the centre.
    pub fn interaction(&self, cell: &Cell) -> Force {
        let [body, flagellum] = cell.shape().primitives(cell.committed());
        Force::new(self.push(body.0, body.1), self.push(flagellum.0, flagellum.1))
    }

    fn push(&self, point: Vec2, radius: f64) -> Vec2 {
        let separation = point - self.center;
        let distance = separation.length();
        if distance == 0.0 {
            return Vec2::zero();
        }
        let magnitude = soft_core_magnitude(radius, self.inner_radius - distance, self.hardness);
        separation * (-magnitude / distance)
    }

    pub fn surface_distance(&self, point: Vec2) -> f64 {
        self.inner_radius - point.distance(self.center)
    }

    /// Registers the wall in every bucket from which its inner surface is in reach.
    pub fn register(&self, id: ActorId, map: &mut Map) {
        let reach = map.cell_size();
        map.ring(id, self.center, self.inner_radius - reach);
    }

    pub fn extend_bounds(&self, bounds: &mut Bounds) {
        let r = self.outer_radius();
        bounds.include(self.center - Vec2::new(r, r));
        bounds.include(self.center + Vec2::new(r, r));
    }

    pub fn draw(&self, camera: &mut Camera) {
        camera.draw_annulus(self.center, self.inner_radius, self.outer_radius(), WALL_COLOR);
    }

    pub fn describe(&self) -> String {
        format!(
            "disk wall\n  center: ({:.4}, {:.4})\n  radius: {:.4}..{:.4}\n  hardness: {}",
            self.center.x,
            self.center.y,
            self.inner_radius,
            self.outer_radius(),
            self.hardness
        )
    }
}

/// Which side of the world an axis-aligned wall closes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Agents stay at `y > coordinate`.
    Top,
    /// Agents stay at `y < coordinate`.
    Bottom,
    /// Agents stay at `x > coordinate`.
    Left,
    /// Agents stay at `x < coordinate`.
    Right,
}

impl Side {
    /// Unit normal pointing into the allowed half-plane.
    pub fn normal(self) -> Vec2 {
        match self {
            Side::Top => Vec2::new(0.0, 1.0),
            Side::Bottom => Vec2::new(0.0, -1.0),
            Side::Left => Vec2::new(1.0, 0.0),
            Side::Right => Vec2::new(-1.0, 0.0),
        }
    }
}

/// Half-plane wall with its surface at `coordinate`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneWall {
    side: Side,
    coordinate: f64,
    thickness: f64,
    hardness: f64,
}

impl PlaneWall {
    pub fn new(side: Side, coordinate: f64, thickness: f64, hardness: f64) -> Self {
        PlaneWall { side, coordinate, thickness, hardness }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn coordinate(&self) -> f64 {
        self.coordinate
    }

    /// Signed distance from the surface, positive on the allowed side.
    pub fn surface_distance(&self, point: Vec2) -> f64 {
        match self.side {
            Side::Top => point.y - self.coordinate,
            Side::Bottom => self.coordinate - point.y,
            Side::Left => point.x - self.coordinate,
            Side::Right => self.coordinate - point.x,
        }
    }

    pub fn interaction(&self, cell: &Cell) -> Force {
        let [body, flagellum] = cell.shape().primitives(cell.committed());
        Force::new(self.push(body.0, body.1), self.push(flagellum.0, flagellum.1))
    }

    fn push(&self, point: Vec2, radius: f64) -> Vec2 {
        self.side.normal() * soft_core_magnitude(radius, self.surface_distance(point), self.hardness)
    }

    pub fn register(&self, id: ActorId, map: &mut Map) {
        match self.side {
            Side::Top | Side::Bottom => map.horizontal(id, self.coordinate),
            Side::Left | Side::Right => map.vertical(id, self.coordinate),
        }
    }

    /// Stretches `bounds` across the wall slab along the wall normal only.
    pub fn extend_bounds(&self, bounds: &mut Bounds) {
        let outside = self.coordinate - self.side.normal().dot(Vec2::new(1.0, 1.0)) * self.thickness;
        for edge in [self.coordinate, outside] {
            match self.side {
                Side::Top | Side::Bottom => bounds.include(Vec2::new(bounds.left, edge)),
                Side::Left | Side::Right => bounds.include(Vec2::new(edge, bounds.top)),
            }
        }
    }

    pub fn draw(&self, camera: &mut Camera) {
        let view = camera.world_bounds();
        let outside = self.coordinate - self.side.normal().dot(Vec2::new(1.0, 1.0)) * self.thickness;
        let (low, high) = (self.coordinate.min(outside), self.coordinate.max(outside));
        match self.side {
            Side::Top | Side::Bottom => camera.fill_rect(view.left, low, view.right, high, WALL_COLOR),
            Side::Left | Side::Right => camera.fill_rect(low, view.top, high, view.bottom, WALL_COLOR),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{:?} wall\n  surface: {:.4}\n  thickness: {:.4}\n  hardness: {}",
            self.side, self.coordinate, self.thickness, self.hardness
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::force::{PENETRATION_FORCE, SOFT_CORE_CUTOFF};
    use approx::assert_relative_eq;
    use swimmer_common::{
        AgentInstance, CellConfig, FluidConfig, NoiseConfig, OverflowPolicy, PropulsionConfig, RunParams,
        ShapeConfig, TumbleConfig, WallConfig,
    };

    fn cell_at(position: Vec2, direction: f64) -> Cell {
        let config = CellConfig {
            shape: ShapeConfig {
                body_radius: 1.0,
                flagellum_radius: 0.5,
                body_flagellum_distance: 2.0,
                rotation_center: 0.0,
            },
            propulsion: PropulsionConfig { speed: 1.0, tumble: TumbleConfig::default() },
            fluid: FluidConfig { diffusivity: 1.0, shear_time: 1.0 },
            noise: NoiseConfig::default(),
        };
        let params = RunParams {
            dt: 0.01,
            n_time_steps: 10,
            saved_time_step_size: 1,
            n_saved_time_steps: 10,
            random_seed: 0,
            n_threads: 1,
            n_simulations: 1,
            overflow_policy: OverflowPolicy::Clamp,
            overflow_threshold: 4.0,
            cell_size: None,
        };
        Cell::new(&config, AgentInstance::at(position, direction), &params).unwrap()
    }

    fn disk() -> DiskWall {
        DiskWall::new(Vec2::zero(), 50.0, 5.0, 10.0)
    }

    #[test]
    fn disk_ignores_distant_cells() {
        // Flagellum points at the centre, body gap is 5.
        let force = disk().interaction(&cell_at(Vec2::new(45.0, 0.0), std::f64::consts::PI));
        assert_eq!(force, Force::ZERO);
    }

    #[test]
    fn disk_pushes_toward_center() {
        // Body gap 1.0 < 1.12, flagellum points inward and is out of range.
        let force = disk().interaction(&cell_at(Vec2::new(0.0, 49.0), -std::f64::consts::FRAC_PI_2));
        assert!(force.body.y < 0.0);
        assert_relative_eq!(force.body.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(force.body.y, -240.0, epsilon = 1e-9);
        assert_eq!(force.flagellum, Vec2::zero());
    }

    #[test]
    fn disk_penetration_is_constant() {
        let wall = disk();
        let force = wall.interaction(&cell_at(Vec2::new(-60.0, 0.0), std::f64::consts::PI));
        assert_relative_eq!(force.body.x, PENETRATION_FORCE, epsilon = 1e-9);
        assert_relative_eq!(force.flagellum.x, PENETRATION_FORCE, epsilon = 1e-9);
    }

    #[test]
    fn disk_center_has_no_direction() {
        let wall = DiskWall::new(Vec2::zero(), 0.5, 1.0, 1.0);
        let force = wall.interaction(&cell_at(Vec2::zero(), 0.0));
        assert_eq!(force.body, Vec2::zero());
    }

    #[test]
    fn plane_walls_push_along_their_normal() {
        let cases = [
            (PlaneWall::new(Side::Top, -10.0, 1.0, 1.0), Vec2::new(3.0, -9.5), Vec2::new(0.0, 1.0)),
            (PlaneWall::new(Side::Bottom, 10.0, 1.0, 1.0), Vec2::new(3.0, 9.5), Vec2::new(0.0, -1.0)),
            (PlaneWall::new(Side::Left, -10.0, 1.0, 1.0), Vec2::new(-9.5, 3.0), Vec2::new(1.0, 0.0)),
            (PlaneWall::new(Side::Right, 10.0, 1.0, 1.0), Vec2::new(9.5, 3.0), Vec2::new(-1.0, 0.0)),
        ];
        for (wall, position, normal) in cases {
            // Flagellum points away from the wall.
            let force = wall.interaction(&cell_at(position, normal.y.atan2(normal.x)));
            let expected = soft_core_magnitude(1.0, 0.5, 1.0);
            assert_relative_eq!(force.body.dot(normal), expected, epsilon = 1e-9);
            assert_relative_eq!(force.body.cross(normal), 0.0, epsilon = 1e-12);
            assert_eq!(force.flagellum, Vec2::zero());
        }
    }

    #[test]
    fn plane_cutoff_is_continuous() {
        let wall = PlaneWall::new(Side::Top, 0.0, 1.0, 3.0);
        let just_outside = wall.interaction(&cell_at(Vec2::new(0.0, SOFT_CORE_CUTOFF), std::f64::consts::FRAC_PI_2));
        let just_inside = wall.interaction(&cell_at(
            Vec2::new(0.0, SOFT_CORE_CUTOFF - 1e-9),
            std::f64::consts::FRAC_PI_2,
        ));
        assert_eq!(just_outside.body, Vec2::zero());
        assert!(just_inside.body.y >= 0.0 && just_inside.body.y < 1e-5);
    }

    #[test]
    fn wall_config_maps_sides() {
        let actor = Actor::from_wall_config(&WallConfig::Right { x: 4.0, thickness: 1.0, hardness: 2.0 });
        let Actor::Plane(wall) = actor else {
            panic!("expected a plane wall");
        };
        assert_eq!(wall.side(), Side::Right);
        assert_eq!(wall.coordinate(), 4.0);
        assert_eq!(wall.surface_distance(Vec2::new(3.0, 100.0)), 1.0);
    }

    #[test]
    fn bounds_cover_wall_slabs() {
        let mut bounds = Bounds::around(Vec2::zero());
        disk().extend_bounds(&mut bounds);
        assert_eq!(bounds.left, -55.0);
        assert_eq!(bounds.bottom, 55.0);
        PlaneWall::new(Side::Top, -70.0, 2.0, 1.0).extend_bounds(&mut bounds);
        assert_eq!(bounds.top, -72.0);
        assert_eq!(bounds.left, -55.0);
        PlaneWall::new(Side::Right, 60.0, 3.0, 1.0).extend_bounds(&mut bounds);
        assert_eq!(bounds.right, 63.0);
    }

    #[test]
    fn registered_disk_is_found_near_its_surface() {
        let wall = disk();
        let mut bounds = Bounds::around(Vec2::zero());
        wall.extend_bounds(&mut bounds);
        let mut map = Map::new(bounds, 4.0).unwrap();
        wall.register(ActorId(1), &mut map);
        for angle in [0.0, 0.7, 2.0, 3.9, 5.5] {
            let near_surface = Vec2::from_angle(angle) * 49.5;
            assert!(map.check(ActorId(0), near_surface).contains(&ActorId(1)));
        }
        assert!(!map.check(ActorId(0), Vec2::zero()).contains(&ActorId(1)));
    }
}
