use std::collections::BTreeSet;

use swimmer_common::Vec2;

use crate::actor::ActorId;
use crate::error::SimulationError;

/// Axis-aligned world rectangle, `top < bottom` (screen orientation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    pub fn around(point: Vec2) -> Self {
        Bounds { left: point.x, top: point.y, right: point.x, bottom: point.y }
    }

    pub fn include(&mut self, point: Vec2) {
        self.left = self.left.min(point.x);
        self.right = self.right.max(point.x);
        self.top = self.top.min(point.y);
        self.bottom = self.bottom.max(point.y);
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new((self.left + self.right) * 0.5, (self.top + self.bottom) * 0.5)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }
}

/// Uniform grid of buckets holding actor handles.
///
/// The grid covers the requested bounds plus one spare bucket on every side.
/// Positions outside the grid are clamped onto its border buckets, so a query
/// never fails; it only becomes less selective.
#[derive(Debug, Clone)]
pub struct Map {
    buckets: Vec<BTreeSet<ActorId>>,
    cell_size: f64,
    inv_cell_size: f64,
    left: f64,
    top: f64,
    width: usize,
    height: usize,
}

impl Map {
    pub fn new(bounds: Bounds, cell_size: f64) -> Result<Self, SimulationError> {
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(SimulationError::InvalidGrid("cell_size must be positive and finite"));
        }
        if !(bounds.width() >= 0.0) || !(bounds.height() >= 0.0) {
            return Err(SimulationError::InvalidGrid("bounds must not be inverted"));
        }
        let width = 3 + (bounds.width() / cell_size) as usize;
        let height = 3 + (bounds.height() / cell_size) as usize;
        Ok(Map {
            buckets: vec![BTreeSet::new(); width * height],
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            left: bounds.left - cell_size,
            top: bounds.top - cell_size,
            width,
            height,
        })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Grid coordinates of the bucket containing `position`, clamped to the grid.
    #[inline(always)]
    pub fn bucket_coords(&self, position: Vec2) -> (usize, usize) {
        let grid_x = ((position.x - self.left) * self.inv_cell_size).floor();
        let grid_y = ((position.y - self.top) * self.inv_cell_size).floor();
        (
            clamp_index(grid_x, self.width),
            clamp_index(grid_y, self.height),
        )
    }

    #[inline(always)]
    fn bucket_index(&self, position: Vec2) -> usize {
        let (x, y) = self.bucket_coords(position);
        y * self.width + x
    }

    /// Registers `actor` in the bucket of `position`.
    pub fn arrive(&mut self, actor: ActorId, position: Vec2) {
        let idx = self.bucket_index(position);
        self.buckets[idx].insert(actor);
    }

    /// Removes `actor` from the bucket of `position`; returns whether it was there.
    pub fn depart(&mut self, actor: ActorId, position: Vec2) -> bool {
        let idx = self.bucket_index(position);
        self.buckets[idx].remove(&actor)
    }

    /// Depart-then-arrive, even when both positions share a bucket.
    pub fn relocate(&mut self, actor: ActorId, from: Vec2, to: Vec2) -> bool {
        let was_registered = self.depart(actor, from);
        self.arrive(actor, to);
        was_registered
    }

    /// Registers a stationary actor in every bucket of the row containing `y`.
    pub fn horizontal(&mut self, actor: ActorId, y: f64) {
        let (_, row) = self.bucket_coords(Vec2::new(self.left, y));
        for x in 0..self.width {
            self.buckets[row * self.width + x].insert(actor);
        }
    }

    /// Registers a stationary actor in every bucket of the column containing `x`.
    pub fn vertical(&mut self, actor: ActorId, x: f64) {
        let (column, _) = self.bucket_coords(Vec2::new(x, self.top));
        for y in 0..self.height {
            self.buckets[y * self.width + column].insert(actor);
        }
    }

    /// Registers a stationary actor in every bucket holding at least one point
    /// at distance `>= min_radius` from `center`. A disk wall registered with
    /// `min_radius = inner_radius - reach` is therefore found from any
    /// position within `reach` of its inner surface, or beyond it.
    pub fn ring(&mut self, actor: ActorId, center: Vec2, min_radius: f64) {
        for y in 0..self.height {
            for x in 0..self.width {
                let x0 = self.left + x as f64 * self.cell_size;
                let y0 = self.top + y as f64 * self.cell_size;
                let far_x = (x0 - center.x).abs().max((x0 + self.cell_size - center.x).abs());
                let far_y = (y0 - center.y).abs().max((y0 + self.cell_size - center.y).abs());
                let farthest = Vec2::new(far_x, far_y).length();
                // Border buckets also collect every clamped outside position.
                let is_border = x == 0 || y == 0 || x + 1 == self.width || y + 1 == self.height;
                if farthest >= min_radius || is_border {
                    self.buckets[y * self.width + x].insert(actor);
                }
            }
        }
    }

    /// Candidate neighbours of `actor` at `position`: the contents of the 3x3
    /// buckets around it, without `actor` itself. Every actor registered within
    /// `cell_size` of `position` is included.
    pub fn check(&self, actor: ActorId, position: Vec2) -> BTreeSet<ActorId> {
        let (center_x, center_y) = self.bucket_coords(position);
        let mut merged = BTreeSet::new();

        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let check_x = center_x as i64 + dx;
                let check_y = center_y as i64 + dy;

                // Check if grid cell is within bounds
                if check_x >= 0 && check_x < self.width as i64 && check_y >= 0 && check_y < self.height as i64 {
                    let grid_idx = check_y as usize * self.width + check_x as usize;
                    merged.extend(self.buckets[grid_idx].iter().copied());
                }
            }
        }
        merged.remove(&actor);
        merged
    }

    /// Indices of every bucket currently holding `actor`.
    pub fn buckets_of(&self, actor: ActorId) -> Vec<usize> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| bucket.contains(&actor))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Row-major bucket index of `position`.
    pub fn bucket_of(&self, position: Vec2) -> usize {
        self.bucket_index(position)
    }

    /// Occupancy of every bucket, one grid row per line.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for row in self.buckets.chunks(self.width) {
            let line: Vec<String> = row.iter().map(|bucket| bucket.len().to_string()).collect();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }
}

#[inline(always)]
fn clamp_index(coord: f64, len: usize) -> usize {
    if coord <= 0.0 || coord.is_nan() {
        0
    } else {
        (coord as usize).min(len - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map() -> Map {
        Map::new(Bounds { left: -10.0, top: -10.0, right: 10.0, bottom: 10.0 }, 2.0).unwrap()
    }

    #[test]
    fn rejects_bad_cell_size() {
        let bounds = Bounds::around(Vec2::zero());
        assert!(Map::new(bounds, 0.0).is_err());
        assert!(Map::new(bounds, f64::NAN).is_err());
    }

    #[test]
    fn padded_dimensions() {
        let map = map();
        assert_eq!(map.dimensions(), (13, 13));
    }

    #[test]
    fn check_excludes_self() {
        let mut map = map();
        map.arrive(ActorId(0), Vec2::new(1.0, 1.0));
        map.arrive(ActorId(1), Vec2::new(1.5, 1.0));
        let found = map.check(ActorId(0), Vec2::new(1.0, 1.0));
        assert!(!found.contains(&ActorId(0)));
        assert!(found.contains(&ActorId(1)));
    }

    #[test]
    fn check_excludes_far_actors() {
        let mut map = map();
        map.arrive(ActorId(1), Vec2::new(9.0, 9.0));
        assert!(map.check(ActorId(0), Vec2::new(-9.0, -9.0)).is_empty());
    }

    #[test]
    fn relocate_keeps_single_registration() {
        let mut map = map();
        let id = ActorId(3);
        map.arrive(id, Vec2::new(0.0, 0.0));
        assert!(map.relocate(id, Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.5)));
        assert!(map.relocate(id, Vec2::new(0.5, 0.5), Vec2::new(7.0, -3.0)));
        assert_eq!(map.buckets_of(id), vec![map.bucket_of(Vec2::new(7.0, -3.0))]);
    }

    #[test]
    fn outside_positions_are_clamped() {
        let mut map = map();
        map.arrive(ActorId(1), Vec2::new(500.0, -500.0));
        assert_eq!(map.buckets_of(ActorId(1)).len(), 1);
        assert!(map.check(ActorId(0), Vec2::new(900.0, -900.0)).contains(&ActorId(1)));
        assert!(map.depart(ActorId(1), Vec2::new(500.0, -500.0)));
    }

    #[test]
    fn walls_span_their_row_and_column() {
        let mut map = map();
        map.horizontal(ActorId(7), -10.0);
        map.vertical(ActorId(8), 10.0);
        assert_eq!(map.buckets_of(ActorId(7)).len(), 13);
        assert_eq!(map.buckets_of(ActorId(8)).len(), 13);
        assert!(map.check(ActorId(0), Vec2::new(0.0, -9.0)).contains(&ActorId(7)));
        assert!(!map.check(ActorId(0), Vec2::new(0.0, 0.0)).contains(&ActorId(7)));
        assert!(map.check(ActorId(0), Vec2::new(9.5, 3.0)).contains(&ActorId(8)));
    }

    #[test]
    fn describe_counts_actors_per_bucket() {
        let mut map = map();
        map.arrive(ActorId(1), Vec2::new(1.0, 1.0));
        map.arrive(ActorId(2), Vec2::new(1.5, 1.5));
        let text = map.describe();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 13);
        let (column, row) = map.bucket_coords(Vec2::new(1.0, 1.0));
        let counts: Vec<&str> = rows[row].split(' ').collect();
        assert_eq!(counts.len(), 13);
        assert_eq!(counts[column], "2");
        let total: usize = text.split_whitespace().map(|n| n.parse::<usize>().unwrap()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn ring_is_found_near_the_inner_surface_only() {
        let mut map = map();
        map.ring(ActorId(9), Vec2::zero(), 6.0);
        assert!(map.check(ActorId(0), Vec2::new(7.5, 0.0)).contains(&ActorId(9)));
        assert!(map.check(ActorId(0), Vec2::new(0.0, -6.1)).contains(&ActorId(9)));
        assert!(!map.check(ActorId(0), Vec2::new(0.5, 0.5)).contains(&ActorId(9)));
    }

    proptest! {
        #[test]
        fn finds_every_actor_within_cell_size(
            qx in -12.0f64..12.0, qy in -12.0f64..12.0,
            angle in 0.0f64..std::f64::consts::TAU, fraction in 0.0f64..0.999,
        ) {
            let mut map = map();
            let query = Vec2::new(qx, qy);
            let other = query + Vec2::from_angle(angle) * (map.cell_size() * fraction);
            map.arrive(ActorId(1), other);
            map.arrive(ActorId(0), query);
            let found = map.check(ActorId(0), query);
            prop_assert!(found.contains(&ActorId(1)));
            prop_assert!(!found.contains(&ActorId(0)));
        }
    }
}
