//! Statistics accumulated over the saved states of every completed replica.

use std::f64::consts::PI;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use swimmer_common::{AnalysisConfig, PhysicsConfig, RunParams, Vec2, WallConfig};

use crate::actor::Actor;
use crate::grid::Bounds;
use crate::simulation::{world_bounds, Simulation};

pub struct Analyzer {
    config: AnalysisConfig,
    /// Area covered by the probability map.
    region: Bounds,
    /// Centre and inner radius of the first disk wall.
    disk: Option<(Vec2, f64)>,
    walls: Vec<Actor>,
    /// Simulated time between two saved steps.
    saved_interval: f64,

    n_replicas: usize,
    n_samples: u64,
    occupancy: Vec<u64>,
    radial: Vec<u64>,
    near_wall: u64,
    displacement_sums: Vec<f64>,
    displacement_counts: Vec<u64>,
}

impl Analyzer {
    pub fn new(physics: &PhysicsConfig, config: &AnalysisConfig, params: &RunParams) -> Self {
        let disk = match physics.disk_wall() {
            Some(WallConfig::Disk { x, y, inner_radius, .. }) => Some((Vec2::new(*x, *y), *inner_radius)),
            _ => None,
        };
        let region = match disk {
            Some((center, radius)) => Bounds {
                left: center.x - radius,
                top: center.y - radius,
                right: center.x + radius,
                bottom: center.y + radius,
            },
            None => world_bounds(physics),
        };
        Analyzer {
            config: config.clone(),
            region,
            disk,
            walls: physics.walls.iter().map(Actor::from_wall_config).collect(),
            saved_interval: params.dt * params.saved_time_step_size as f64,
            n_replicas: 0,
            n_samples: 0,
            occupancy: vec![0; config.probability_map_width * config.probability_map_height],
            radial: vec![0; config.radial_bins],
            near_wall: 0,
            displacement_sums: vec![0.0; config.max_displacement_lag],
            displacement_counts: vec![0; config.max_displacement_lag],
        }
    }

    pub fn n_replicas(&self) -> usize {
        self.n_replicas
    }

    pub fn n_samples(&self) -> u64 {
        self.n_samples
    }

    /// Reads every saved state of a completed replica.
    pub fn merge(&mut self, simulation: &Simulation) {
        let step = simulation.params().saved_time_step_size;
        for cell in simulation.agents() {
            let trajectory: Vec<Vec2> = (0..)
                .map_while(|k| cell.get_instance(k * step))
                .map(|instance| instance.position)
                .collect();
            self.merge_trajectory(&trajectory);
        }
        self.n_replicas += 1;
    }

    /// Adds the saved body positions of one agent.
    pub fn merge_trajectory(&mut self, trajectory: &[Vec2]) {
        for &position in trajectory {
            self.add_sample(position);
        }
        for lag in 1..=self.config.max_displacement_lag.min(trajectory.len().saturating_sub(1)) {
            for pair in trajectory.windows(lag + 1) {
                self.displacement_sums[lag - 1] += pair[lag].distance_squared(pair[0]);
            }
            self.displacement_counts[lag - 1] += (trajectory.len() - lag) as u64;
        }
    }

    fn add_sample(&mut self, position: Vec2) {
        self.n_samples += 1;

        if self.region.contains(position) {
            let width = self.config.probability_map_width;
            let height = self.config.probability_map_height;
            let fx = (position.x - self.region.left) / self.region.width().max(f64::EPSILON);
            let fy = (position.y - self.region.top) / self.region.height().max(f64::EPSILON);
            let col = ((fx * width as f64) as usize).min(width - 1);
            let row = ((fy * height as f64) as usize).min(height - 1);
            self.occupancy[row * width + col] += 1;
        }

        if let Some((center, radius)) = self.disk {
            let r = position.distance(center);
            if r < radius {
                let bin = ((r / radius * self.radial.len() as f64) as usize).min(self.radial.len() - 1);
                self.radial[bin] += 1;
            }
        }

        let nearest = self
            .walls
            .iter()
            .filter_map(|wall| wall.surface_distance(position))
            .fold(f64::INFINITY, f64::min);
        if nearest < self.config.near_wall_distance {
            self.near_wall += 1;
        }
    }

    /// Occupancy probability per map cell, row-major from the top-left.
    pub fn probability_map(&self) -> Vec<f64> {
        let total = self.n_samples.max(1) as f64;
        self.occupancy.iter().map(|&count| count as f64 / total).collect()
    }

    /// `(r_inner, r_outer, density)` per annulus around the disk wall centre.
    /// Empty without a disk wall.
    pub fn radial_density(&self) -> Vec<(f64, f64, f64)> {
        let Some((_, radius)) = self.disk else {
            return Vec::new();
        };
        let total = self.n_samples.max(1) as f64;
        let width = radius / self.radial.len() as f64;
        self.radial
            .iter()
            .enumerate()
            .map(|(bin, &count)| {
                let r_inner = bin as f64 * width;
                let r_outer = r_inner + width;
                let area = PI * (r_outer * r_outer - r_inner * r_inner);
                (r_inner, r_outer, count as f64 / (total * area))
            })
            .collect()
    }

    pub fn near_wall_probability(&self) -> f64 {
        self.near_wall as f64 / self.n_samples.max(1) as f64
    }

    /// `(lag, time, msd)` for every lag with at least one pair.
    pub fn mean_squared_displacement(&self) -> Vec<(usize, f64, f64)> {
        self.displacement_sums
            .iter()
            .zip(&self.displacement_counts)
            .enumerate()
            .filter(|(_, (_, count))| **count > 0)
            .map(|(idx, (&sum, &count))| {
                let lag = idx + 1;
                (lag, lag as f64 * self.saved_interval, sum / count as f64)
            })
            .collect()
    }

    /// Writes every statistic as a CSV file named after `base_filename`.
    pub fn save_csv(&self, directory: &Path, base_filename: &str) -> Result<()> {
        let path = directory.join(format!("{}_probability_map.csv", base_filename));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        writer.write_record(["x", "y", "probability"])?;
        let width = self.config.probability_map_width;
        let cell_w = self.region.width() / width as f64;
        let cell_h = self.region.height() / self.config.probability_map_height as f64;
        for (idx, p) in self.probability_map().into_iter().enumerate() {
            let x = self.region.left + ((idx % width) as f64 + 0.5) * cell_w;
            let y = self.region.top + ((idx / width) as f64 + 0.5) * cell_h;
            writer.write_record(&[format!("{:.4}", x), format!("{:.4}", y), format!("{:e}", p)])?;
        }
        writer.flush()?;

        if self.disk.is_some() {
            let path = directory.join(format!("{}_radial_density.csv", base_filename));
            let mut writer = csv::Writer::from_path(&path)
                .with_context(|| format!("Failed to create '{}'", path.display()))?;
            writer.write_record(["r_inner", "r_outer", "density"])?;
            for (r_inner, r_outer, density) in self.radial_density() {
                writer.write_record(&[format!("{:.4}", r_inner), format!("{:.4}", r_outer), format!("{:e}", density)])?;
            }
            writer.flush()?;
        }

        let path = directory.join(format!("{}_msd.csv", base_filename));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        writer.write_record(["lag", "time", "msd"])?;
        for (lag, time, msd) in self.mean_squared_displacement() {
            writer.write_record(&[lag.to_string(), format!("{:.6}", time), format!("{:e}", msd)])?;
        }
        writer.flush()?;

        let path = directory.join(format!("{}_summary.csv", base_filename));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        writer.write_record(["replicas", "samples", "near_wall_probability"])?;
        writer.write_record(&[
            self.n_replicas.to_string(),
            self.n_samples.to_string(),
            format!("{:.6}", self.near_wall_probability()),
        ])?;
        writer.flush()?;

        info!("Statistics saved to {}/{}_*.csv", directory.display(), base_filename);
        Ok(())
    }
}
