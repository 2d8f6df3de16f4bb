use rand::rngs::StdRng;
use rand::SeedableRng;
use swimmer_common::{
    AnalysisConfig, CellConfig, CellInteractionConfig, FluidConfig, InitialCellConfig, InitialConditions, NoiseConfig,
    OverflowPolicy, PhysicsConfig, PropulsionConfig, RunParams, ShapeConfig, TumbleConfig, Vec2, WallConfig,
};
use swimmer_engine::{ActorId, Analyzer, ReplicaDriver, Simulation, SimulationError};

fn cell(speed: f64, noise: NoiseConfig, tumble: TumbleConfig) -> CellConfig {
    CellConfig {
        shape: ShapeConfig {
            body_radius: 1.0,
            flagellum_radius: 0.5,
            body_flagellum_distance: 1.5,
            rotation_center: 0.0,
        },
        propulsion: PropulsionConfig { speed, tumble },
        fluid: FluidConfig { diffusivity: 1.0, shear_time: 1.0 },
        noise,
    }
}

fn run_params(dt: f64, n_time_steps: usize, saved_time_step_size: usize) -> RunParams {
    RunParams {
        dt,
        n_time_steps,
        saved_time_step_size,
        n_saved_time_steps: n_time_steps / saved_time_step_size,
        random_seed: 7,
        n_threads: 1,
        n_simulations: 1,
        overflow_policy: OverflowPolicy::Clamp,
        overflow_threshold: 4.0,
        cell_size: None,
    }
}

fn explicit(cells: &[(f64, f64, f64)]) -> InitialConditions {
    InitialConditions::Explicit {
        cells: cells
            .iter()
            .map(|&(x, y, direction)| InitialCellConfig { x, y, direction })
            .collect(),
    }
}

fn disk(inner_radius: f64) -> WallConfig {
    WallConfig::Disk { x: 0.0, y: 0.0, inner_radius, thickness: 2.0, hardness: 1.0 }
}

fn noisy_tumbler() -> CellConfig {
    cell(
        10.0,
        NoiseConfig { force_strength: 0.1, torque_strength: 0.5 },
        TumbleConfig { delay: 0.1, strength_mean: 1.5, strength_std: 0.3, duration_mean: 0.0, duration_std: 0.0 },
    )
}

#[test]
fn free_swimmer_moves_along_its_heading() {
    let physics = PhysicsConfig {
        cell: cell(10.0, NoiseConfig::default(), TumbleConfig::default()),
        cell_interaction: CellInteractionConfig::default(),
        walls: vec![],
        initial_conditions: explicit(&[(0.0, 0.0, 0.0)]),
    };
    let params = run_params(0.01, 110, 10);
    let mut sim = Simulation::new(0, &physics, &params, StdRng::seed_from_u64(1)).unwrap();
    assert_eq!(sim.compute_simulation().unwrap(), 0);

    let history = sim.history();
    assert_eq!(history.n_saved_steps(), 11);
    let last = history.agents[0][10];
    assert!((last.position.x - 10.0).abs() < 1e-9);
    assert!(last.position.y.abs() < 1e-12);
    assert_eq!(last.direction, 0.0);
    assert!((history.time_of(10) - 1.0).abs() < 1e-12);
}

#[test]
fn disk_wall_stops_a_swimmer_heading_into_it() {
    let physics = PhysicsConfig {
        cell: cell(10.0, NoiseConfig::default(), TumbleConfig::default()),
        cell_interaction: CellInteractionConfig::default(),
        walls: vec![disk(50.0)],
        initial_conditions: explicit(&[(45.0, 0.0, 0.0)]),
    };
    let params = run_params(0.001, 1000, 10);
    let mut sim = Simulation::new(0, &physics, &params, StdRng::seed_from_u64(2)).unwrap();
    assert_eq!(sim.compute_simulation().unwrap(), 0);

    let history = sim.history();
    for instance in &history.agents[0] {
        let flagellum = instance.position + instance.heading() * 1.5;
        assert!(flagellum.length() < 49.5, "flagellum crossed into the wall at {:?}", flagellum);
    }
    // Propulsion and wall repulsion balance just short of the surface.
    let settled = history.agents[0].last().unwrap().position;
    assert!(settled.x > 47.7 && settled.x < 48.0, "settled at {:?}", settled);
}

#[test]
fn swimmer_pressed_against_a_hard_disk_wall_stays_inside() {
    let physics = PhysicsConfig {
        cell: cell(10.0, NoiseConfig::default(), TumbleConfig::default()),
        cell_interaction: CellInteractionConfig::default(),
        walls: vec![WallConfig::Disk { x: 0.0, y: 0.0, inner_radius: 50.0, thickness: 2.0, hardness: 10.0 }],
        initial_conditions: explicit(&[(48.0, 0.0, 0.0)]),
    };
    let params = run_params(0.001, 2000, 10);
    let mut sim = Simulation::new(0, &physics, &params, StdRng::seed_from_u64(5)).unwrap();
    while sim.tick() + 1 < params.n_time_steps {
        sim.compute_next_step().unwrap();
        let cell = sim.agents().next().unwrap();
        let state = cell.committed();
        assert!(state.position.length() <= 50.0);
        assert!(cell.shape().flagellum_position(state).length() < 50.0, "tick {}", sim.tick());
    }
    assert_eq!(sim.n_errors(), 0);
}

#[test]
fn same_seed_gives_identical_histories() {
    let physics = PhysicsConfig {
        cell: noisy_tumbler(),
        cell_interaction: CellInteractionConfig::default(),
        walls: vec![disk(20.0)],
        initial_conditions: InitialConditions::UniformDisk { count: 12, x: 0.0, y: 0.0, radius: 15.0 },
    };
    let params = run_params(0.001, 400, 20);
    let run = |seed: u64| {
        let mut sim = Simulation::new(0, &physics, &params, StdRng::seed_from_u64(seed)).unwrap();
        sim.compute_simulation().unwrap();
        sim.history()
    };

    let first = run(11);
    let second = run(11);
    assert_eq!(first.agents, second.agents);
    assert_eq!(first.n_saved_steps(), 20);
    assert_ne!(first.agents, run(12).agents);
}

#[test]
fn box_of_plane_walls_keeps_swimmers_inside() {
    let physics = PhysicsConfig {
        cell: cell(10.0, NoiseConfig { force_strength: 0.0, torque_strength: 1.0 }, TumbleConfig::default()),
        cell_interaction: CellInteractionConfig::default(),
        walls: vec![
            WallConfig::Left { x: -10.0, thickness: 1.0, hardness: 1.0 },
            WallConfig::Right { x: 10.0, thickness: 1.0, hardness: 1.0 },
            WallConfig::Top { y: -10.0, thickness: 1.0, hardness: 1.0 },
            WallConfig::Bottom { y: 10.0, thickness: 1.0, hardness: 1.0 },
        ],
        initial_conditions: explicit(&[
            (-5.0, -5.0, 0.3),
            (0.0, -5.0, 2.0),
            (5.0, -5.0, -1.2),
            (-5.0, 0.0, 3.0),
            (0.0, 0.0, -2.5),
            (5.0, 0.0, 0.9),
        ]),
    };
    let params = run_params(0.001, 2000, 20);
    let mut sim = Simulation::new(0, &physics, &params, StdRng::seed_from_u64(3)).unwrap();
    sim.compute_simulation().unwrap();

    let history = sim.history();
    assert_eq!(history.agents.len(), 6);
    for saved in &history.agents {
        assert_eq!(saved.len(), 100);
        for instance in saved {
            assert!(instance.position.x.abs() < 10.0 && instance.position.y.abs() < 10.0);
        }
    }
}

#[test]
fn abort_policy_reports_the_offending_cell() {
    let physics = PhysicsConfig {
        cell: cell(0.0, NoiseConfig::default(), TumbleConfig::default()),
        cell_interaction: CellInteractionConfig { hardness: 1.0 },
        walls: vec![],
        initial_conditions: explicit(&[(0.0, 0.0, 0.0), (0.2, 0.0, 0.0)]),
    };
    let mut params = run_params(0.01, 100, 10);
    params.overflow_policy = OverflowPolicy::Abort;

    let mut sim = Simulation::new(0, &physics, &params, StdRng::seed_from_u64(4)).unwrap();
    match sim.compute_simulation() {
        Err(SimulationError::ForceOverflow { tick, agent, committed, previous, squared, threshold, .. }) => {
            assert_eq!(tick, 1);
            assert_eq!(agent, ActorId(0));
            assert_eq!(committed.position, Vec2::new(0.0, 0.0));
            assert_eq!(previous, committed);
            assert!(squared > threshold);
        }
        other => panic!("expected a force overflow, got {:?}", other.map(|_| ())),
    }
    assert_eq!(sim.tick(), 0);

    params.overflow_policy = OverflowPolicy::Clamp;
    let mut sim = Simulation::new(0, &physics, &params, StdRng::seed_from_u64(4)).unwrap();
    sim.compute_next_step().unwrap();
    assert_eq!(sim.n_errors(), 2);
    let moved: Vec<Vec2> = sim.agents().map(|cell| cell.committed().position).collect();
    assert!((moved[0].x + 2.0).abs() < 1e-9);
    assert!((moved[1].x - 2.2).abs() < 1e-9);
}

#[test]
fn driver_runs_every_replica_on_a_pool() {
    let physics = PhysicsConfig {
        cell: noisy_tumbler(),
        cell_interaction: CellInteractionConfig::default(),
        walls: vec![disk(20.0)],
        initial_conditions: InitialConditions::UniformDisk { count: 4, x: 0.0, y: 0.0, radius: 12.0 },
    };
    let mut params = run_params(0.001, 200, 20);
    params.n_threads = 2;
    params.n_simulations = 5;

    let analyzer = Analyzer::new(&physics, &AnalysisConfig::default(), &params);
    let outcome = ReplicaDriver::new(&physics, &params)
        .keep_histories(true)
        .run(analyzer)
        .unwrap();

    assert_eq!(outcome.summary.n_simulations, 5);
    assert_eq!(outcome.summary.completed, 5);
    assert_eq!(outcome.summary.failed, 0);
    assert_eq!(outcome.analyzer.n_replicas(), 5);
    assert_eq!(outcome.analyzer.n_samples(), 5 * 4 * 10);
    let replicas: Vec<usize> = outcome.histories.iter().map(|history| history.replica).collect();
    assert_eq!(replicas, vec![0, 1, 2, 3, 4]);
    assert!(outcome.histories.iter().all(|history| history.n_saved_steps() == 10));
}

#[test]
fn failed_replicas_are_counted_not_merged() {
    let physics = PhysicsConfig {
        cell: cell(0.0, NoiseConfig::default(), TumbleConfig::default()),
        cell_interaction: CellInteractionConfig::default(),
        walls: vec![],
        initial_conditions: explicit(&[(0.0, 0.0, 0.0), (0.2, 0.0, 0.0)]),
    };
    let mut params = run_params(0.01, 20, 10);
    params.n_simulations = 3;
    params.overflow_policy = OverflowPolicy::Abort;

    let analyzer = Analyzer::new(&physics, &AnalysisConfig::default(), &params);
    let outcome = ReplicaDriver::new(&physics, &params).run(analyzer).unwrap();
    assert_eq!(outcome.summary.completed, 0);
    assert_eq!(outcome.summary.failed, 3);
    assert_eq!(outcome.summary.n_errors, 3);
    assert_eq!(outcome.analyzer.n_replicas(), 0);
    assert!(outcome.histories.is_empty());
}

#[test]
fn bundled_configs_load() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
    let physics = PhysicsConfig::load(root.join("physics.toml")).unwrap();
    let config = swimmer_common::SimulationConfig::load(root.join("simulation.toml")).unwrap();
    let params = config.get_run_params();
    assert_eq!(physics.initial_conditions.count(), 100);
    assert!(physics.disk_wall().is_some());
    assert_eq!(params.saved_time_step_size, 50);
    assert_eq!(params.n_saved_time_steps, 400);
    assert_eq!(params.n_time_steps, 20_000);
}

#[test]
fn driver_is_repeatable_for_a_fixed_seed() {
    let physics = PhysicsConfig {
        cell: noisy_tumbler(),
        cell_interaction: CellInteractionConfig::default(),
        walls: vec![disk(20.0)],
        initial_conditions: InitialConditions::UniformDisk { count: 3, x: 0.0, y: 0.0, radius: 12.0 },
    };
    let mut params = run_params(0.001, 200, 20);
    params.n_simulations = 3;
    params.random_seed = 99;

    let run = |params: &RunParams| {
        let analyzer = Analyzer::new(&physics, &AnalysisConfig::default(), params);
        ReplicaDriver::new(&physics, params)
            .keep_histories(true)
            .run(analyzer)
            .unwrap()
            .histories
    };
    let first = run(&params);
    let second = run(&params);
    assert_eq!(first.len(), 3);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.replica, b.replica);
        assert_eq!(a.agents, b.agents);
    }
    // Replicas draw successive generators from the worker's stream.
    assert_ne!(first[0].agents, first[1].agents);

    params.random_seed = 100;
    assert_ne!(run(&params)[0].agents, first[0].agents);
}
