use std::{fs, path::Path};

use quant_dqn::{
    Environment, FeatureExtractor, MultiLayerPerceptron, SyncPolicy, TrainingConfig,
    schedule::LinearSchedule,
};

fn window_config(dir: &Path, look_back: usize) -> TrainingConfig {
    TrainingConfig {
        epsilon: LinearSchedule::new(1.0, 0.1),
        alpha: LinearSchedule::new(0.005, 0.0005),
        gamma: 0.9,
        memory_capacity: 5,
        batch_size: 2,
        sync: SyncPolicy::EveryUpdates(10),
        features: FeatureExtractor::Window {
            look_back,
            auxiliary: false,
        },
        layers: vec![(look_back, 8), (8, 3)],
        checkpoint: dir.join("models").join("checkpoint"),
        log: dir.join("data").join("log"),
        seed: Some(2024),
    }
}

fn log_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn rising_series_full_pass() {
    let dir = tempfile::tempdir().unwrap();
    let config = window_config(dir.path(), 10);
    let log_path = config.log.clone();
    let checkpoint = config.checkpoint.clone();

    let prices: Vec<f64> = (0..60).map(|i| 100.0 * 1.01f64.powi(i)).collect();
    let mut env = Environment::new(config).unwrap();
    let report = env.run_episode(&prices, None).unwrap();

    let start_offset = 9;
    assert_eq!(report.steps, prices.len() - start_offset - 1);
    assert!(report.training_updates > 0);
    assert!(report.model_return.is_finite() && report.model_return > 0.0);
    assert!(report.benchmark_return > 1.0);
    assert!(report.mean_loss.is_finite());
    assert!(report.io_failures.is_empty());

    let lines = log_lines(&log_path);
    assert_eq!(lines.len(), prices.len() - start_offset - 1);
    for line in &lines {
        let fields: Vec<f64> = line
            .split_whitespace()
            .map(|f| f.parse().unwrap())
            .collect();
        assert_eq!(fields.len(), 5);
        assert!(fields.iter().all(|f| f.is_finite()));
    }

    // the last checkpoint is the trained agent
    let mut loaded = MultiLayerPerceptron::load(&checkpoint).unwrap();
    let mut agent = env.agent().policy().clone();
    let probe: Vec<f64> = (0..10).map(|i| i as f64 / 10.0 - 0.5).collect();
    assert_eq!(loaded.predict(&probe), agent.predict(&probe));
}

#[test]
fn constant_series_stays_finite() {
    for price in [42.0, 0.1, 100.1, 33.3] {
        let dir = tempfile::tempdir().unwrap();
        let prices = vec![price; 60];
        let mut env = Environment::new(window_config(dir.path(), 10)).unwrap();
        let report = env.run_episode(&prices, None).unwrap();

        assert!(env.agent().policy().is_finite(), "price {price}");
        assert!(env.agent().target().is_finite(), "price {price}");
        assert_eq!(report.benchmark_return, 1.0);
        assert_eq!(report.model_return, 1.0);
        assert!(report.mean_loss.is_finite());
        assert!(
            env.agent()
                .memory()
                .iter()
                .all(|e| e.state.iter().all(|&v| v == 0.0) && e.target_value.is_finite()),
            "price {price} produced a non-zero state"
        );
    }
}

#[test]
fn constant_series_multi_scale_states_are_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = window_config(dir.path(), 10);
    config.features = FeatureExtractor::MultiScale;
    let prices = vec![100.1; 70];
    let mut env = Environment::new(config).unwrap();
    env.run_episode(&prices, None).unwrap();

    assert!(env.agent().policy().is_finite());
    assert!(
        env.agent()
            .memory()
            .iter()
            .all(|e| e.state.iter().all(|&v| v == 0.0))
    );
}

#[test]
fn multi_scale_pass_with_time_index_sync() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = window_config(dir.path(), 10);
    config.features = FeatureExtractor::MultiScale;
    config.sync = SyncPolicy::EveryTimeIndex(20);
    config.memory_capacity = 8;
    config.batch_size = 4;
    let log_path = config.log.clone();

    let prices: Vec<f64> = (0..120)
        .map(|i| 50.0 + 5.0 * (i as f64 / 7.0).sin() + i as f64 * 0.05)
        .collect();
    let mut env = Environment::new(config).unwrap();
    let report = env.run_episode(&prices, None).unwrap();

    // t runs 49..=118
    assert_eq!(report.steps, 70);
    assert_eq!(report.training_updates, 70 - 8 + 1);
    // t = 60, 80, 100
    assert_eq!(report.syncs, 3);
    assert_eq!(report.epsilon, 0.1);
    assert_eq!(log_lines(&log_path).len(), 70);
    assert!(env.agent().policy().is_finite());
}

#[test]
fn same_seed_same_run() {
    let prices: Vec<f64> = (0..80)
        .map(|i| 20.0 + (i as f64 * 0.9).cos() + (i % 5) as f64 * 0.3)
        .collect();

    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let mut env = Environment::new(window_config(dir.path(), 6)).unwrap();
        let report = env.run_episode(&prices, None).unwrap();
        let lines = log_lines(&dir.path().join("data").join("log"));
        (report, lines)
    };

    let (first, first_log) = run();
    let (second, second_log) = run();
    assert_eq!(first, second);
    assert_eq!(first_log, second_log);
}
