//! Run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, TrainError},
    mlp::validate_shape,
    schedule::LinearSchedule,
    state::FeatureExtractor,
};

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data: DataConfig,
    pub training: TrainingConfig,
}

/// Where the price series comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV file holding the traded asset
    pub prices: PathBuf,
    /// Column to read closing prices from
    pub column: String,
    /// Optional CSV with a secondary (volatility index) series, same row alignment
    #[serde(default)]
    pub auxiliary: Option<PathBuf>,
}

/// When the target network is refreshed and the agent checkpointed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "interval", rename_all = "snake_case")]
pub enum SyncPolicy {
    /// After every `n`-th training update
    EveryUpdates(usize),
    /// At every time index divisible by `n`, warmup included
    EveryTimeIndex(usize),
}

impl SyncPolicy {
    pub fn interval(&self) -> usize {
        match *self {
            SyncPolicy::EveryUpdates(n) | SyncPolicy::EveryTimeIndex(n) => n,
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Exploration rate schedule
    pub epsilon: LinearSchedule,
    /// Step size schedule
    pub alpha: LinearSchedule,
    /// Discount factor, in (0, 1]
    pub gamma: f64,
    /// Replay memory capacity
    pub memory_capacity: usize,
    /// Transitions replayed per update, at most `memory_capacity`
    pub batch_size: usize,
    pub sync: SyncPolicy,
    pub features: FeatureExtractor,
    /// `(in_features, out_features)` per layer
    pub layers: Vec<(usize, usize)>,
    /// Agent checkpoint destination
    pub checkpoint: PathBuf,
    /// Append-only training log
    pub log: PathBuf,
    /// Fixed seed; seeded from the clock when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig {
                prices: PathBuf::from("./data/prices.csv"),
                column: "Close".to_string(),
                auxiliary: None,
            },
            training: TrainingConfig::default(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epsilon: LinearSchedule::new(1.0, 0.1),
            alpha: LinearSchedule::new(0.005, 0.0005),
            gamma: 0.9,
            memory_capacity: 256,
            batch_size: 32,
            sync: SyncPolicy::EveryUpdates(100),
            features: FeatureExtractor::Window {
                look_back: 10,
                auxiliary: false,
            },
            layers: vec![(10, 32), (32, 16), (16, 3)],
            checkpoint: PathBuf::from("./models/checkpoint"),
            log: PathBuf::from("./data/log"),
            seed: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl TrainingConfig {
    /// Rejects configurations the trainer cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.memory_capacity == 0 {
            return Err(TrainError::config("memory_capacity must be positive"));
        }
        if self.batch_size == 0 {
            return Err(TrainError::config("batch_size must be positive"));
        }
        if self.batch_size > self.memory_capacity {
            return Err(TrainError::BatchExceedsCapacity {
                batch_size: self.batch_size,
                capacity: self.memory_capacity,
            });
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(TrainError::config(format!("gamma {} outside (0, 1]", self.gamma)));
        }
        if self.sync.interval() == 0 {
            return Err(TrainError::config("sync interval must be positive"));
        }
        if let FeatureExtractor::Window { look_back: 0, .. } = self.features {
            return Err(TrainError::config("look_back must be positive"));
        }
        for (name, schedule) in [("epsilon", self.epsilon), ("alpha", self.alpha)] {
            if !(schedule.initial.is_finite() && schedule.minimum.is_finite()) {
                return Err(TrainError::config(format!("{name} schedule must be finite")));
            }
        }

        validate_shape(&self.layers)?;
        let state_len = self.features.state_len();
        if self.layers[0].0 != state_len {
            return Err(TrainError::shape(format!(
                "first layer expects {} inputs but the feature extractor produces {state_len}",
                self.layers[0].0
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.data.column, "Close");
        config.training.validate().unwrap();
    }

    #[test]
    fn config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let loaded: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.training.layers, config.training.layers);
        assert_eq!(loaded.training.sync, config.training.sync);
        assert_eq!(loaded.training.features, config.training.features);
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.training.sync = SyncPolicy::EveryTimeIndex(500);
        config.training.seed = Some(7);
        config.to_file(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.training.sync, SyncPolicy::EveryTimeIndex(500));
        assert_eq!(loaded.training.seed, Some(7));
    }

    #[test]
    fn batch_larger_than_capacity_is_invalid() {
        let config = TrainingConfig {
            memory_capacity: 8,
            batch_size: 9,
            ..TrainingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TrainError::BatchExceedsCapacity { .. })
        ));
    }

    #[test]
    fn gamma_must_be_in_unit_interval() {
        for gamma in [0.0, -0.5, 1.5, f64::NAN] {
            let config = TrainingConfig {
                gamma,
                ..TrainingConfig::default()
            };
            assert!(config.validate().is_err(), "gamma {gamma} accepted");
        }
        let config = TrainingConfig {
            gamma: 1.0,
            ..TrainingConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn first_layer_must_match_state_length() {
        let config = TrainingConfig {
            features: FeatureExtractor::Window {
                look_back: 12,
                auxiliary: false,
            },
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrainError::Shape(_))));

        let config = TrainingConfig {
            features: FeatureExtractor::MultiScale,
            ..TrainingConfig::default()
        };
        config.validate().unwrap();

        let config = TrainingConfig {
            features: FeatureExtractor::Window {
                look_back: 5,
                auxiliary: true,
            },
            layers: vec![(10, 4), (4, 3)],
            ..TrainingConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn zero_sync_interval_is_invalid() {
        let config = TrainingConfig {
            sync: SyncPolicy::EveryUpdates(0),
            ..TrainingConfig::default()
        };
        assert!(matches!(config.validate(), Err(TrainError::Config(_))));
    }
}
