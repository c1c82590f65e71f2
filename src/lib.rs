//! # quant-dqn
//!
//! Q-learning over a single-asset price series with a hand-written
//! feed-forward network, a target network and a sliding replay window.
//!
//! ## Modules
//!
//! - `mlp` - nodes, layers and the network with manual backpropagation
//! - `state` - standardized state extraction from a price window
//! - `experience` - transitions and the replay memory
//! - `agent` - epsilon-greedy agent owning the agent and target networks
//! - `environment` - the training loop over one price series
//! - `metrics` - running loss/return trackers and the training log
//! - `data` - price series providers
//! - `config` - run configuration

pub mod agent;
pub mod config;
pub mod data;
pub mod environment;
pub mod error;
pub mod experience;
pub mod metrics;
pub mod mlp;
pub mod schedule;
pub mod state;

pub use agent::DQNAgent;
pub use config::{AppConfig, SyncPolicy, TrainingConfig};
pub use data::{CsvColumn, PriceSource};
pub use environment::{EpisodeReport, Environment};
pub use error::TrainError;
pub use mlp::MultiLayerPerceptron;
pub use state::FeatureExtractor;
