//! Running training metrics and the append-only training log.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::Path,
};

/// Mean squared TD error plus two compounding returns: passive buy-and-hold
/// of the asset and the policy's realized return. All three stay at their
/// initial values until the first training update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeMetrics {
    loss_sum: f64,
    pub mean_loss: f64,
    pub benchmark: f64,
    pub model: f64,
}

impl Default for EpisodeMetrics {
    fn default() -> Self {
        Self {
            loss_sum: 0.0,
            mean_loss: 0.0,
            benchmark: 1.0,
            model: 1.0,
        }
    }
}

impl EpisodeMetrics {
    /// Folds in one step. `expected` is the TD target and `predicted` the
    /// agent's Q-value for the action taken.
    pub fn record(
        &mut self,
        training_count: usize,
        expected: f64,
        predicted: f64,
        diff: f64,
        observed: f64,
    ) {
        if training_count == 0 {
            return;
        }
        self.loss_sum += (expected - predicted).powi(2);
        self.mean_loss = self.loss_sum / training_count as f64;
        self.benchmark *= 1.0 + diff;
        self.model *= 1.0 + observed;
    }

    /// One whitespace-separated log record.
    pub fn record_line(&self, epsilon: f64, alpha: f64) -> String {
        format!(
            "{} {} {} {} {}",
            self.mean_loss, self.benchmark, self.model, epsilon, alpha
        )
    }
}

/// Appends `line` to the training log, creating the file and its directory
/// on first use.
pub fn append_record(path: &Path, line: &str) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut out = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(out, "{line}")
}
