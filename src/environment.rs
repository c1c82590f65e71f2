use crate::{
    agent::{DQNAgent, observed_reward},
    config::{SyncPolicy, TrainingConfig},
    data::PriceSource,
    error::{Result, TrainError},
    experience::Experience,
    metrics::{EpisodeMetrics, append_record},
};

/// Summary of one pass over a price series.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    pub steps: usize,
    pub training_updates: usize,
    pub syncs: usize,
    pub mean_loss: f64,
    pub benchmark_return: f64,
    pub model_return: f64,
    pub epsilon: f64,
    pub alpha: f64,
    /// Checkpoint and log writes that failed; the run carried on past them.
    pub io_failures: Vec<String>,
}

/// Walks a price series once, collecting transitions and training the agent
/// whenever the replay memory is full.
pub struct Environment {
    dqn_agent: DQNAgent,
    config: TrainingConfig,
}

impl Environment {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dqn_agent: DQNAgent::new(&config)?,
            config,
        })
    }

    pub fn agent(&self) -> &DQNAgent {
        &self.dqn_agent
    }

    /// Pulls the series from `source` (and `auxiliary`, when the feature
    /// policy wants one) and runs an episode over it.
    pub fn train(
        &mut self,
        source: &dyn PriceSource,
        auxiliary: Option<&dyn PriceSource>,
    ) -> Result<EpisodeReport> {
        let prices = source.close_prices()?;
        let auxiliary = auxiliary.map(|aux| aux.close_prices()).transpose()?;
        self.run_episode(&prices, auxiliary.as_deref())
    }

    fn check_series(&self, prices: &[f64], auxiliary: Option<&[f64]>) -> Result<()> {
        let features = self.config.features;
        let required = features.start_offset() + 2;
        if prices.len() < required {
            return Err(TrainError::SeriesTooShort {
                len: prices.len(),
                required,
            });
        }
        if let Some((index, &value)) = prices
            .iter()
            .enumerate()
            .find(|(_, p)| !(p.is_finite() && **p > 0.0))
        {
            return Err(TrainError::InvalidPrice { index, value });
        }
        if features.uses_auxiliary() {
            match auxiliary {
                None => {
                    return Err(TrainError::AuxiliaryMismatch(
                        "feature policy needs an auxiliary series".to_string(),
                    ));
                }
                Some(aux) if aux.len() < prices.len() => {
                    return Err(TrainError::AuxiliaryMismatch(format!(
                        "{} auxiliary samples for {} prices",
                        aux.len(),
                        prices.len()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn checkpoint(&self, report: &mut EpisodeReport) {
        let path = &self.config.checkpoint;
        match self.dqn_agent.save(path) {
            Ok(()) => log::info!("checkpoint written to {}", path.display()),
            Err(err) => {
                log::warn!("checkpoint {} failed: {err}", path.display());
                report.io_failures.push(format!("checkpoint {}: {err}", path.display()));
            }
        }
    }

    pub fn run_episode(
        &mut self,
        prices: &[f64],
        auxiliary: Option<&[f64]>,
    ) -> Result<EpisodeReport> {
        self.check_series(prices, auxiliary)?;

        let features = self.config.features;
        let gamma = self.config.gamma;
        let start = features.start_offset();
        let eligible_steps = prices.len() - start - 1;
        let horizon = eligible_steps.saturating_sub(self.config.memory_capacity);

        self.dqn_agent.reset();
        let mut metrics = EpisodeMetrics::default();
        let mut report = EpisodeReport {
            steps: 0,
            training_updates: 0,
            syncs: 0,
            mean_loss: 0.0,
            benchmark_return: 1.0,
            model_return: 1.0,
            epsilon: self.dqn_agent.get_current_epsilon(),
            alpha: self.dqn_agent.get_current_alpha(),
            io_failures: Vec::new(),
        };

        for t in start..=prices.len() - 2 {
            let state = features.sample(prices, auxiliary, t);
            let (action, q_value) = self.dqn_agent.get_decision(&state.features);

            let diff = (prices[t + 1] - prices[t]) / prices[t];
            let observed = observed_reward(action, diff);

            let next_state = (!state.terminal).then(|| features.sample(prices, auxiliary, t + 1));
            let expected = self.dqn_agent.td_target(
                observed,
                next_state.as_ref().map(|s| s.features.as_slice()),
                gamma,
            );

            metrics.record(
                self.dqn_agent.training_count(),
                expected,
                q_value,
                diff,
                observed,
            );
            let line = metrics.record_line(
                self.dqn_agent.get_current_epsilon(),
                self.dqn_agent.get_current_alpha(),
            );
            if let Err(err) = append_record(&self.config.log, &line) {
                log::warn!("training log {} failed: {err}", self.config.log.display());
                report
                    .io_failures
                    .push(format!("log {}: {err}", self.config.log.display()));
            }

            log::debug!(
                "@frame={t}: (diff={diff}) (action={action}) (observed={observed}) (expected={expected}) (benchmark={}) (model={})",
                metrics.benchmark,
                metrics.model
            );

            self.dqn_agent
                .add_experience(Experience::new(state.features, action, expected));

            let mut sync_due = matches!(self.config.sync, SyncPolicy::EveryTimeIndex(n) if t % n == 0);
            if self.dqn_agent.memory_full() {
                self.dqn_agent.learn(horizon)?;
                if let SyncPolicy::EveryUpdates(n) = self.config.sync {
                    sync_due |= self.dqn_agent.training_count() % n == 0;
                }
            }

            if sync_due {
                self.dqn_agent.sync_target();
                report.syncs += 1;
                self.checkpoint(&mut report);
            }
            report.steps += 1;
        }

        self.checkpoint(&mut report);

        report.training_updates = self.dqn_agent.training_count();
        report.mean_loss = metrics.mean_loss;
        report.benchmark_return = metrics.benchmark;
        report.model_return = metrics.model;
        report.epsilon = self.dqn_agent.get_current_epsilon();
        report.alpha = self.dqn_agent.get_current_alpha();

        log::info!(
            "episode finished: {} steps, {} updates, mean loss {:.6}, benchmark {:.4}, model {:.4}",
            report.steps,
            report.training_updates,
            report.mean_loss,
            report.benchmark_return,
            report.model_return
        );
        Ok(report)
    }
}
