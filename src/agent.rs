use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::TrainingConfig,
    error::Result,
    experience::{Experience, ReplayMemory},
    mlp::MultiLayerPerceptron,
    schedule::LinearSchedule,
};

// encoding is as follows :
// 0 -> long, 1 -> short, 2 -> out
pub const LONG: usize = 0;
pub const SHORT: usize = 1;
pub const OUT: usize = 2;

/// Index of the first maximum.
pub fn argmax(q_values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &q) in q_values.iter().enumerate().skip(1) {
        if q > q_values[best] {
            best = i;
        }
    }
    best
}

/// With probability `epsilon` a uniformly random action, otherwise the greedy one.
pub fn epsilon_greedy<R: Rng>(q_values: &[f64], epsilon: f64, rng: &mut R) -> usize {
    if rng.random::<f64>() < epsilon {
        rng.random_range(0..q_values.len())
    } else {
        argmax(q_values)
    }
}

/// Reward of holding `action` over a one-step return of `diff`.
pub fn observed_reward(action: usize, diff: f64) -> f64 {
    match action {
        LONG => diff,
        SHORT => -diff,
        _ => 0.0,
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

/// Agent and target networks, replay memory and the annealed exploration /
/// step-size state. All randomness comes from one seeded generator.
pub struct DQNAgent {
    policy_mlp: MultiLayerPerceptron,
    target_mlp: MultiLayerPerceptron,

    experience_replay_buffer: ReplayMemory,
    rng: StdRng,
    batch_size: usize,
    training_count: usize,
    epsilon_schedule: LinearSchedule,
    alpha_schedule: LinearSchedule,
    epsilon: f64,
    alpha: f64,
}

impl DQNAgent {
    pub fn new(config: &TrainingConfig) -> Result<Self> {
        let seed = config.seed.unwrap_or_else(clock_seed);
        let mut rng = StdRng::seed_from_u64(seed);
        log::debug!("agent seeded with {seed}");

        let mut policy = MultiLayerPerceptron::new(&config.layers)?;
        policy.initialize(&mut rng);
        let mut target = MultiLayerPerceptron::new(&config.layers)?;
        target.copy_from(&policy);

        Ok(Self {
            policy_mlp: policy,
            target_mlp: target,
            experience_replay_buffer: ReplayMemory::new(config.memory_capacity),
            rng,
            batch_size: config.batch_size,
            training_count: 0,
            epsilon_schedule: config.epsilon,
            alpha_schedule: config.alpha,
            epsilon: config.epsilon.initial,
            alpha: config.alpha.initial,
        })
    }

    /// Empties the replay memory and restarts both schedules.
    pub fn reset(&mut self) {
        self.experience_replay_buffer.clear();
        self.training_count = 0;
        self.epsilon = self.epsilon_schedule.initial;
        self.alpha = self.alpha_schedule.initial;
    }

    pub fn get_current_epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn get_current_alpha(&self) -> f64 {
        self.alpha
    }

    pub fn training_count(&self) -> usize {
        self.training_count
    }

    pub fn policy(&self) -> &MultiLayerPerceptron {
        &self.policy_mlp
    }

    pub fn target(&self) -> &MultiLayerPerceptron {
        &self.target_mlp
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.experience_replay_buffer
    }

    /// Epsilon-greedy action over the agent's Q-values, with the Q-value of
    /// the chosen action.
    pub fn get_decision(&mut self, state: &[f64]) -> (usize, f64) {
        let q_values = self.policy_mlp.predict(state);
        let action = epsilon_greedy(&q_values, self.epsilon, &mut self.rng);
        (action, q_values[action])
    }

    /// `observed + gamma * max Q_target(next_state)`, or just `observed` at
    /// the end of the series.
    pub fn td_target(&mut self, observed: f64, next_state: Option<&[f64]>, gamma: f64) -> f64 {
        match next_state {
            Some(next_state) => {
                let target_q = self.target_mlp.predict(next_state);
                observed + gamma * target_q[argmax(&target_q)]
            }
            None => observed,
        }
    }

    pub fn add_experience(&mut self, experience: Experience) {
        self.experience_replay_buffer.push(experience);
    }

    pub fn memory_full(&self) -> bool {
        self.experience_replay_buffer.is_full()
    }

    /// Replays one batch sample by sample (online, not averaged), evicts the
    /// oldest transition and anneals epsilon and alpha over `horizon` updates.
    pub fn learn(&mut self, horizon: usize) -> Result<()> {
        let batch = self
            .experience_replay_buffer
            .sample_batch(self.batch_size, &mut self.rng)?;

        for k in batch {
            let experience = &self.experience_replay_buffer[k];
            self.policy_mlp.backpropagate(
                &experience.state,
                experience.action,
                experience.target_value,
                self.alpha,
            );
        }

        self.experience_replay_buffer.evict_oldest();
        self.training_count += 1;
        self.epsilon = self.epsilon_schedule.value(self.training_count, horizon);
        self.alpha = self.alpha_schedule.value(self.training_count, horizon);
        Ok(())
    }

    /// Snapshots the agent network into the target network.
    pub fn sync_target(&mut self) {
        self.target_mlp.copy_from(&self.policy_mlp);
    }

    pub fn save(&self, checkpoint: impl AsRef<Path>) -> Result<()> {
        self.policy_mlp.save(checkpoint)
    }
}
