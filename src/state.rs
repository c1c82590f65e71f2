use serde::{Deserialize, Serialize};

/// Window length the multi-scale policy standardizes over.
pub const MULTI_SCALE_WINDOW: usize = 50;
const MULTI_SCALE_STRIDE: usize = 10;
const MULTI_SCALE_TAIL: usize = 5;

/// Network input for one time index.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub features: Vec<f64>,
    /// `t + 1` is the last index of the series: no next state to bootstrap from.
    pub terminal: bool,
}

/// Rescales `values` in place to zero mean and unit (population) variance.
/// A window with no variance becomes all zeros, including one whose spread
/// is only rounding noise in the mean.
pub fn standardize(values: &mut [f64]) {
    if values.is_empty() {
        return;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let constant = values.iter().all(|&v| v == values[0]);
    if constant || !std_dev.is_finite() || std_dev <= f64::EPSILON * mean.abs().max(1.0) {
        values.iter_mut().for_each(|v| *v = 0.0);
        return;
    }
    for v in values.iter_mut() {
        *v = (*v - mean) / std_dev;
    }
}

fn standardized_window(series: &[f64], t: usize, len: usize) -> Vec<f64> {
    let mut window = series[t + 1 - len..=t].to_vec();
    standardize(&mut window);
    window
}

/// How a price window is turned into a state vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureExtractor {
    /// The standardized `look_back` prices ending at `t`, optionally followed
    /// by the standardized auxiliary window of the same length.
    Window {
        look_back: usize,
        #[serde(default)]
        auxiliary: bool,
    },
    /// Every 10th value of a standardized 50-price window followed by its
    /// last 5 values.
    MultiScale,
}

impl FeatureExtractor {
    /// First time index a state can be extracted at.
    pub fn start_offset(&self) -> usize {
        match *self {
            FeatureExtractor::Window { look_back, .. } => look_back.saturating_sub(1),
            FeatureExtractor::MultiScale => MULTI_SCALE_WINDOW - 1,
        }
    }

    pub fn state_len(&self) -> usize {
        match *self {
            FeatureExtractor::Window { look_back, auxiliary } => {
                if auxiliary { 2 * look_back } else { look_back }
            }
            FeatureExtractor::MultiScale => {
                MULTI_SCALE_WINDOW / MULTI_SCALE_STRIDE + MULTI_SCALE_TAIL
            }
        }
    }

    pub fn uses_auxiliary(&self) -> bool {
        matches!(self, FeatureExtractor::Window { auxiliary: true, .. })
    }

    /// Builds the state at `t`. Calling this before `start_offset` or past the
    /// end of the series is a bug in the caller.
    pub fn sample(&self, prices: &[f64], auxiliary: Option<&[f64]>, t: usize) -> State {
        assert!(
            t >= self.start_offset() && t < prices.len(),
            "time index {t} outside the extractable range"
        );
        assert!(
            !self.uses_auxiliary() || auxiliary.is_some(),
            "window policy needs an auxiliary series"
        );

        let features = match *self {
            FeatureExtractor::Window { look_back, auxiliary: with_aux } => {
                let mut features = standardized_window(prices, t, look_back);
                if let Some(aux) = auxiliary.filter(|_| with_aux) {
                    features.extend(standardized_window(aux, t, look_back));
                }
                features
            }
            FeatureExtractor::MultiScale => {
                let price = standardized_window(prices, t, MULTI_SCALE_WINDOW);
                let mut features: Vec<f64> = price
                    .iter()
                    .step_by(MULTI_SCALE_STRIDE)
                    .copied()
                    .collect();
                features.extend_from_slice(&price[price.len() - MULTI_SCALE_TAIL..]);
                features
            }
        };

        State {
            features,
            terminal: t + 1 == prices.len() - 1,
        }
    }
}
