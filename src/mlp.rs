use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainError};

/// Number of actions the output layer scores: long, short, out.
pub const ACTION_COUNT: usize = 3;

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

fn relu_prime(x: f64) -> f64 {
    if x > 0.0 { 1.0 } else { 0.0 }
}

/// A single unit. `sum`, `activation` and `error` are scratch state for the
/// last forward/backward pass and are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    weights: Vec<f64>,
    bias: f64,
    #[serde(skip)]
    sum: f64,
    #[serde(skip)]
    activation: f64,
    #[serde(skip)]
    error: f64,
}

impl Node {
    fn new(in_features: usize) -> Self {
        Self {
            weights: vec![0.0; in_features],
            bias: 0.0,
            sum: 0.0,
            activation: 0.0,
            error: 0.0,
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn activation(&self) -> f64 {
        self.activation
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    in_features: usize,
    out_features: usize,
    nodes: Vec<Node>,
}

impl Layer {
    fn new(in_features: usize, out_features: usize) -> Self {
        Self {
            in_features,
            out_features,
            nodes: (0..out_features).map(|_| Node::new(in_features)).collect(),
        }
    }

    pub fn node(&self, n: usize) -> &Node {
        &self.nodes[n]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Evaluates every node on `inputs`, caching sums and activations.
    fn forward(&mut self, inputs: &[f64], rectify: bool) -> Vec<f64> {
        self.nodes
            .iter_mut()
            .map(|node| {
                let dot: f64 = node.weights.iter().zip(inputs).map(|(w, x)| w * x).sum();
                node.sum = dot + node.bias;
                node.activation = if rectify { relu(node.sum) } else { node.sum };
                node.activation
            })
            .collect()
    }
}

/// Feed-forward Q-value approximator: rectified hidden layers, linear output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiLayerPerceptron {
    layers: Vec<Layer>,
}

impl MultiLayerPerceptron {
    /// Builds a zero-weighted network from `(in_features, out_features)` pairs.
    pub fn new(shape: &[(usize, usize)]) -> Result<Self> {
        validate_shape(shape)?;
        Ok(Self {
            layers: shape.iter().map(|&(i, o)| Layer::new(i, o)).collect(),
        })
    }

    pub fn shape(&self) -> Vec<(usize, usize)> {
        self.layers
            .iter()
            .map(|layer| (layer.in_features, layer.out_features))
            .collect()
    }

    pub fn num_of_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, l: usize) -> &Layer {
        &self.layers[l]
    }

    pub fn input_features(&self) -> usize {
        self.layers[0].in_features
    }

    /// Draws every weight and bias uniformly from `±sqrt(2 / (in + out))`.
    pub fn initialize<R: Rng>(&mut self, rng: &mut R) {
        for layer in &mut self.layers {
            let scale = (2.0 / (layer.in_features + layer.out_features) as f64).sqrt();
            for node in &mut layer.nodes {
                for weight in &mut node.weights {
                    *weight = rng.random_range(-scale..scale);
                }
                node.bias = rng.random_range(-scale..scale);
            }
        }
    }

    /// Forward pass. Returns one Q-value per action.
    pub fn predict(&mut self, state: &[f64]) -> Vec<f64> {
        assert_eq!(
            state.len(),
            self.input_features(),
            "state length does not match the input layer"
        );
        let last = self.layers.len() - 1;
        let mut x = state.to_vec();
        for (l, layer) in self.layers.iter_mut().enumerate() {
            x = layer.forward(&x, l != last);
        }
        x
    }

    /// One online squared-error step on the Q-value of `action` towards
    /// `target`. Non-taken output nodes carry a zero gradient and are left
    /// untouched. Returns the Q-value of `action` before the update.
    pub fn backpropagate(&mut self, state: &[f64], action: usize, target: f64, alpha: f64) -> f64 {
        let q = self.predict(state);

        // error accumulators must not leak between samples
        for layer in &mut self.layers {
            for node in &mut layer.nodes {
                node.error = 0.0;
            }
        }

        let last = self.layers.len() - 1;
        for l in (0..=last).rev() {
            let (earlier, rest) = self.layers.split_at_mut(l);
            let layer = &mut rest[0];
            let mut previous = earlier.last_mut();

            let nodes = if l == last { action..action + 1 } else { 0..layer.out_features };
            for n in nodes {
                let node = &mut layer.nodes[n];
                let partial_gradient = if l == last {
                    -2.0 * (target - q[n])
                } else {
                    node.error * relu_prime(node.sum)
                };

                node.bias -= alpha * partial_gradient;

                match previous.as_mut() {
                    None => {
                        for (weight, x) in node.weights.iter_mut().zip(state) {
                            *weight -= alpha * partial_gradient * x;
                        }
                    }
                    Some(prev) => {
                        for (weight, input) in node.weights.iter_mut().zip(prev.nodes.iter_mut()) {
                            // accumulate with the pre-update weight
                            input.error += partial_gradient * *weight;
                            *weight -= alpha * partial_gradient * input.activation;
                        }
                    }
                }
            }
        }

        q[action]
    }

    /// Overwrites every weight and bias with `other`'s. Shapes must match.
    pub fn copy_from(&mut self, other: &MultiLayerPerceptron) {
        assert_eq!(self.shape(), other.shape(), "cannot sync networks of different shape");
        for (mine, theirs) in self.layers.iter_mut().zip(&other.layers) {
            for (node, source) in mine.nodes.iter_mut().zip(&theirs.nodes) {
                node.weights.copy_from_slice(&source.weights);
                node.bias = source.bias;
            }
        }
    }

    /// True when every weight and bias is finite.
    pub fn is_finite(&self) -> bool {
        self.layers.iter().flat_map(|layer| &layer.nodes).all(|node| {
            node.bias.is_finite() && node.weights.iter().all(|w| w.is_finite())
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let network: MultiLayerPerceptron = serde_json::from_reader(reader)?;
        network.check_loaded()?;
        Ok(network)
    }

    fn check_loaded(&self) -> Result<()> {
        validate_shape(&self.shape())?;
        for (l, layer) in self.layers.iter().enumerate() {
            if layer.nodes.len() != layer.out_features {
                return Err(TrainError::shape(format!(
                    "layer {l} declares {} nodes but stores {}",
                    layer.out_features,
                    layer.nodes.len()
                )));
            }
            if layer.nodes.iter().any(|node| node.weights.len() != layer.in_features) {
                return Err(TrainError::shape(format!(
                    "layer {l} has a node whose weight count differs from {}",
                    layer.in_features
                )));
            }
        }
        Ok(())
    }
}

/// Checks a `(in, out)` chain: non-empty, no zero widths, adjacent layers
/// agree and the last layer scores every action.
pub fn validate_shape(shape: &[(usize, usize)]) -> Result<()> {
    if shape.is_empty() {
        return Err(TrainError::shape("network needs at least one layer"));
    }
    if let Some(l) = shape.iter().position(|&(i, o)| i == 0 || o == 0) {
        return Err(TrainError::shape(format!("layer {l} has a zero width")));
    }
    for (l, pair) in shape.windows(2).enumerate() {
        if pair[0].1 != pair[1].0 {
            return Err(TrainError::shape(format!(
                "layer {l} outputs {} but layer {} expects {}",
                pair[0].1,
                l + 1,
                pair[1].0
            )));
        }
    }
    let out = shape[shape.len() - 1].1;
    if out != ACTION_COUNT {
        return Err(TrainError::shape(format!(
            "output layer has {out} nodes, expected {ACTION_COUNT}"
        )));
    }
    Ok(())
}
