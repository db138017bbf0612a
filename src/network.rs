use std::fmt;

use ndarray::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::{softmax_into, Activation, OutputDelta};
use crate::error::{NetworkError, Result};
use crate::layer::{BiasInit, Layer};
use crate::matrix::{self, Matrix};

/// Choices fixed when a network is built.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOptions {
    pub activation: Activation,
    pub output_delta: OutputDelta,
    pub bias_init: BiasInit,
}

/// Result of running one input through the network.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub output: Array1<f64>,
    pub class: usize,
}

/// A chain of fully connected layers ending in softmax.
///
/// Layer 0 only holds the current input in its `activations`; every later
/// layer reads the previous layer's `activations` as its input.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    activation: Activation,
    output_delta: OutputDelta,
}

fn check_topology(sizes: &[usize]) -> Result<()> {
    if sizes.len() < 2 {
        return Err(NetworkError::InvalidTopology(format!(
            "need at least an input and an output layer, got {} layer(s)",
            sizes.len()
        )));
    }
    if let Some(i) = sizes.iter().position(|&n| n == 0) {
        return Err(NetworkError::InvalidTopology(format!("layer {} has zero width", i)));
    }
    Ok(())
}

impl Network {
    /// Random He-normal weights, zero biases and the reference output delta.
    pub fn new<R: Rng + ?Sized>(sizes: &[usize], activation: Activation, rng: &mut R) -> Result<Self> {
        let options = NetworkOptions {
            activation,
            ..NetworkOptions::default()
        };
        Self::with_options(sizes, &options, rng)
    }

    pub fn with_options<R: Rng + ?Sized>(sizes: &[usize], options: &NetworkOptions, rng: &mut R) -> Result<Self> {
        check_topology(sizes)?;
        let n_layers = sizes.len();
        let layers = (0..n_layers)
            .map(|i| {
                let input_size = if i == 0 { 0 } else { sizes[i - 1] };
                let output_size = if i == n_layers - 1 { 0 } else { sizes[i + 1] };
                Layer::new(i, input_size, sizes[i], output_size, options.bias_init, rng)
            })
            .collect();
        Ok(Self {
            layers,
            activation: options.activation,
            output_delta: options.output_delta,
        })
    }

    /// Builds a network around existing parameters. `weights[i]` and
    /// `biases[i]` belong to layer `i + 1` and must be
    /// `sizes[i + 1] x sizes[i]` and `sizes[i + 1] x 1`.
    pub fn from_parameters(
        sizes: &[usize],
        weights: Vec<Matrix>,
        biases: Vec<Matrix>,
        options: &NetworkOptions,
    ) -> Result<Self> {
        check_topology(sizes)?;
        let n_layers = sizes.len();
        if weights.len() != n_layers - 1 || biases.len() != n_layers - 1 {
            return Err(NetworkError::shape(
                "parameter count",
                n_layers - 1,
                (weights.len(), biases.len()),
            ));
        }
        let mut layers = Vec::with_capacity(n_layers);
        layers.push(Layer::with_parameters(
            0,
            sizes[1],
            Array2::zeros((sizes[0], 0)),
            Array2::zeros((sizes[0], 1)),
        )?);
        for (i, (w, b)) in weights.into_iter().zip(biases).enumerate() {
            let index = i + 1;
            if w.dim() != (sizes[index], sizes[i]) {
                return Err(NetworkError::shape("layer weights", (sizes[index], sizes[i]), w.dim()));
            }
            let output_size = if index == n_layers - 1 { 0 } else { sizes[index + 1] };
            layers.push(Layer::with_parameters(index, output_size, w, b)?);
        }
        Ok(Self {
            layers,
            activation: options.activation,
            output_delta: options.output_delta,
        })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn widths(&self) -> Vec<usize> {
        self.layers.iter().map(|l| l.layer_size).collect()
    }

    pub fn input_width(&self) -> usize {
        self.layers[0].layer_size
    }

    pub fn output_width(&self) -> usize {
        self.output_layer().layer_size
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
    }

    pub fn output_delta(&self) -> OutputDelta {
        self.output_delta
    }

    pub fn set_output_delta(&mut self, output_delta: OutputDelta) {
        self.output_delta = output_delta;
    }

    pub fn options(&self) -> NetworkOptions {
        NetworkOptions {
            activation: self.activation,
            output_delta: self.output_delta,
            bias_init: BiasInit::default(),
        }
    }

    fn output_layer(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Activations of the output layer from the last forward pass.
    pub fn output(&self) -> ArrayView1<'_, f64> {
        self.output_layer().activations.column(0)
    }

    /// Input seen by layer `index`, i.e. the previous layer's activations.
    pub fn layer_input(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        if index == 0 {
            return None;
        }
        self.layers.get(index - 1).map(|l| l.activations.view())
    }

    /// Runs `input` through every layer, overwriting each layer's weighted
    /// sums and activations. Hidden layers use the configured activation, the
    /// last layer uses softmax.
    pub fn forward(&mut self, input: &ArrayView1<f64>) -> Result<ArrayView1<'_, f64>> {
        if input.len() != self.input_width() {
            return Err(NetworkError::shape("network input", self.input_width(), input.len()));
        }
        self.layers[0].activations.column_mut(0).assign(input);

        let activation = self.activation;
        let last = self.layers.len() - 1;
        for i in 1..=last {
            let (done, rest) = self.layers.split_at_mut(i);
            let layer = &mut rest[0];
            layer.compute_weighted_sums(&done[i - 1].activations.view())?;
            if i == last {
                softmax_into(&layer.weighted_sums.view(), &mut layer.activations)?;
            } else {
                matrix::apply_into(&layer.weighted_sums.view(), |x| activation.apply(x), &mut layer.activations)?;
            }
        }
        Ok(self.output())
    }

    /// Backpropagates `target` against the last forward pass and adds the
    /// resulting gradient to every layer's pending totals.
    pub fn backward(&mut self, target: &ArrayView1<f64>) -> Result<()> {
        if target.len() != self.output_width() {
            return Err(NetworkError::shape("network target", self.output_width(), target.len()));
        }
        let target = target.view().insert_axis(Axis(1));
        let activation = self.activation;
        let last = self.layers.len() - 1;

        let output = &mut self.layers[last];
        self.output_delta.compute(
            &activation,
            &output.weighted_sums.view(),
            &output.activations.view(),
            &target,
            &mut output.deltas,
        )?;

        for i in (1..last).rev() {
            let (head, tail) = self.layers.split_at_mut(i + 1);
            let next = &tail[0];
            head[i].backpropagate_from(&next.weights.view(), &next.deltas.view(), |z| activation.derivative(z))?;
        }

        for i in 1..=last {
            let (done, rest) = self.layers.split_at_mut(i);
            rest[0].accumulate_gradients(&done[i - 1].activations.view())?;
        }
        Ok(())
    }

    /// Forward then backward for a single example. Returns the example's loss.
    pub fn accumulate_example(&mut self, input: &ArrayView1<f64>, target: &ArrayView1<f64>) -> Result<f64> {
        let output = self.forward(input)?;
        let loss = crate::loss::loss(&output, target)?;
        self.backward(target)?;
        Ok(loss)
    }

    pub fn reset_gradients(&mut self) {
        self.layers.iter_mut().skip(1).for_each(Layer::reset_gradients);
    }

    pub fn average_gradients(&mut self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(NetworkError::DatasetEmpty);
        }
        self.layers
            .iter_mut()
            .skip(1)
            .for_each(|l| l.average_gradients(batch_size));
        Ok(())
    }

    pub fn apply_gradients(&mut self, learning_rate: f64) {
        self.layers
            .iter_mut()
            .skip(1)
            .for_each(|l| l.apply_gradients(learning_rate));
    }

    /// Adds the pending gradients of a network with the same topology.
    pub fn merge_gradients(&mut self, other: &Network) -> Result<()> {
        if self.widths() != other.widths() {
            return Err(NetworkError::shape("gradient merge", self.widths(), other.widths()));
        }
        for (layer, other) in self.layers.iter_mut().zip(other.layers.iter()).skip(1) {
            layer.merge_gradients(other)?;
        }
        Ok(())
    }

    /// Forward pass plus the index of the most likely class.
    pub fn predict(&mut self, input: &ArrayView1<f64>) -> Result<Prediction> {
        let output = self.forward(input)?;
        let class = matrix::max_index(&output)?;
        Ok(Prediction {
            output: output.to_owned(),
            class,
        })
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network ({:?} hidden, {:?} output delta)", self.activation, self.output_delta)?;
        for layer in &self.layers {
            let kind = if layer.is_input() {
                "input"
            } else if layer.output_size == 0 {
                "output"
            } else {
                "hidden"
            };
            writeln!(
                f,
                "  layer {:>2} {:<6} in {:>4}  size {:>4}  out {:>4}  params {}",
                layer.index,
                kind,
                layer.input_size,
                layer.layer_size,
                layer.output_size,
                layer.parameter_count()
            )?;
        }
        write!(f, "  total params {}", self.parameter_count())
    }
}
