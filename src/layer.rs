use ndarray::{prelude::*, Zip};
use rand::Rng;

use crate::error::{NetworkError, Result};
use crate::matrix::{self, Matrix};

/// How biases are filled when a network is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasInit {
    #[default]
    Zero,
    /// Same He-normal distribution as the weights.
    Random,
}

/// One stage of the network.
///
/// The layer does not hold its input: it is always the previous layer's
/// `activations`, which the owning `Network` passes in. Buffers are allocated
/// once here and never resized afterwards.
#[derive(Debug, Clone)]
pub struct Layer {
    pub index: usize,
    pub input_size: usize,
    pub layer_size: usize,
    pub output_size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    /// Pending gradient for `weights`. Reset at the start of every batch.
    pub delta_weights: Matrix,
    /// Pending gradient for `biases`. Reset at the start of every batch.
    pub delta_biases: Matrix,
    pub weighted_sums: Matrix,
    pub activations: Matrix,
    pub deltas: Matrix,
}

impl Layer {
    /// Allocates a layer with random weights.
    ///
    /// The input layer (`input_size == 0`) ends up with an empty weight matrix
    /// and zero biases that are never read.
    pub fn new<R: Rng + ?Sized>(
        index: usize,
        input_size: usize,
        layer_size: usize,
        output_size: usize,
        bias_init: BiasInit,
        rng: &mut R,
    ) -> Self {
        let weights = matrix::random_normal(layer_size, input_size, input_size, rng);
        let biases = match bias_init {
            BiasInit::Random => matrix::random_normal(layer_size, 1, input_size, rng),
            BiasInit::Zero => Array2::zeros((layer_size, 1)),
        };
        Self::allocate(index, output_size, weights, biases)
    }

    /// Builds a layer around explicit parameters. `weights` is
    /// `layer_size x input_size`, `biases` is `layer_size x 1`.
    pub fn with_parameters(index: usize, output_size: usize, weights: Matrix, biases: Matrix) -> Result<Self> {
        let (layer_size, _) = weights.dim();
        if biases.dim() != (layer_size, 1) {
            return Err(NetworkError::shape("layer biases", (layer_size, 1), biases.dim()));
        }
        Ok(Self::allocate(index, output_size, weights, biases))
    }

    fn allocate(index: usize, output_size: usize, weights: Matrix, biases: Matrix) -> Self {
        let (layer_size, input_size) = weights.dim();
        Self {
            index,
            input_size,
            layer_size,
            output_size,
            delta_weights: Array2::zeros(weights.dim()),
            delta_biases: Array2::zeros(biases.dim()),
            weighted_sums: Array2::zeros((layer_size, 1)),
            activations: Array2::zeros((layer_size, 1)),
            deltas: Array2::zeros((layer_size, 1)),
            weights,
            biases,
        }
    }

    pub fn is_input(&self) -> bool {
        self.index == 0
    }

    pub fn parameter_count(&self) -> usize {
        if self.is_input() {
            0
        } else {
            self.weights.len() + self.biases.len()
        }
    }

    /// `weighted_sums = weights . input + biases`
    pub(crate) fn compute_weighted_sums(&mut self, input: &ArrayView2<f64>) -> Result<()> {
        matrix::multiply_into(&self.weights.view(), input, &mut self.weighted_sums)?;
        matrix::add_assign(&mut self.weighted_sums, &self.biases.view())
    }

    /// Hidden-layer error term from the next layer's weights and deltas:
    /// `deltas[n] = (sum_m next_w[m, n] * next_d[m]) * f'(z[n])`.
    pub(crate) fn backpropagate_from(
        &mut self,
        next_weights: &ArrayView2<f64>,
        next_deltas: &ArrayView2<f64>,
        derivative: impl Fn(f64) -> f64,
    ) -> Result<()> {
        matrix::multiply_into(&next_weights.t(), next_deltas, &mut self.deltas)?;
        let weighted_sums = &self.weighted_sums;
        Zip::from(&mut self.deltas)
            .and(weighted_sums)
            .for_each(|d, &z| *d *= derivative(z));
        Ok(())
    }

    /// Adds this example's gradient to the pending totals:
    /// `delta_weights += deltas . input^T`, `delta_biases += deltas`.
    pub(crate) fn accumulate_gradients(&mut self, input: &ArrayView2<f64>) -> Result<()> {
        if input.dim() != (self.input_size, 1) {
            return Err(NetworkError::shape("gradient input", (self.input_size, 1), input.dim()));
        }
        let deltas = self.deltas.column(0);
        let input = input.column(0);
        for (mut row, &d) in self.delta_weights.rows_mut().into_iter().zip(deltas.iter()) {
            row.zip_mut_with(&input, |w, &x| *w += d * x);
        }
        self.delta_biases += &self.deltas;
        Ok(())
    }

    /// Adds another layer's pending gradient into this one.
    pub(crate) fn merge_gradients(&mut self, other: &Layer) -> Result<()> {
        matrix::add_assign(&mut self.delta_weights, &other.delta_weights.view())?;
        matrix::add_assign(&mut self.delta_biases, &other.delta_biases.view())
    }

    pub fn reset_gradients(&mut self) {
        self.delta_weights.fill(0.0);
        self.delta_biases.fill(0.0);
    }

    /// Turns the summed gradient into the batch mean.
    pub fn average_gradients(&mut self, batch_size: usize) {
        let n = batch_size as f64;
        self.delta_weights /= n;
        self.delta_biases /= n;
    }

    /// `weights -= lr * delta_weights`, `biases -= lr * delta_biases`
    pub fn apply_gradients(&mut self, learning_rate: f64) {
        self.weights.scaled_add(-learning_rate, &self.delta_weights);
        self.biases.scaled_add(-learning_rate, &self.delta_biases);
    }
}
