//! Pointwise activation functions, the output softmax and the output-layer
//! delta strategies.

use ndarray::{prelude::*, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};
use crate::matrix::Matrix;

pub const DEFAULT_LEAKY_ALPHA: f64 = 0.01;

/// Nonlinearity applied to every hidden layer's weighted sums.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// `max(0, x)`
    #[default]
    Relu,
    /// `x` for positive inputs, `alpha * x` otherwise.
    LeakyRelu(f64),
    /// `1 / (1 + exp(-x))`
    Sigmoid,
    /// Any function paired with its derivative.
    #[serde(skip)]
    Custom {
        function: fn(f64) -> f64,
        derivative: fn(f64) -> f64,
    },
}

impl Activation {
    pub fn leaky_relu() -> Self {
        Activation::LeakyRelu(DEFAULT_LEAKY_ALPHA)
    }

    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Activation::Relu => x.max(0.0),
            Activation::LeakyRelu(alpha) => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            Activation::Sigmoid => sigmoid(x),
            Activation::Custom { function, .. } => function(x),
        }
    }

    /// Derivative with respect to the pre-activation value.
    /// The rectifier family uses 0 (or `alpha`) at exactly `x == 0`.
    pub fn derivative(&self, x: f64) -> f64 {
        match *self {
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyRelu(alpha) => {
                if x > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Activation::Custom { derivative, .. } => derivative(x),
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `out_k = exp(z_k) / sum_j exp(z_j)`.
///
/// There is no max-subtraction, so pre-activations beyond ~709 overflow and
/// the output turns into NaN.
pub fn softmax_into(z: &ArrayView2<f64>, out: &mut Matrix) -> Result<()> {
    if z.dim() != out.dim() {
        return Err(NetworkError::shape("softmax", z.dim(), out.dim()));
    }
    out.zip_mut_with(z, |o, &v| *o = v.exp());
    let sum = out.sum();
    out.mapv_inplace(|v| v / sum);
    Ok(())
}

/// How the output layer's error term is formed from the squared-error loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputDelta {
    /// `2 (a_k - t_k)`, ignoring the softmax derivative.
    #[default]
    SquaredError,
    /// `2 (a_k - t_k) * f'(z_k)` using the hidden activation's derivative.
    ActivationDerivative,
    /// `sum_j 2 (a_j - t_j) a_j (delta_jk - a_k)`, the exact gradient through softmax.
    SoftmaxJacobian,
}

impl OutputDelta {
    /// Fills `deltas` for the output layer.
    ///
    /// All of `weighted_sums`, `activations`, `target` and `deltas` are `n x 1`.
    pub fn compute(
        &self,
        activation: &Activation,
        weighted_sums: &ArrayView2<f64>,
        activations: &ArrayView2<f64>,
        target: &ArrayView2<f64>,
        deltas: &mut Matrix,
    ) -> Result<()> {
        if activations.dim() != target.dim() {
            return Err(NetworkError::shape("output delta", activations.dim(), target.dim()));
        }
        if deltas.dim() != activations.dim() || weighted_sums.dim() != activations.dim() {
            return Err(NetworkError::shape("output delta", activations.dim(), deltas.dim()));
        }
        match self {
            OutputDelta::SquaredError => {
                Zip::from(deltas)
                    .and(activations)
                    .and(target)
                    .for_each(|d, &a, &t| *d = 2.0 * (a - t));
            }
            OutputDelta::ActivationDerivative => {
                Zip::from(deltas)
                    .and(activations)
                    .and(target)
                    .and(weighted_sums)
                    .for_each(|d, &a, &t, &z| *d = 2.0 * (a - t) * activation.derivative(z));
            }
            OutputDelta::SoftmaxJacobian => {
                // g_j a_j summed once, then delta_k = a_k (g_k - sum_j g_j a_j)
                let weighted: f64 = activations
                    .iter()
                    .zip(target.iter())
                    .map(|(&a, &t)| 2.0 * (a - t) * a)
                    .sum();
                Zip::from(deltas)
                    .and(activations)
                    .and(target)
                    .for_each(|d, &a, &t| *d = a * (2.0 * (a - t) - weighted));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube(x: f64) -> f64 {
        x * x * x
    }

    fn cube_prime(x: f64) -> f64 {
        3.0 * x * x
    }

    #[test]
    fn rectifier_family() {
        assert_eq!(Activation::Relu.apply(-2.0), 0.0);
        assert_eq!(Activation::Relu.apply(0.3), 0.3);
        assert_eq!(Activation::Relu.derivative(0.0), 0.0);
        assert_eq!(Activation::Relu.derivative(0.1), 1.0);

        let leaky = Activation::leaky_relu();
        assert_relative_eq!(leaky.apply(-2.0), -0.02);
        assert_eq!(leaky.derivative(-1.0), DEFAULT_LEAKY_ALPHA);
        assert_eq!(leaky.derivative(1.0), 1.0);
    }

    #[test]
    fn defaults() {
        assert_eq!(Activation::default(), Activation::Relu);
        assert_eq!(OutputDelta::default(), OutputDelta::SquaredError);
    }

    #[test]
    fn sigmoid_and_custom() {
        assert_relative_eq!(Activation::Sigmoid.apply(0.0), 0.5);
        assert_relative_eq!(Activation::Sigmoid.derivative(0.0), 0.25);

        let custom = Activation::Custom {
            function: cube,
            derivative: cube_prime,
        };
        assert_eq!(custom.apply(2.0), 8.0);
        assert_eq!(custom.derivative(2.0), 12.0);
    }

    #[test]
    fn softmax_normalizes() {
        let z = array![[1.0], [2.0], [3.0]];
        let mut out = Array2::zeros((3, 1));
        softmax_into(&z.view(), &mut out).unwrap();
        assert_relative_eq!(out.sum(), 1.0, epsilon = 1e-12);
        assert!(out[[2, 0]] > out[[1, 0]] && out[[1, 0]] > out[[0, 0]]);

        let e: f64 = 1f64.exp() + 2f64.exp() + 3f64.exp();
        assert_relative_eq!(out[[0, 0]], 1f64.exp() / e, epsilon = 1e-15);
    }

    #[test]
    fn softmax_overflows_without_stabilization() {
        let z = array![[1000.0], [0.0]];
        let mut out = Array2::zeros((2, 1));
        softmax_into(&z.view(), &mut out).unwrap();
        assert!(out[[0, 0]].is_nan());
    }

    #[test]
    fn output_delta_strategies() {
        let z = array![[0.5], [-0.5]];
        let a = array![[0.7], [0.3]];
        let t = array![[1.0], [0.0]];
        let mut d = Array2::zeros((2, 1));

        OutputDelta::SquaredError
            .compute(&Activation::Relu, &z.view(), &a.view(), &t.view(), &mut d)
            .unwrap();
        assert_relative_eq!(d[[0, 0]], -0.6, epsilon = 1e-12);
        assert_relative_eq!(d[[1, 0]], 0.6, epsilon = 1e-12);

        OutputDelta::ActivationDerivative
            .compute(&Activation::Relu, &z.view(), &a.view(), &t.view(), &mut d)
            .unwrap();
        assert_relative_eq!(d[[0, 0]], -0.6, epsilon = 1e-12);
        assert_eq!(d[[1, 0]], 0.0);

        // g = [-0.6, 0.6]; sum g_j a_j = -0.42 + 0.18 = -0.24
        OutputDelta::SoftmaxJacobian
            .compute(&Activation::Relu, &z.view(), &a.view(), &t.view(), &mut d)
            .unwrap();
        assert_relative_eq!(d[[0, 0]], 0.7 * (-0.6 + 0.24), epsilon = 1e-12);
        assert_relative_eq!(d[[1, 0]], 0.3 * (0.6 + 0.24), epsilon = 1e-12);
        assert_relative_eq!(d.sum(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn activation_names_in_json() {
        let a: Activation = serde_json::from_str("\"relu\"").unwrap();
        assert_eq!(a, Activation::Relu);
        let a: Activation = serde_json::from_str("{\"leaky_relu\": 0.05}").unwrap();
        assert_eq!(a, Activation::LeakyRelu(0.05));
        let d: OutputDelta = serde_json::from_str("\"softmax_jacobian\"").unwrap();
        assert_eq!(d, OutputDelta::SoftmaxJacobian);
    }
}
