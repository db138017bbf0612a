//! Feed-forward multilayer perceptron trained with backpropagation and
//! (mini-batch) stochastic gradient descent.
//!
//! ```
//! use ff_trainer::{Activation, Dataset, Network, Trainer, TrainingConfig, TrainingExample, TrainingMode};
//! use ndarray::array;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut net = Network::new(&[2, 8, 2], Activation::Relu, &mut rng).unwrap();
//! let data = Dataset::new(vec![
//!     TrainingExample::new(array![1.0, 0.0], array![1.0, 0.0]),
//!     TrainingExample::new(array![0.0, 1.0], array![0.0, 1.0]),
//! ])
//! .unwrap();
//!
//! let mut trainer = Trainer::new(TrainingConfig {
//!     mode: TrainingMode::FullBatch,
//!     epochs: 50,
//!     learning_rate: 0.5,
//!     ..TrainingConfig::default()
//! });
//! trainer.train(&mut net, &data, &mut rng).unwrap();
//! let prediction = net.predict(&array![1.0, 0.0].view()).unwrap();
//! assert_eq!(prediction.output.len(), 2);
//! ```

#[cfg(feature = "blas")]
extern crate blas_src;

pub mod activation;
pub mod dataset;
pub mod error;
pub mod layer;
pub mod loss;
pub mod matrix;
pub mod network;
pub mod persistence;
pub mod training;

#[cfg(feature = "python")]
mod python;

pub use activation::{Activation, OutputDelta};
pub use dataset::{Dataset, TrainingExample};
pub use error::{NetworkError, Result};
pub use layer::{BiasInit, Layer};
pub use loss::{accuracy, average_loss, loss};
pub use matrix::Matrix;
pub use network::{Network, NetworkOptions, Prediction};
pub use training::{Checkpoint, Trainer, TrainingConfig, TrainingMode, TrainingReport};
