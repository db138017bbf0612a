//! Training loops: full-batch and stochastic mini-batch gradient descent
//! with loss-triggered learning-rate decay.
//!
//! Every update follows the same cycle: zero the pending gradients, forward
//! and backward each example of the batch, divide the totals by the batch
//! size, then step every layer against the mean gradient.

use std::fs;
use std::path::Path;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, TrainingExample};
use crate::error::{NetworkError, Result};
use crate::loss;
use crate::network::Network;

pub const DEFAULT_DECAY_FACTOR: f64 = 0.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    /// One update per epoch over the whole dataset.
    FullBatch,
    /// One update per iteration over `batch_size` examples drawn with replacement.
    #[default]
    Stochastic,
}

/// Hyper-parameters of a training session.
///
/// ```json
/// {
///   "mode": "stochastic",
///   "epochs": 20000,
///   "learning_rate": 0.2,
///   "batch_size": 32,
///   "checkpoint_interval": 100,
///   "decay_factor": 0.96
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub mode: TrainingMode,
    /// Number of updates: epochs in full-batch mode, iterations in stochastic mode.
    pub epochs: usize,
    pub learning_rate: f64,
    /// Examples per stochastic update. Ignored in full-batch mode.
    pub batch_size: usize,
    /// Loss and accuracy are evaluated every this many updates.
    pub checkpoint_interval: usize,
    /// Applied to the learning rate whenever a checkpoint's loss is higher
    /// than the previous one.
    pub decay_factor: f64,
    /// Compute per-example gradients on the rayon pool.
    pub parallel: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            mode: TrainingMode::default(),
            epochs: 100,
            learning_rate: 0.2,
            batch_size: 32,
            checkpoint_interval: 10,
            decay_factor: DEFAULT_DECAY_FACTOR,
            parallel: false,
        }
    }
}

impl TrainingConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Checks ranges against a dataset of `dataset_len` examples trained in
    /// `mode`. The batch size only matters to stochastic runs.
    pub fn validate(&self, dataset_len: usize, mode: TrainingMode) -> Result<()> {
        if dataset_len == 0 {
            return Err(NetworkError::DatasetEmpty);
        }
        if !(self.learning_rate >= 0.0 && self.learning_rate.is_finite()) {
            return Err(NetworkError::InvalidConfig(format!(
                "learning rate must be a non-negative number, got {}",
                self.learning_rate
            )));
        }
        if self.checkpoint_interval == 0 {
            return Err(NetworkError::InvalidConfig("checkpoint interval must be positive".into()));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(NetworkError::InvalidConfig(format!(
                "decay factor must be in (0, 1], got {}",
                self.decay_factor
            )));
        }
        if mode == TrainingMode::Stochastic && (self.batch_size == 0 || self.batch_size > dataset_len) {
            return Err(NetworkError::InvalidConfig(format!(
                "batch size must be from 1 to {}, got {}",
                dataset_len, self.batch_size
            )));
        }
        Ok(())
    }
}

/// Loss and accuracy measured over the full dataset after update `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub step: usize,
    pub loss: f64,
    pub accuracy: f64,
    /// Learning rate in effect after this checkpoint's decay decision.
    pub learning_rate: f64,
    pub decayed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub checkpoints: Vec<Checkpoint>,
    pub final_learning_rate: f64,
}

impl TrainingReport {
    pub fn last(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }
}

/// Drives a network through many updates and tracks the learning-rate schedule.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
    learning_rate: f64,
    last_checkpoint_loss: Option<f64>,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            config,
            last_checkpoint_loss: None,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Runs the configured mode. `rng` is only drawn from in stochastic mode.
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        network: &mut Network,
        dataset: &Dataset,
        rng: &mut R,
    ) -> Result<TrainingReport> {
        match self.config.mode {
            TrainingMode::FullBatch => self.train_full_batch(network, dataset),
            TrainingMode::Stochastic => self.train_stochastic(network, dataset, rng),
        }
    }

    pub fn train_full_batch(&mut self, network: &mut Network, dataset: &Dataset) -> Result<TrainingReport> {
        self.prepare(network, dataset, TrainingMode::FullBatch)?;
        log::info!(
            "Full-batch training: {} epochs over {} examples, lr {}",
            self.config.epochs,
            dataset.len(),
            self.learning_rate
        );
        let batch: Vec<&TrainingExample> = dataset.iter().collect();
        let mut checkpoints = Vec::new();
        for epoch in 0..self.config.epochs {
            self.train_step(network, &batch)?;
            if epoch % self.config.checkpoint_interval == 0 {
                checkpoints.push(self.checkpoint(network, dataset, epoch)?);
            }
        }
        Ok(self.finish(checkpoints))
    }

    pub fn train_stochastic<R: Rng + ?Sized>(
        &mut self,
        network: &mut Network,
        dataset: &Dataset,
        rng: &mut R,
    ) -> Result<TrainingReport> {
        self.prepare(network, dataset, TrainingMode::Stochastic)?;
        log::info!(
            "Stochastic training: {} iterations, batch {} of {} examples, lr {}",
            self.config.epochs,
            self.config.batch_size,
            dataset.len(),
            self.learning_rate
        );
        let mut checkpoints = Vec::new();
        for iteration in 0..self.config.epochs {
            let batch: Vec<&TrainingExample> = dataset
                .sample_indices(self.config.batch_size, rng)?
                .into_iter()
                .map(|i| &dataset.examples()[i])
                .collect();
            self.train_step(network, &batch)?;
            if iteration % self.config.checkpoint_interval == 0 {
                checkpoints.push(self.checkpoint(network, dataset, iteration)?);
            }
        }
        Ok(self.finish(checkpoints))
    }

    /// One update: zero the pending gradients, accumulate every example,
    /// average over the batch and step with the current learning rate.
    /// Returns the mean loss of the batch before the update.
    pub fn train_step(&mut self, network: &mut Network, batch: &[&TrainingExample]) -> Result<f64> {
        if batch.is_empty() {
            return Err(NetworkError::DatasetEmpty);
        }
        network.reset_gradients();
        let total_loss = if self.config.parallel {
            accumulate_parallel(network, batch)?
        } else {
            let mut total = 0.0;
            for example in batch {
                total += network.accumulate_example(&example.input.view(), &example.target.view())?;
            }
            total
        };
        network.average_gradients(batch.len())?;
        network.apply_gradients(self.learning_rate);
        let batch_loss = total_loss / batch.len() as f64;
        log::debug!("step over {} examples, batch loss {:.6}", batch.len(), batch_loss);
        Ok(batch_loss)
    }

    fn prepare(&mut self, network: &Network, dataset: &Dataset, mode: TrainingMode) -> Result<()> {
        self.config.validate(dataset.len(), mode)?;
        dataset.check_compatible(network)
    }

    /// Evaluates the whole dataset and decays the learning rate when the
    /// loss went up since the previous checkpoint.
    fn checkpoint(&mut self, network: &mut Network, dataset: &Dataset, step: usize) -> Result<Checkpoint> {
        let (loss, accuracy) = loss::evaluate(network, dataset)?;
        let decayed = matches!(self.last_checkpoint_loss, Some(previous) if loss > previous);
        if decayed {
            self.learning_rate *= self.config.decay_factor;
        }
        self.last_checkpoint_loss = Some(loss);
        if !loss.is_finite() {
            log::warn!("step {}: loss is {}, softmax has likely overflowed", step, loss);
        }
        log::info!(
            "step {:>6}  avg loss {:.6}  accuracy {:.4}  lr {:.6}{}",
            step,
            loss,
            accuracy,
            self.learning_rate,
            if decayed { " (decayed)" } else { "" }
        );
        Ok(Checkpoint {
            step,
            loss,
            accuracy,
            learning_rate: self.learning_rate,
            decayed,
        })
    }

    fn finish(&self, checkpoints: Vec<Checkpoint>) -> TrainingReport {
        if let Some(last) = checkpoints.last() {
            log::info!(
                "Training finished: loss {:.6}, accuracy {:.4}, lr {:.6}",
                last.loss,
                last.accuracy,
                self.learning_rate
            );
        }
        TrainingReport {
            checkpoints,
            final_learning_rate: self.learning_rate,
        }
    }
}

/// Per-example gradients are computed on scratch copies of the network and
/// collected in batch order; summing them serially keeps the totals identical
/// to the serial path.
fn accumulate_parallel(network: &mut Network, batch: &[&TrainingExample]) -> Result<f64> {
    let template: &Network = network;
    let results: Vec<Result<(f64, Network)>> = batch
        .par_iter()
        .map(|example| -> Result<(f64, Network)> {
            let mut scratch = template.clone();
            scratch.reset_gradients();
            let loss = scratch.accumulate_example(&example.input.view(), &example.target.view())?;
            Ok((loss, scratch))
        })
        .collect();

    let mut total = 0.0;
    for result in results {
        let (loss, scratch) = result?;
        network.merge_gradients(&scratch)?;
        total += loss;
    }
    Ok(total)
}
