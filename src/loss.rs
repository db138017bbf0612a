//! Squared-error loss and dataset-level evaluation.

use ndarray::prelude::*;

use crate::dataset::Dataset;
use crate::error::{NetworkError, Result};
use crate::matrix::max_index;
use crate::network::Network;

/// `sum_k (output_k - target_k)^2`, not averaged over the outputs.
pub fn loss(output: &ArrayView1<f64>, target: &ArrayView1<f64>) -> Result<f64> {
    if output.len() != target.len() {
        return Err(NetworkError::shape("loss", output.len(), target.len()));
    }
    Ok(output
        .iter()
        .zip(target.iter())
        .map(|(&o, &t)| (o - t) * (o - t))
        .sum())
}

/// Mean per-example loss after a forward pass of each example.
pub fn average_loss(network: &mut Network, dataset: &Dataset) -> Result<f64> {
    if dataset.is_empty() {
        return Err(NetworkError::DatasetEmpty);
    }
    let mut total = 0.0;
    for example in dataset.iter() {
        let output = network.forward(&example.input.view())?;
        total += loss(&output, &example.target.view())?;
    }
    Ok(total / dataset.len() as f64)
}

/// Fraction of examples whose predicted class matches the target's argmax.
pub fn accuracy(network: &mut Network, dataset: &Dataset) -> Result<f64> {
    if dataset.is_empty() {
        return Err(NetworkError::DatasetEmpty);
    }
    let mut hits = 0usize;
    for example in dataset.iter() {
        let output = network.forward(&example.input.view())?;
        if max_index(&output)? == max_index(&example.target.view())? {
            hits += 1;
        }
    }
    Ok(hits as f64 / dataset.len() as f64)
}

/// Average loss and accuracy in a single pass over the dataset.
pub fn evaluate(network: &mut Network, dataset: &Dataset) -> Result<(f64, f64)> {
    if dataset.is_empty() {
        return Err(NetworkError::DatasetEmpty);
    }
    let mut total = 0.0;
    let mut hits = 0usize;
    for example in dataset.iter() {
        let output = network.forward(&example.input.view())?;
        total += loss(&output, &example.target.view())?;
        if max_index(&output)? == max_index(&example.target.view())? {
            hits += 1;
        }
    }
    let n = dataset.len() as f64;
    Ok((total / n, hits as f64 / n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TrainingExample;
    use crate::network::NetworkOptions;
    use approx::assert_relative_eq;

    #[test]
    fn loss_is_summed_not_averaged() {
        let l = loss(&array![0.5, 0.5].view(), &array![1.0, 0.0].view()).unwrap();
        assert_relative_eq!(l, 0.5);
        assert!(loss(&array![0.5].view(), &array![1.0, 0.0].view()).is_err());
    }

    #[test]
    fn empty_dataset_is_an_error() {
        let mut net = Network::from_parameters(
            &[1, 2],
            vec![array![[1.0], [-1.0]]],
            vec![array![[0.0], [0.0]]],
            &NetworkOptions::default(),
        )
        .unwrap();
        let empty = Dataset::empty(1, 2);
        assert!(matches!(average_loss(&mut net, &empty), Err(NetworkError::DatasetEmpty)));
        assert!(matches!(accuracy(&mut net, &empty), Err(NetworkError::DatasetEmpty)));
        assert!(matches!(evaluate(&mut net, &empty), Err(NetworkError::DatasetEmpty)));
    }

    #[test]
    fn accuracy_counts_argmax_hits() {
        // positive input favours class 0, negative favours class 1
        let mut net = Network::from_parameters(
            &[1, 2],
            vec![array![[1.0], [-1.0]]],
            vec![array![[0.0], [0.0]]],
            &NetworkOptions::default(),
        )
        .unwrap();
        let data = Dataset::new(vec![
            TrainingExample::new(array![1.0], array![1.0, 0.0]),
            TrainingExample::new(array![-1.0], array![0.0, 1.0]),
            TrainingExample::new(array![2.0], array![0.0, 1.0]),
            TrainingExample::new(array![-2.0], array![0.0, 1.0]),
        ])
        .unwrap();
        assert_relative_eq!(accuracy(&mut net, &data).unwrap(), 0.75);
        let (avg, acc) = evaluate(&mut net, &data).unwrap();
        assert_relative_eq!(acc, 0.75);
        assert_relative_eq!(avg, average_loss(&mut net, &data).unwrap(), epsilon = 1e-12);
    }
}
