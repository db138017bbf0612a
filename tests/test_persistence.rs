// Saving and reloading networks.

use std::io::Write;

use ff_trainer::persistence::{self, deserialize, serialize};
use ff_trainer::{Activation, BiasInit, Network, NetworkError, NetworkOptions, OutputDelta};
use ndarray::{array, Array1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::NamedTempFile;

fn options() -> NetworkOptions {
    NetworkOptions {
        activation: Activation::LeakyRelu(0.05),
        output_delta: OutputDelta::SquaredError,
        bias_init: BiasInit::Random,
    }
}

#[test]
fn round_trip_reproduces_outputs_exactly() {
    let mut rng = StdRng::seed_from_u64(12);
    let mut original = Network::with_options(&[4, 7, 5, 3], &options(), &mut rng).unwrap();

    let mut bytes = Vec::new();
    serialize(&original, &mut bytes).unwrap();
    let mut restored = deserialize(bytes.as_slice(), &options()).unwrap();

    assert_eq!(restored.widths(), vec![4, 7, 5, 3]);
    for _ in 0..20 {
        let x: Array1<f64> = (0..4).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let a = original.forward(&x.view()).unwrap().to_owned();
        let b = restored.forward(&x.view()).unwrap().to_owned();
        assert_eq!(a, b);
    }
}

#[test]
fn save_and_load_through_a_file() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut original = Network::new(&[3, 10, 4], Activation::Relu, &mut rng).unwrap();
    let file = NamedTempFile::new().unwrap();

    persistence::save(&original, file.path()).unwrap();
    let mut restored = persistence::load(file.path(), &NetworkOptions::default()).unwrap();

    let x = array![0.2, 0.4, 0.6];
    assert_eq!(
        original.predict(&x.view()).unwrap(),
        restored.predict(&x.view()).unwrap()
    );
}

#[test]
fn file_lists_weights_before_biases() {
    let net = Network::from_parameters(
        &[1, 2, 1],
        vec![array![[1.0], [2.0]], array![[3.0, 4.0]]],
        vec![array![[5.0], [6.0]], array![[7.0]]],
        &NetworkOptions::default(),
    )
    .unwrap();
    let text = String::from_utf8(persistence::to_bytes(&net).unwrap()).unwrap();
    let numbers: Vec<f64> = text.split_whitespace().map(|t| t.parse().unwrap()).collect();
    assert_eq!(numbers, vec![3.0, 1.0, 2.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
}

#[test]
fn truncated_file_is_a_format_error() {
    let mut rng = StdRng::seed_from_u64(4);
    let net = Network::new(&[2, 3, 2], Activation::Relu, &mut rng).unwrap();
    let bytes = persistence::to_bytes(&net).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let cut: Vec<&str> = text.split_whitespace().collect();
    let truncated = cut[..cut.len() - 1].join(" ");

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(truncated.as_bytes()).unwrap();
    let err = persistence::load(file.path(), &NetworkOptions::default()).unwrap_err();
    assert!(matches!(err, NetworkError::PersistenceFormat(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = persistence::load(dir.path().join("absent.txt"), &NetworkOptions::default()).unwrap_err();
    assert!(matches!(err, NetworkError::Io(_)));
}
