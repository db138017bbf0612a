//! Plain-text network files.
//!
//! Layout, whitespace separated:
//!
//! ```text
//! <layer count>
//! <width 0> <width 1> ... <width L-1>
//! <weights of layer 1, row-major>
//! ...
//! <weights of layer L-1, row-major>
//! <biases of layer 1>
//! ...
//! <biases of layer L-1>
//! ```
//!
//! Floats use Rust's shortest round-trip formatting, so a reloaded network
//! reproduces the original's outputs exactly.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use ndarray::Array2;

use crate::error::{NetworkError, Result};
use crate::matrix::Matrix;
use crate::network::{Network, NetworkOptions};

pub fn serialize<W: Write>(network: &Network, writer: W) -> Result<()> {
    let mut w = BufWriter::new(writer);
    let widths = network.widths();
    writeln!(w, "{}", widths.len())?;
    writeln!(w, "{}", join(widths.iter()))?;
    for layer in network.layers().iter().skip(1) {
        writeln!(w, "{}", join(layer.weights.iter()))?;
    }
    for layer in network.layers().iter().skip(1) {
        writeln!(w, "{}", join(layer.biases.iter()))?;
    }
    w.flush()?;
    Ok(())
}

fn join<T: ToString>(values: impl Iterator<Item = T>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

/// Rebuilds a network. The file carries no activation settings, so they come
/// from `options` and must match the ones the network was trained with.
pub fn deserialize<R: Read>(mut reader: R, options: &NetworkOptions) -> Result<Network> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let mut tokens = Tokens(text.split_whitespace());

    let n_layers: usize = tokens.next("layer count")?;
    if n_layers < 2 {
        return Err(NetworkError::PersistenceFormat(format!(
            "layer count must be at least 2, got {}",
            n_layers
        )));
    }
    let sizes = (0..n_layers)
        .map(|_| tokens.next::<usize>("layer width"))
        .collect::<Result<Vec<_>>>()?;
    if sizes.contains(&0) {
        return Err(NetworkError::PersistenceFormat(format!("zero layer width in {:?}", sizes)));
    }

    let weights = sizes
        .windows(2)
        .map(|w| tokens.matrix(w[1], w[0], "weight"))
        .collect::<Result<Vec<_>>>()?;
    let biases = sizes[1..]
        .iter()
        .map(|&n| tokens.matrix(n, 1, "bias"))
        .collect::<Result<Vec<_>>>()?;

    if let Some(extra) = tokens.0.next() {
        return Err(NetworkError::PersistenceFormat(format!("unexpected trailing data {:?}", extra)));
    }
    Network::from_parameters(&sizes, weights, biases, options)
}

struct Tokens<'a>(std::str::SplitWhitespace<'a>);

impl<'a> Tokens<'a> {
    fn next<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self
            .0
            .next()
            .ok_or_else(|| NetworkError::PersistenceFormat(format!("truncated data: missing {}", what)))?;
        token
            .parse()
            .map_err(|_| NetworkError::PersistenceFormat(format!("invalid {} {:?}", what, token)))
    }

    fn matrix(&mut self, rows: usize, cols: usize, what: &str) -> Result<Matrix> {
        let count = rows.checked_mul(cols).ok_or_else(|| {
            NetworkError::PersistenceFormat(format!("{} matrix of {} x {} is too large", what, rows, cols))
        })?;
        let values = (0..count)
            .map(|_| self.next::<f64>(what))
            .collect::<Result<Vec<_>>>()?;
        Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| NetworkError::PersistenceFormat(e.to_string()))
    }
}

pub fn to_bytes(network: &Network) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    serialize(network, &mut bytes)?;
    Ok(bytes)
}

pub fn from_bytes(bytes: &[u8], options: &NetworkOptions) -> Result<Network> {
    deserialize(bytes, options)
}

pub fn save<P: AsRef<Path>>(network: &Network, path: P) -> Result<()> {
    serialize(network, File::create(path.as_ref())?)?;
    log::info!("Saved network {:?} to {}", network.widths(), path.as_ref().display());
    Ok(())
}

pub fn load<P: AsRef<Path>>(path: P, options: &NetworkOptions) -> Result<Network> {
    let network = deserialize(File::open(path.as_ref())?, options)?;
    log::info!("Loaded network {:?} from {}", network.widths(), path.as_ref().display());
    Ok(network)
}
