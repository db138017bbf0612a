//! Training examples and the plain-text dataset loader.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use ndarray::{Array1, ArrayView2, Axis};
use rand::Rng;

use crate::error::{NetworkError, Result};
use crate::network::Network;

/// An input vector paired with the output the network should produce.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub input: Array1<f64>,
    pub target: Array1<f64>,
}

impl TrainingExample {
    pub fn new(input: Array1<f64>, target: Array1<f64>) -> Self {
        Self { input, target }
    }
}

/// Ordered collection of examples sharing the same input and target widths.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    examples: Vec<TrainingExample>,
    input_width: usize,
    target_width: usize,
}

impl Dataset {
    /// Widths are taken from the first example; every other example must match.
    /// Use `Dataset::empty` when there are no examples to take them from.
    pub fn new(examples: Vec<TrainingExample>) -> Result<Self> {
        let (input_width, target_width) = match examples.first() {
            Some(e) => (e.input.len(), e.target.len()),
            None => return Err(NetworkError::DatasetEmpty),
        };
        for e in &examples {
            if e.input.len() != input_width {
                return Err(NetworkError::shape("dataset input", input_width, e.input.len()));
            }
            if e.target.len() != target_width {
                return Err(NetworkError::shape("dataset target", target_width, e.target.len()));
            }
        }
        Ok(Self {
            examples,
            input_width,
            target_width,
        })
    }

    /// Pairs row `i` of `inputs` with row `i` of `targets`.
    pub fn from_rows(inputs: &ArrayView2<f64>, targets: &ArrayView2<f64>) -> Result<Self> {
        if inputs.nrows() != targets.nrows() {
            return Err(NetworkError::shape("dataset rows", inputs.nrows(), targets.nrows()));
        }
        let examples = inputs
            .axis_iter(Axis(0))
            .zip(targets.axis_iter(Axis(0)))
            .map(|(x, t)| TrainingExample::new(x.to_owned(), t.to_owned()))
            .collect();
        Self::new(examples)
    }

    pub fn empty(input_width: usize, target_width: usize) -> Self {
        Self {
            examples: Vec::new(),
            input_width,
            target_width,
        }
    }

    /// Reads whitespace-separated records, one per line: `input_width`
    /// numbers followed by `target_width` numbers. Blank lines and lines
    /// starting with `#` are skipped. At most `limit` records are read.
    pub fn from_reader<R: Read>(
        reader: R,
        input_width: usize,
        target_width: usize,
        limit: Option<usize>,
    ) -> Result<Self> {
        let mut dataset = Self::empty(input_width, target_width);
        let expected = input_width + target_width;
        for (i, line) in BufReader::new(reader).lines().enumerate() {
            if limit.map_or(false, |l| dataset.len() >= l) {
                break;
            }
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let values = trimmed
                .split_whitespace()
                .map(|tok| {
                    tok.parse::<f64>().map_err(|e| NetworkError::DatasetFormat {
                        line: i + 1,
                        message: format!("{:?}: {}", tok, e),
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            if values.len() != expected {
                return Err(NetworkError::DatasetFormat {
                    line: i + 1,
                    message: format!("expected {} values, got {}", expected, values.len()),
                });
            }
            let (input, target) = values.split_at(input_width);
            dataset.examples.push(TrainingExample::new(
                Array1::from(input.to_vec()),
                Array1::from(target.to_vec()),
            ));
        }
        Ok(dataset)
    }

    pub fn load<P: AsRef<Path>>(
        path: P,
        input_width: usize,
        target_width: usize,
        limit: Option<usize>,
    ) -> Result<Self> {
        let dataset = Self::from_reader(File::open(path.as_ref())?, input_width, target_width, limit)?;
        log::info!(
            "Loaded {} examples from {}",
            dataset.len(),
            path.as_ref().display()
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TrainingExample> {
        self.examples.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrainingExample> {
        self.examples.iter()
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn target_width(&self) -> usize {
        self.target_width
    }

    /// `batch_size` indices drawn uniformly with replacement.
    pub fn sample_indices<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<usize>> {
        if self.is_empty() {
            return Err(NetworkError::DatasetEmpty);
        }
        Ok((0..batch_size).map(|_| rng.gen_range(0..self.len())).collect())
    }

    pub fn check_compatible(&self, network: &Network) -> Result<()> {
        if self.input_width != network.input_width() {
            return Err(NetworkError::shape("dataset input", network.input_width(), self.input_width));
        }
        if self.target_width != network.output_width() {
            return Err(NetworkError::shape("dataset target", network.output_width(), self.target_width));
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a TrainingExample;
    type IntoIter = std::slice::Iter<'a, TrainingExample>;

    fn into_iter(self) -> Self::IntoIter {
        self.examples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    const RECORDS: &str = "\
# r g b | 2 classes
0.1 0.2 0.3 1 0

0.9 0.8 0.7 0 1
0.5 0.5 0.5 1 0
";

    #[test]
    fn parses_records() {
        let data = Dataset::from_reader(RECORDS.as_bytes(), 3, 2, None).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.get(1).unwrap().input, array![0.9, 0.8, 0.7]);
        assert_eq!(data.get(1).unwrap().target, array![0.0, 1.0]);
    }

    #[test]
    fn honours_record_limit() {
        let data = Dataset::from_reader(RECORDS.as_bytes(), 3, 2, Some(2)).unwrap();
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn reports_bad_lines() {
        let err = Dataset::from_reader("1 2 3 4\n".as_bytes(), 3, 2, None).unwrap_err();
        assert!(matches!(err, NetworkError::DatasetFormat { line: 1, .. }));
        let err = Dataset::from_reader("0 0 0 1 0\n1 x 0 1 0\n".as_bytes(), 3, 2, None).unwrap_err();
        assert!(matches!(err, NetworkError::DatasetFormat { line: 2, .. }));
    }

    #[test]
    fn rejects_ragged_examples() {
        let err = Dataset::new(vec![
            TrainingExample::new(array![1.0, 2.0], array![1.0]),
            TrainingExample::new(array![1.0], array![1.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { .. }));
        assert!(matches!(Dataset::new(vec![]), Err(NetworkError::DatasetEmpty)));
    }

    #[test]
    fn builds_from_row_matrices() {
        let inputs = array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]];
        let targets = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]];
        let data = Dataset::from_rows(&inputs.view(), &targets.view()).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.get(2).unwrap().input, array![0.5, 0.6]);
        assert_eq!(data.get(1).unwrap().target, array![0.0, 1.0]);

        let short = array![[1.0, 0.0], [0.0, 1.0]];
        let err = Dataset::from_rows(&inputs.view(), &short.view()).unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { context: "dataset rows", .. }));
    }

    #[test]
    fn samples_with_replacement() {
        let data = Dataset::from_reader(RECORDS.as_bytes(), 3, 2, None).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let indices = data.sample_indices(50, &mut rng).unwrap();
        assert_eq!(indices.len(), 50);
        assert!(indices.iter().all(|&i| i < 3));
        assert!(Dataset::empty(3, 2).sample_indices(1, &mut rng).is_err());
    }
}
