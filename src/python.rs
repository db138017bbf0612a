use ndarray::{Axis, Array1};
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::{exceptions::PyValueError, prelude::*};
use rand::{rngs::StdRng, SeedableRng};

use crate::activation::{Activation, OutputDelta};
use crate::dataset::Dataset;
use crate::error::NetworkError;
use crate::network::{self, NetworkOptions};
use crate::training::{Trainer, TrainingConfig, TrainingMode};
use crate::{loss, persistence};

impl From<NetworkError> for PyErr {
    fn from(err: NetworkError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

fn to_dataset(data: PyReadonlyArray2<f64>, targets: PyReadonlyArray2<f64>) -> Result<Dataset, NetworkError> {
    Dataset::from_rows(&data.as_array(), &targets.as_array())
}

#[pyclass]
struct Network {
    nn: Box<network::Network>,
    rng: StdRng,
}

#[pymethods]
impl Network {
    #[new]
    fn py_new(sizes: Vec<usize>, seed: u64) -> PyResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let nn = network::Network::new(&sizes, Activation::Relu, &mut rng)?;
        Ok(Self { nn: Box::new(nn), rng })
    }

    fn set_activation_relu(&mut self) {
        self.nn.set_activation(Activation::Relu);
    }

    fn set_activation_leaky_relu(&mut self, alpha: f64) {
        self.nn.set_activation(Activation::LeakyRelu(alpha));
    }

    fn set_activation_sigmoid(&mut self) {
        self.nn.set_activation(Activation::Sigmoid);
    }

    fn set_softmax_jacobian(&mut self, enabled: bool) {
        self.nn.set_output_delta(if enabled {
            OutputDelta::SoftmaxJacobian
        } else {
            OutputDelta::SquaredError
        });
    }

    fn set_weights(&mut self, ws: Vec<PyReadonlyArray2<f64>>) -> PyResult<()> {
        let n = self.nn.layers().len() - 1;
        if ws.len() != n {
            return Err(PyValueError::new_err("Incorrect length"));
        }
        for (i, w) in ws.iter().enumerate() {
            let w = w.as_array();
            let layer = self.nn.layer_mut(i + 1).ok_or_else(|| PyValueError::new_err("Incorrect length"))?;
            if layer.weights.shape() != w.shape() {
                return Err(PyValueError::new_err("Incorrect shape"));
            }
            layer.weights.assign(&w);
        }
        Ok(())
    }

    fn set_biases(&mut self, bs: Vec<PyReadonlyArray1<f64>>) -> PyResult<()> {
        let n = self.nn.layers().len() - 1;
        if bs.len() != n {
            return Err(PyValueError::new_err("Incorrect length"));
        }
        for (i, b) in bs.iter().enumerate() {
            let b = b.as_array().insert_axis(Axis(1));
            let layer = self.nn.layer_mut(i + 1).ok_or_else(|| PyValueError::new_err("Incorrect length"))?;
            if layer.biases.shape() != b.shape() {
                return Err(PyValueError::new_err("Incorrect shape"));
            }
            layer.biases.assign(&b);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn train(
        &mut self,
        training_data: PyReadonlyArray2<f64>,
        training_class: PyReadonlyArray2<f64>,
        epochs: usize,
        mini_batch_size: usize,
        eta: f64,
        decay_factor: f64,
        checkpoint_interval: usize,
        full_batch: bool,
    ) -> PyResult<(f64, f64)> {
        let dataset = to_dataset(training_data, training_class)?;
        let mut trainer = Trainer::new(TrainingConfig {
            mode: if full_batch {
                TrainingMode::FullBatch
            } else {
                TrainingMode::Stochastic
            },
            epochs,
            learning_rate: eta,
            batch_size: mini_batch_size,
            checkpoint_interval,
            decay_factor,
            parallel: false,
        });
        let report = trainer.train(&mut self.nn, &dataset, &mut self.rng)?;
        Ok(report
            .last()
            .map(|c| (c.loss, c.accuracy))
            .unwrap_or((f64::NAN, f64::NAN)))
    }

    fn evaluate(&mut self, val_data: PyReadonlyArray2<f64>, val_class: PyReadonlyArray2<f64>) -> PyResult<(f64, f64)> {
        let dataset = to_dataset(val_data, val_class)?;
        Ok(loss::evaluate(&mut self.nn, &dataset)?)
    }

    fn predict<'py>(&mut self, data: PyReadonlyArray1<f64>, py: Python<'py>) -> PyResult<&'py PyArray1<f64>> {
        let output: Array1<f64> = self.nn.forward(&data.as_array())?.to_owned();
        Ok(output.into_pyarray(py))
    }

    fn save(&self, path: &str) -> PyResult<()> {
        Ok(persistence::save(&self.nn, path)?)
    }

    #[staticmethod]
    fn load(path: &str, seed: u64) -> PyResult<Self> {
        let nn = persistence::load(path, &NetworkOptions::default())?;
        Ok(Self {
            nn: Box::new(nn),
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

#[pymodule]
fn ff_trainer(_: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<Network>()?;
    Ok(())
}
