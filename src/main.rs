//! Command-line front end: train a network on a dataset file, or query a
//! saved network.
//!
//! Usage:
//!   ff-trainer train --data training_data.txt --topology 3,10,20,16 --output net.txt
//!   ff-trainer query --network net.txt --labels colors.txt

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ff_trainer::{persistence, Dataset, Network, NetworkOptions, Trainer, TrainingConfig, TrainingMode};
use ndarray::Array1;
use rand::{rngs::StdRng, SeedableRng};

#[derive(Parser)]
#[command(name = "ff-trainer", about = "Feed-forward network trainer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    FullBatch,
    Stochastic,
}

#[derive(Subcommand)]
enum Command {
    /// Train a new network on a dataset file
    Train {
        /// Whitespace-separated records: inputs followed by one-hot targets
        #[arg(long)]
        data: PathBuf,
        /// Layer widths, input first
        #[arg(long, value_delimiter = ',', default_value = "3,10,20,16")]
        topology: Vec<usize>,
        /// JSON training configuration; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON network options (activation, output delta, bias init)
        #[arg(long)]
        network_options: Option<PathBuf>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        learning_rate: Option<f64>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        #[arg(long)]
        parallel: bool,
        /// Read at most this many records
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "network.txt")]
        output: PathBuf,
    },
    /// Run inputs through a saved network
    Query {
        #[arg(long)]
        network: PathBuf,
        /// One class name per line
        #[arg(long)]
        labels: Option<PathBuf>,
        /// JSON network options the network was trained with
        #[arg(long)]
        network_options: Option<PathBuf>,
        /// Input vector; without it, one vector is read per stdin line
        #[arg(long)]
        input: Option<String>,
    },
}

fn read_options(path: Option<&PathBuf>) -> Result<NetworkOptions> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            Ok(serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?)
        }
        None => Ok(NetworkOptions::default()),
    }
}

fn parse_vector(line: &str) -> Result<Array1<f64>> {
    let values = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().with_context(|| format!("invalid number {:?}", s)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Array1::from(values))
}

fn answer(network: &mut Network, labels: &[String], line: &str) -> Result<()> {
    let input = parse_vector(line)?;
    let prediction = network.predict(&input.view())?;
    println!("output: {}", prediction.output);
    match labels.get(prediction.class) {
        Some(label) => println!("index of the largest value: {} ({})", prediction.class, label),
        None => println!("index of the largest value: {}", prediction.class),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            data,
            topology,
            config,
            network_options,
            epochs,
            learning_rate,
            batch_size,
            mode,
            parallel,
            limit,
            seed,
            output,
        } => {
            if topology.len() < 2 {
                bail!("topology needs at least an input and an output width");
            }
            let mut config = match config {
                Some(path) => TrainingConfig::from_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => TrainingConfig::default(),
            };
            if let Some(epochs) = epochs {
                config.epochs = epochs;
            }
            if let Some(lr) = learning_rate {
                config.learning_rate = lr;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(mode) = mode {
                config.mode = match mode {
                    Mode::FullBatch => TrainingMode::FullBatch,
                    Mode::Stochastic => TrainingMode::Stochastic,
                };
            }
            config.parallel |= parallel;

            let options = read_options(network_options.as_ref())?;
            let dataset = Dataset::load(&data, topology[0], topology[topology.len() - 1], limit)
                .with_context(|| format!("loading dataset {}", data.display()))?;

            let mut rng = StdRng::seed_from_u64(seed);
            let mut network = Network::with_options(&topology, &options, &mut rng)?;
            println!("{}", network);

            let mut trainer = Trainer::new(config);
            let report = trainer.train(&mut network, &dataset, &mut rng)?;
            if let Some(last) = report.last() {
                println!(
                    "final avg loss: {:.6}  success rate: {:.4}  learning rate: {:.6}",
                    last.loss, last.accuracy, report.final_learning_rate
                );
            }
            persistence::save(&network, &output)?;
        }
        Command::Query {
            network,
            labels,
            network_options,
            input,
        } => {
            let options = read_options(network_options.as_ref())?;
            let mut net = persistence::load(&network, &options)
                .with_context(|| format!("loading network {}", network.display()))?;
            let labels: Vec<String> = match labels {
                Some(path) => fs::read_to_string(&path)
                    .with_context(|| format!("reading labels {}", path.display()))?
                    .lines()
                    .map(str::to_owned)
                    .collect(),
                None => Vec::new(),
            };

            if let Some(line) = input {
                return answer(&mut net, &labels, &line);
            }
            let stdin = io::stdin();
            print!("Enter {} numbers: ", net.input_width());
            io::stdout().flush()?;
            for line in stdin.lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = answer(&mut net, &labels, &line) {
                    eprintln!("error: {:#}", e);
                }
                print!("Enter {} numbers: ", net.input_width());
                io::stdout().flush()?;
            }
        }
    }
    Ok(())
}
