use anyhow::Result;
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use clap::Args;
use log::info;
use std::path::PathBuf;

use super::{build_model, io, ModelArgs};
use crate::candle_data_loader::InMemoryData;
use crate::candle_inference::TrainConfig;
use crate::candle_trainer::Trainer;

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// input matrix (TSV or CSV, optionally gzipped), one row per example;
    /// a synthetic bar-pattern set is used when omitted
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// rows of synthetic data when no input file is given
    #[arg(long, default_value_t = 1000)]
    pub n_synthetic: usize,

    /// where to save trained parameters (safetensors)
    #[arg(long)]
    pub out: PathBuf,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f32,

    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

pub fn run(args: &TrainArgs) -> Result<()> {
    let device = Device::Cpu;

    let x = match &args.data {
        Some(path) => io::read_dense_matrix(path)?,
        None => io::synthetic_bars(args.n_synthetic, args.model.n_features, args.model.seed),
    };
    if x.ncols() != args.model.n_features {
        anyhow::bail!(
            "data width {} does not match --n-features {}",
            x.ncols(),
            args.model.n_features
        );
    }
    info!("loaded {} x {} training matrix", x.nrows(), x.ncols());

    let mut data = InMemoryData::new(&x)?;

    let variables = VarMap::new();
    let vs = VarBuilder::from_varmap(&variables, DType::F32, &device);
    let model = build_model(&args.model, &variables, vs)?;

    let train_config = TrainConfig {
        learning_rate: args.learning_rate,
        batch_size: args.batch_size,
        num_epochs: args.epochs,
        device,
        verbose: args.verbose,
        show_progress: true,
    };

    let mut trainer = Trainer::new(model.as_ref(), &variables);
    let loss_trace = trainer.train(&mut data, &train_config)?;

    if let Some(last) = loss_trace.last() {
        info!("final loss: {}", last);
    }

    variables.save(&args.out)?;
    info!("saved parameters to {}", args.out.display());
    Ok(())
}
