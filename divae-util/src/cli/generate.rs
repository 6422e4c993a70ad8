use anyhow::Result;
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use clap::Args;
use log::info;
use std::path::PathBuf;

use super::{build_model, io, ModelArgs};
use crate::candle_model_traits::GenerativeModelT;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// trained parameters (safetensors) from the `train` subcommand; the
    /// architecture flags must match the training run
    #[arg(long)]
    pub params: PathBuf,

    #[arg(long, default_value_t = 100)]
    pub n_samples: usize,

    /// output TSV of per-pixel probabilities, one sample per row
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &GenerateArgs) -> Result<()> {
    let device = Device::Cpu;

    let mut variables = VarMap::new();
    let vs = VarBuilder::from_varmap(&variables, DType::F32, &device);
    let model = build_model(&args.model, &variables, vs)?;
    variables.load(&args.params)?;

    let samples = model.generate_samples(args.n_samples)?;
    io::write_tsv(&samples, &args.out)?;
    info!(
        "wrote {} samples of width {} to {}",
        args.n_samples,
        model.dim_obs(),
        args.out.display()
    );
    Ok(())
}
