pub mod generate;
pub mod io;
pub mod train;

use anyhow::Result;
use candle_nn::{Activation, VarBuilder, VarMap};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::candle_model_ae::Ae;
use crate::candle_model_divae::{DiVae, DiVaeConfig};
use crate::candle_model_traits::GenerativeModelT;
use crate::candle_model_vae::Vae;
use crate::candle_noise::NoiseSource;
use crate::candle_rbm_prior::RbmPrior;

pub use generate::GenerateArgs;
pub use train::TrainArgs;

#[derive(Parser)]
#[command(name = "divae-util")]
#[command(about = "Autoencoder-family generative models with an RBM prior")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on dense image vectors
    Train(TrainArgs),
    /// Draw samples from a trained model
    Generate(GenerateArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModelType {
    Ae,
    Vae,
    Divae,
}

/// Model architecture arguments shared by `train` and `generate`; both sides
/// must agree on these for saved parameters to load back.
#[derive(Args, Debug)]
pub struct ModelArgs {
    #[arg(long, value_enum, default_value = "divae")]
    pub model: ModelType,

    /// input width `d` (e.g. 784 for flattened 28x28 images)
    #[arg(long, default_value_t = 784)]
    pub n_features: usize,

    /// hierarchy levels (divae)
    #[arg(long, default_value_t = 4)]
    pub n_levels: usize,

    /// latent units per hierarchy level (divae)
    #[arg(long, default_value_t = 100)]
    pub n_latent_units: usize,

    /// deterministic units per hidden layer (divae)
    #[arg(long, default_value_t = 200)]
    pub n_det_units: usize,

    /// deterministic hidden layers per sub-network (divae)
    #[arg(long, default_value_t = 2)]
    pub n_det_layers: usize,

    /// auxiliary hidden units of the RBM prior (divae)
    #[arg(long, default_value_t = 256)]
    pub n_prior_hidden: usize,

    /// block Gibbs steps per prior draw (divae)
    #[arg(long, default_value_t = 10)]
    pub n_gibbs_steps: usize,

    /// concrete-relaxation temperature (divae)
    #[arg(long, default_value_t = 0.5)]
    pub temperature: f64,

    /// weight-decay coefficient (divae)
    #[arg(long, default_value_t = 1e-4)]
    pub weight_decay: f64,

    /// latent code width (ae/vae)
    #[arg(long, default_value_t = 32)]
    pub latent_dim: usize,

    /// hidden layer width (ae/vae)
    #[arg(long, default_value_t = 128)]
    pub hidden_dim: usize,

    /// random seed for all stochastic sampling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Build the requested model with parameters registered in `variables`.
pub fn build_model(
    args: &ModelArgs,
    variables: &VarMap,
    vs: VarBuilder,
) -> Result<Box<dyn GenerativeModelT>> {
    let activation = Activation::Relu;
    let model: Box<dyn GenerativeModelT> = match args.model {
        ModelType::Ae => Box::new(Ae::new(
            args.n_features,
            args.hidden_dim,
            args.latent_dim,
            activation,
            vs.pp("ae"),
        )?),
        ModelType::Vae => Box::new(Vae::new(
            args.n_features,
            args.hidden_dim,
            args.latent_dim,
            activation,
            NoiseSource::seeded(args.seed),
            vs.pp("vae"),
        )?),
        ModelType::Divae => {
            let prior = RbmPrior::new(
                args.n_latent_units,
                args.n_prior_hidden,
                args.n_gibbs_steps,
                NoiseSource::seeded(args.seed.wrapping_add(1)),
                vs.pp("prior"),
            )?;
            let config = DiVaeConfig {
                n_features: args.n_features,
                n_levels: args.n_levels,
                n_latent_units: args.n_latent_units,
                n_det_units: args.n_det_units,
                n_det_layers: args.n_det_layers,
                activation,
                temperature: args.temperature,
                weight_decay: args.weight_decay,
            };
            Box::new(DiVae::new(
                &config,
                prior,
                NoiseSource::seeded(args.seed),
                variables.clone(),
                vs.pp("divae"),
            )?)
        }
    };
    Ok(model)
}
