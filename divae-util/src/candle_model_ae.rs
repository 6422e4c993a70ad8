use crate::candle_aux_layers::{stack_linear, StackLayers};
use crate::candle_loss_functions::bernoulli_cross_entropy;
use crate::candle_model_traits::{GenerativeModelT, LatentState, ModelOutput};
use candle_core::{bail, Result, Tensor};
use candle_nn::{Activation, Module, VarBuilder};

/// Deterministic autoencoder baseline: encode, decode, summed Bernoulli
/// cross-entropy. No stochasticity, no KL term.
pub struct Ae {
    n_features: usize,
    n_latent: usize,
    encoder: StackLayers,
    decoder: StackLayers,
}

impl Ae {
    /// Encoder `d -> hidden -> k` (activation on every layer), decoder
    /// `k -> hidden -> d` with a sigmoid output.
    pub fn new(
        n_features: usize,
        n_hidden: usize,
        n_latent: usize,
        activation: Activation,
        vs: VarBuilder,
    ) -> Result<Self> {
        if n_features == 0 || n_latent == 0 {
            bail!(
                "invalid autoencoder widths: n_features={}, n_latent={}",
                n_features,
                n_latent
            );
        }
        let encoder = stack_linear(
            &[n_features, n_hidden, n_latent],
            activation,
            Some(activation),
            vs.pp("enc"),
        )?;
        let decoder = stack_linear(
            &[n_latent, n_hidden, n_features],
            activation,
            Some(Activation::Sigmoid),
            vs.pp("dec"),
        )?;
        Ok(Self {
            n_features,
            n_latent,
            encoder,
            decoder,
        })
    }

    pub fn encode(&self, x_nd: &Tensor) -> Result<Tensor> {
        self.encoder.forward(x_nd)
    }

    pub fn decode(&self, z_nk: &Tensor) -> Result<Tensor> {
        self.decoder.forward(z_nk)
    }
}

impl GenerativeModelT for Ae {
    fn forward_t(&self, x_nd: &Tensor, _train: bool) -> Result<ModelOutput> {
        let (_n, d) = x_nd.dims2()?;
        if d != self.n_features {
            bail!("autoencoder expected input width {}, got {}", self.n_features, d);
        }
        let z_nk = self.encode(x_nd)?;
        let recon = self.decode(&z_nk)?;
        Ok(ModelOutput {
            recon,
            latent: LatentState::Deterministic(z_nk),
        })
    }

    fn loss(&self, x_nd: &Tensor, output: &ModelOutput, _train: bool) -> Result<Tensor> {
        bernoulli_cross_entropy(&output.recon, x_nd)?.mean_all()
    }

    fn generate_samples(&self, _n_samples: usize) -> Result<Tensor> {
        bail!("the plain autoencoder has no prior to sample from")
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}
