use crate::candle_aux_layers::{stack_linear, StackLayers};
use crate::candle_loss_functions::{bernoulli_cross_entropy, gaussian_kl_loss};
use crate::candle_model_traits::{GenerativeModelT, LatentState, ModelOutput};
use crate::candle_noise::NoiseSource;
use candle_core::{bail, DType, Device, Result, Tensor};
use candle_nn::{Activation, Linear, Module, VarBuilder};

/// Single-level Gaussian VAE: shared trunk, `mean`/`lnvar` heads,
/// reparameterized sampling, closed-form KL to the standard normal.
pub struct Vae {
    n_features: usize,
    n_latent: usize,
    trunk: StackLayers,
    z_mean: Linear,
    z_lnvar: Linear,
    decoder: StackLayers,
    noise: NoiseSource,
    device: Device,
}

impl Vae {
    /// Will create a VAE with these variables:
    ///
    /// * `enc.fc.{}.{weight,bias}` for the shared trunk
    /// * `z.mean.{weight,bias}` and `z.lnvar.{weight,bias}` heads
    /// * `dec.fc.{}.{weight,bias}` with a sigmoid output layer
    pub fn new(
        n_features: usize,
        n_hidden: usize,
        n_latent: usize,
        activation: Activation,
        noise: NoiseSource,
        vs: VarBuilder,
    ) -> Result<Self> {
        if n_features == 0 || n_latent == 0 {
            bail!(
                "invalid vae widths: n_features={}, n_latent={}",
                n_features,
                n_latent
            );
        }
        let trunk = stack_linear(
            &[n_features, n_hidden],
            activation,
            Some(activation),
            vs.pp("enc"),
        )?;
        let z_mean = candle_nn::linear(n_hidden, n_latent, vs.pp("z.mean"))?;
        let z_lnvar = candle_nn::linear(n_hidden, n_latent, vs.pp("z.lnvar"))?;
        let decoder = stack_linear(
            &[n_latent, n_hidden, n_features],
            activation,
            Some(Activation::Sigmoid),
            vs.pp("dec"),
        )?;
        let device = vs.device().clone();
        Ok(Self {
            n_features,
            n_latent,
            trunk,
            z_mean,
            z_lnvar,
            decoder,
            noise,
            device,
        })
    }

    /// `z = mean + exp(0.5 * lnvar) * eps` with `eps ~ N(0, I)`; the
    /// posterior mean in evaluation mode.
    pub fn reparameterize(&self, z_mean: &Tensor, z_lnvar: &Tensor, train: bool) -> Result<Tensor> {
        if train {
            let eps = self.noise.normal_like(z_mean)?;
            z_mean + (z_lnvar * 0.5)?.exp()?.mul(&eps)?
        } else {
            Ok(z_mean.clone())
        }
    }

    pub fn decode(&self, z_nk: &Tensor) -> Result<Tensor> {
        self.decoder.forward(z_nk)
    }
}

impl GenerativeModelT for Vae {
    fn forward_t(&self, x_nd: &Tensor, train: bool) -> Result<ModelOutput> {
        let (_n, d) = x_nd.dims2()?;
        if d != self.n_features {
            bail!("vae expected input width {}, got {}", self.n_features, d);
        }
        let h_nl = self.trunk.forward(x_nd)?;
        let mean_nk = self.z_mean.forward(&h_nl)?;
        let lnvar_nk = self.z_lnvar.forward(&h_nl)?;
        let z_nk = self.reparameterize(&mean_nk, &lnvar_nk, train)?;
        let recon = self.decode(&z_nk)?;
        Ok(ModelOutput {
            recon,
            latent: LatentState::Gaussian {
                mean: mean_nk,
                lnvar: lnvar_nk,
                sample: z_nk,
            },
        })
    }

    fn loss(&self, x_nd: &Tensor, output: &ModelOutput, _train: bool) -> Result<Tensor> {
        let (mean_nk, lnvar_nk) = match &output.latent {
            LatentState::Gaussian { mean, lnvar, .. } => (mean, lnvar),
            _ => bail!("vae loss needs a gaussian latent state"),
        };
        let recon_loss_n = bernoulli_cross_entropy(&output.recon, x_nd)?;
        let kl_n = gaussian_kl_loss(mean_nk, lnvar_nk)?;
        (recon_loss_n + kl_n)?.mean_all()
    }

    /// Ancestral sampling under the standard normal prior.
    fn generate_samples(&self, n_samples: usize) -> Result<Tensor> {
        if n_samples == 0 {
            bail!("cannot generate an empty batch");
        }
        let shape_nk = Tensor::zeros((n_samples, self.n_latent), DType::F32, &self.device)?;
        let z_nk = self.noise.normal_like(&shape_nk)?;
        self.decode(&z_nk)
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}
