use crate::candle_aux_layers::{stack_linear, StackLayers};
use candle_core::{bail, Result, Tensor};
use candle_nn::{Activation, Module, VarBuilder};

/// Decoder mapping the concatenated hierarchy samples back to per-pixel
/// reconstruction logits. Stateless given fixed weights; the loss (or the
/// generation path) applies the sigmoid link.
pub struct BernoulliDecoder {
    n_features: usize,
    dim_latent: usize,
    fc: StackLayers,
}

impl BernoulliDecoder {
    /// Parameters are registered as `fc.{j}.{weight,bias}`.
    pub fn new(
        dim_latent: usize,
        n_features: usize,
        n_det_units: usize,
        n_det_layers: usize,
        activation: Activation,
        vs: VarBuilder,
    ) -> Result<Self> {
        if dim_latent == 0 || n_features == 0 {
            bail!(
                "invalid decoder widths: dim_latent={}, n_features={}",
                dim_latent,
                n_features
            );
        }

        let mut dims = vec![dim_latent];
        dims.extend(std::iter::repeat(n_det_units).take(n_det_layers));
        dims.push(n_features);
        let fc = stack_linear(&dims, activation, None, vs)?;

        Ok(Self {
            n_features,
            dim_latent,
            fc,
        })
    }

    /// Concatenated level samples in, reconstruction logits out.
    pub fn forward(&self, z_nk: &Tensor) -> Result<Tensor> {
        if z_nk.dim(z_nk.rank() - 1)? != self.dim_latent {
            bail!(
                "decoder expected latent width {}, got {}",
                self.dim_latent,
                z_nk.dim(z_nk.rank() - 1)?
            );
        }
        self.fc.forward(z_nk)
    }

    pub fn dim_obs(&self) -> usize {
        self.n_features
    }

    pub fn dim_latent(&self) -> usize {
        self.dim_latent
    }
}
