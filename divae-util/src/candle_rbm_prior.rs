use crate::candle_loss_functions::softplus;
use crate::candle_model_traits::PriorModuleT;
use crate::candle_noise::NoiseSource;
use candle_core::{bail, Result, Tensor};
use candle_nn::{ops, VarBuilder};

/// Restricted Boltzmann Machine prior over one level of latent units.
///
/// Visible units live in the latent space; hidden units are auxiliary. The
/// parameters are registered through the variable builder so the external
/// optimizer updates them together with the encoder and decoder.
pub struct RbmPrior {
    n_visible: usize,
    n_hidden: usize,
    n_gibbs_steps: usize,
    weight_vh: Tensor,
    bias_v: Tensor,
    bias_h: Tensor,
    noise: NoiseSource,
}

impl RbmPrior {
    /// Will create a prior with these variables:
    ///
    /// * `weight` - visible x hidden coupling matrix
    /// * `bias.v` - visible bias (1 x visible)
    /// * `bias.h` - hidden bias (1 x hidden)
    pub fn new(
        n_visible: usize,
        n_hidden: usize,
        n_gibbs_steps: usize,
        noise: NoiseSource,
        vs: VarBuilder,
    ) -> Result<Self> {
        if n_visible == 0 || n_hidden == 0 {
            bail!(
                "rbm needs non-empty layers: n_visible={}, n_hidden={}",
                n_visible,
                n_hidden
            );
        }
        if n_gibbs_steps == 0 {
            bail!("rbm sampler needs at least one gibbs step");
        }

        let init_ws = candle_nn::init::DEFAULT_KAIMING_NORMAL;
        let weight_vh = vs.get_with_hints((n_visible, n_hidden), "weight", init_ws)?;
        let bias_v = vs.get_with_hints((1, n_visible), "bias.v", candle_nn::init::ZERO)?;
        let bias_h = vs.get_with_hints((1, n_hidden), "bias.h", candle_nn::init::ZERO)?;

        Ok(Self {
            n_visible,
            n_hidden,
            n_gibbs_steps,
            weight_vh,
            bias_v,
            bias_h,
            noise,
        })
    }

    pub fn dim_hidden(&self) -> usize {
        self.n_hidden
    }

    fn hidden_given_visible(&self, v_nk: &Tensor) -> Result<Tensor> {
        ops::sigmoid(&v_nk.matmul(&self.weight_vh)?.broadcast_add(&self.bias_h)?)
    }

    fn visible_given_hidden(&self, h_nj: &Tensor) -> Result<Tensor> {
        ops::sigmoid(&h_nj.matmul(&self.weight_vh.t()?)?.broadcast_add(&self.bias_v)?)
    }

    /// Free energy of visible configurations, one value per row:
    ///
    /// `F(v) = -v . b_v - sum_j softplus(v W + b_h)_j`
    pub fn free_energy(&self, v_nk: &Tensor) -> Result<Tensor> {
        let visible_n = v_nk.broadcast_mul(&self.bias_v)?.sum(1)?;
        let act_nj = v_nk.matmul(&self.weight_vh)?.broadcast_add(&self.bias_h)?;
        let hidden_n = softplus(&act_nj)?.sum(1)?;
        (visible_n + hidden_n)?.neg()
    }
}

impl PriorModuleT for RbmPrior {
    /// Block Gibbs sampling: Bernoulli(0.5) initialization, then alternating
    /// hidden/visible passes. The chain is detached; sampler output never
    /// carries gradient.
    fn sample(&self, n: usize) -> Result<Tensor> {
        if n == 0 {
            bail!("cannot draw an empty prior sample");
        }
        let device = self.weight_vh.device();
        let half_nk = Tensor::full(0.5f32, (n, self.n_visible), device)?;
        let mut v_nk = self.noise.bernoulli(&half_nk)?;
        for _ in 0..self.n_gibbs_steps {
            let h_nj = self.noise.bernoulli(&self.hidden_given_visible(&v_nk)?)?;
            v_nk = self.noise.bernoulli(&self.visible_given_hidden(&h_nj)?)?;
        }
        Ok(v_nk.detach())
    }

    /// Negative log-likelihood of visible configurations up to the
    /// partition-function constant, i.e. the free energy.
    fn cross_entropy(&self, v_nk: &Tensor) -> Result<Tensor> {
        let width = v_nk.dim(v_nk.rank() - 1)?;
        if width != self.n_visible {
            bail!(
                "prior expected visible width {}, got {}",
                self.n_visible,
                width
            );
        }
        self.free_energy(v_nk)
    }

    fn dim_visible(&self) -> usize {
        self.n_visible
    }
}
