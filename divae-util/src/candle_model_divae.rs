use crate::candle_decoder_bernoulli::BernoulliDecoder;
use crate::candle_encoder_hierarchical::HierarchicalEncoder;
use crate::candle_loss_functions::{sigmoid_cross_entropy_with_logits, weight_norm_loss};
use crate::candle_model_traits::{
    GenerativeModelT, LatentState, LevelPosterior, ModelOutput, PriorModuleT,
};
use crate::candle_noise::NoiseSource;
use candle_core::{bail, Result, Tensor};
use candle_nn::{ops, Activation, VarBuilder, VarMap};

/// Hyperparameters of the discrete hierarchical VAE.
pub struct DiVaeConfig {
    pub n_features: usize,
    pub n_levels: usize,
    pub n_latent_units: usize,
    pub n_det_units: usize,
    pub n_det_layers: usize,
    pub activation: Activation,
    /// Concrete-relaxation temperature for training-mode posterior draws.
    pub temperature: f64,
    pub weight_decay: f64,
}

impl Default for DiVaeConfig {
    fn default() -> Self {
        Self {
            n_features: 784,
            n_levels: 4,
            n_latent_units: 100,
            n_det_units: 200,
            n_det_layers: 2,
            activation: Activation::Relu,
            temperature: 0.5,
            weight_decay: 1e-4,
        }
    }
}

/// Discrete hierarchical VAE with an energy-based prior.
///
/// The prior factorizes across hierarchy levels: the same prior scores each
/// level's sample, and ancestral generation draws one visible configuration
/// per level and concatenates them to the decoder width.
pub struct DiVae<P: PriorModuleT> {
    n_features: usize,
    n_levels: usize,
    n_latent_units: usize,
    weight_decay: f64,
    encoder: HierarchicalEncoder,
    decoder: BernoulliDecoder,
    prior: P,
    variables: VarMap,
}

impl<P: PriorModuleT> DiVae<P> {
    /// The prior is built by the caller (it may be stubbed in tests); its
    /// visible width must match the per-level latent width. `variables` must
    /// be the map the encoder, decoder, and prior were registered in; the
    /// weight-decay term runs over all of it.
    pub fn new(
        config: &DiVaeConfig,
        prior: P,
        noise: NoiseSource,
        variables: VarMap,
        vs: VarBuilder,
    ) -> Result<Self> {
        if prior.dim_visible() != config.n_latent_units {
            bail!(
                "prior visible width {} does not match n_latent_units {}",
                prior.dim_visible(),
                config.n_latent_units
            );
        }
        let encoder = HierarchicalEncoder::new(
            config.n_features,
            config.n_levels,
            config.n_latent_units,
            config.n_det_units,
            config.n_det_layers,
            config.activation,
            config.temperature,
            noise,
            vs.pp("encoder"),
        )?;
        let decoder = BernoulliDecoder::new(
            config.n_levels * config.n_latent_units,
            config.n_features,
            config.n_det_units,
            config.n_det_layers,
            config.activation,
            vs.pp("decoder"),
        )?;
        Ok(Self {
            n_features: config.n_features,
            n_levels: config.n_levels,
            n_latent_units: config.n_latent_units,
            weight_decay: config.weight_decay,
            encoder,
            decoder,
            prior,
            variables,
        })
    }

    pub fn prior(&self) -> &P {
        &self.prior
    }

    pub fn encoder(&self) -> &HierarchicalEncoder {
        &self.encoder
    }

    /// Single-level KL contribution, estimated at the drawn sample:
    /// `cross_entropy(z) - sum_units (-log q(z))`.
    fn level_kl_term(&self, level: &LevelPosterior) -> Result<Tensor> {
        let entropy_n = level.distribution.entropy(&level.sample)?.sum(1)?;
        let cross_entropy_n = self.prior.cross_entropy(&level.sample)?;
        cross_entropy_n - entropy_n
    }

    /// Pathwise KL estimate accumulated over the hierarchy. In training
    /// mode the samples are concrete relaxations, so this term also carries
    /// the gradient with respect to the encoder parameters.
    fn kl_div_posterior_gradient(&self, posterior: &[LevelPosterior]) -> Result<Tensor> {
        let mut kl_n = self.level_kl_term(&posterior[0])?;
        for level in posterior.iter().skip(1) {
            kl_n = (kl_n + self.level_kl_term(level)?)?;
        }
        Ok(kl_n)
    }

    /// Negative-phase correction for the prior parameters: `-F(v)` on
    /// sampler draws, contributed gradient-only (the term's value is zero),
    /// so together with the positive phase inside the pathwise estimate the
    /// prior receives its maximum-likelihood gradient.
    fn kl_div_prior_gradient(&self, n: usize) -> Result<Tensor> {
        let negative_nk = self.prior.sample(n)?;
        let surrogate_n = self.prior.cross_entropy(&negative_nk)?.neg()?;
        &surrogate_n - surrogate_n.detach()
    }

    /// KL divergence between the hierarchical posterior and the prior, one
    /// value per batch sample.
    ///
    /// With a single level, or outside training, the single-sample estimate
    /// `sum_i cross_entropy_i - entropy_reduced` is returned directly (the
    /// mean-field case). With a deeper hierarchy in training mode the same
    /// expression flows through the relaxed samples and the contrastive
    /// surrogate adds the prior-side gradient without disturbing the value.
    pub fn kl_divergence(&self, posterior: &[LevelPosterior], train: bool) -> Result<Tensor> {
        if posterior.is_empty() {
            bail!("kl divergence over an empty posterior");
        }
        let kl_n = self.kl_div_posterior_gradient(posterior)?;
        if posterior.len() > 1 && train {
            let n = posterior[0].sample.dim(0)?;
            kl_n + self.kl_div_prior_gradient(n)?
        } else {
            Ok(kl_n)
        }
    }

    fn weight_decay_loss(&self) -> Result<Tensor> {
        weight_norm_loss(&self.variables.all_vars())? * self.weight_decay
    }
}

impl<P: PriorModuleT> GenerativeModelT for DiVae<P> {
    fn forward_t(&self, x_nd: &Tensor, train: bool) -> Result<ModelOutput> {
        let posterior = self.encoder.forward_t(x_nd, train)?;
        let samples: Vec<&Tensor> = posterior.iter().map(|level| &level.sample).collect();
        let z_cat = Tensor::cat(&samples, 1)?;
        let recon = self.decoder.forward(&z_cat)?;
        Ok(ModelOutput {
            recon,
            latent: LatentState::Hierarchical(posterior),
        })
    }

    /// Mean negative ELBO over the batch. The reconstruction term treats the
    /// decoder output as logits against the input as labels; the KL term is
    /// computed in both modes (a diagnostic in evaluation); the weight-decay
    /// penalty is added in training mode only.
    fn loss(&self, x_nd: &Tensor, output: &ModelOutput, train: bool) -> Result<Tensor> {
        let posterior = match &output.latent {
            LatentState::Hierarchical(posterior) => posterior,
            _ => bail!("divae loss needs a hierarchical latent state"),
        };
        let recon_loss_n = sigmoid_cross_entropy_with_logits(&output.recon, x_nd)?.sum(1)?;
        let kl_n = self.kl_divergence(posterior, train)?;
        let neg_elbo = (recon_loss_n + kl_n)?.mean_all()?;
        if train {
            neg_elbo + self.weight_decay_loss()?
        } else {
            Ok(neg_elbo)
        }
    }

    /// Ancestral sampling: one prior draw per hierarchy level, concatenated,
    /// decoded, and squashed through the sigmoid link.
    fn generate_samples(&self, n_samples: usize) -> Result<Tensor> {
        if n_samples == 0 {
            bail!("cannot generate an empty batch");
        }
        let mut level_samples = Vec::with_capacity(self.n_levels);
        for _ in 0..self.n_levels {
            level_samples.push(self.prior.sample(n_samples)?);
        }
        let refs: Vec<&Tensor> = level_samples.iter().collect();
        let z_cat = Tensor::cat(&refs, 1)?;
        let logits = self.decoder.forward(&z_cat)?;
        ops::sigmoid(&logits)
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.n_levels * self.n_latent_units
    }
}
