use crate::candle_distributions::FactorialBernoulli;
use candle_core::{Result, Tensor};

/// One hierarchy level of the approximate posterior: the factorized
/// distribution and the sample drawn from it.
pub struct LevelPosterior {
    pub distribution: FactorialBernoulli,
    pub sample: Tensor,
}

/// Latent summary attached to a forward pass, tagged by model family.
pub enum LatentState {
    /// Plain autoencoder code.
    Deterministic(Tensor),
    /// Single-level Gaussian posterior (VAE).
    Gaussian {
        mean: Tensor,
        lnvar: Tensor,
        sample: Tensor,
    },
    /// Hierarchical discrete posterior (DiVAE), one entry per level.
    Hierarchical(Vec<LevelPosterior>),
}

pub struct ModelOutput {
    /// Reconstruction batch (n x d): probabilities for AE/VAE, raw logits for
    /// DiVAE (its loss applies the link function itself).
    pub recon: Tensor,
    pub latent: LatentState,
}

/// Common capability set of the model family.
pub trait GenerativeModelT {
    /// Run the full encode/sample/decode pass.
    ///
    /// # Arguments
    /// * `x_nd` - input data (n x d)
    /// * `train` - training mode; switches stochastic sampling behavior
    fn forward_t(&self, x_nd: &Tensor, train: bool) -> Result<ModelOutput>;

    /// Batch loss: mean negative ELBO (or plain reconstruction error) plus
    /// any training-only regularizer.
    fn loss(&self, x_nd: &Tensor, output: &ModelOutput, train: bool) -> Result<Tensor>;

    /// Ancestral sampling from the model; returns (n x d) probabilities.
    /// The encoder is not involved.
    fn generate_samples(&self, n_samples: usize) -> Result<Tensor>;

    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}

/// Energy-based prior over one level of latent units.
pub trait PriorModuleT {
    /// Draw `n` visible-unit configurations from the modeled distribution.
    /// The returned batch carries no gradient.
    fn sample(&self, n: usize) -> Result<Tensor>;

    /// Per-sample negative log-likelihood of visible configurations, up to
    /// the partition-function constant.
    fn cross_entropy(&self, v_nk: &Tensor) -> Result<Tensor>;

    fn dim_visible(&self) -> usize;
}
