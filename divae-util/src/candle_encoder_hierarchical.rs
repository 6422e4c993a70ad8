use crate::candle_aux_layers::{stack_linear, StackLayers};
use crate::candle_distributions::FactorialBernoulli;
use crate::candle_model_traits::LevelPosterior;
use crate::candle_noise::NoiseSource;
use candle_core::{bail, Result, Tensor};
use candle_nn::{Activation, Module, VarBuilder};

/// Hierarchical stochastic encoder.
///
/// Level 0 sees the raw input; level `i > 0` sees the input concatenated
/// with the samples of all previous levels, so its first layer is
/// `n_features + i * n_latent_units` wide. All levels share the same
/// topology with independently owned weights.
pub struct HierarchicalEncoder {
    n_features: usize,
    n_latent_units: usize,
    temperature: f64,
    levels: Vec<StackLayers>,
    noise: NoiseSource,
}

impl HierarchicalEncoder {
    /// Will create one conditional sub-network per hierarchy level, with
    /// parameters registered as `level.{i}.fc.{j}.{weight,bias}`.
    ///
    /// # Arguments
    /// * `n_features` - input width `d`
    /// * `n_levels` - number of hierarchy levels
    /// * `n_latent_units` - latent units per level
    /// * `n_det_units` - width of each deterministic hidden layer
    /// * `n_det_layers` - number of deterministic hidden layers per level
    /// * `activation` - nonlinearity for all but the last (latent) layer
    /// * `temperature` - concrete-relaxation temperature for training draws
    /// * `noise` - sampling noise source
    /// * `vs` - variable builder
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n_features: usize,
        n_levels: usize,
        n_latent_units: usize,
        n_det_units: usize,
        n_det_layers: usize,
        activation: Activation,
        temperature: f64,
        noise: NoiseSource,
        vs: VarBuilder,
    ) -> Result<Self> {
        if n_levels == 0 {
            bail!("hierarchical encoder needs at least one level");
        }
        if n_features == 0 || n_latent_units == 0 {
            bail!(
                "invalid encoder widths: n_features={}, n_latent_units={}",
                n_features,
                n_latent_units
            );
        }

        let mut levels = Vec::with_capacity(n_levels);
        for level in 0..n_levels {
            let mut dims = vec![n_features + level * n_latent_units];
            dims.extend(std::iter::repeat(n_det_units).take(n_det_layers));
            dims.push(n_latent_units);
            levels.push(stack_linear(
                &dims,
                activation,
                None,
                vs.pp(format!("level.{}", level)),
            )?);
        }

        Ok(Self {
            n_features,
            n_latent_units,
            temperature,
            levels,
            noise,
        })
    }

    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn dim_obs(&self) -> usize {
        self.n_features
    }

    /// Width of the concatenated sample vector across all levels.
    pub fn dim_latent(&self) -> usize {
        self.levels.len() * self.n_latent_units
    }

    /// Produce one (distribution, sample) pair per hierarchy level, level
    /// `i` conditioned on the input and the samples of levels `< i`.
    pub fn forward_t(&self, x_nd: &Tensor, train: bool) -> Result<Vec<LevelPosterior>> {
        let (_n, d) = x_nd.dims2()?;
        if d != self.n_features {
            bail!("encoder expected input width {}, got {}", self.n_features, d);
        }

        let mut posterior = Vec::with_capacity(self.levels.len());
        let mut h_nd = x_nd.clone();
        for (level, subnetwork) in self.levels.iter().enumerate() {
            let expected = self.n_features + level * self.n_latent_units;
            if h_nd.dim(1)? != expected {
                bail!(
                    "hierarchy level {} expected input width {}, got {}",
                    level,
                    expected,
                    h_nd.dim(1)?
                );
            }
            let logits_nk = subnetwork.forward(&h_nd)?;
            let distribution = FactorialBernoulli::new(logits_nk);
            let sample = distribution.sample(&self.noise, self.temperature, train)?;
            h_nd = Tensor::cat(&[&h_nd, &sample], 1)?;
            posterior.push(LevelPosterior {
                distribution,
                sample,
            });
        }
        Ok(posterior)
    }
}
