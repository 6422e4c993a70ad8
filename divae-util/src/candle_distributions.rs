use crate::candle_loss_functions::sigmoid_cross_entropy_with_logits;
use crate::candle_noise::NoiseSource;
use candle_core::{Result, Tensor};
use candle_nn::ops;

/// Factorized Bernoulli posterior over one hierarchy level, parameterized by
/// per-unit logits.
pub struct FactorialBernoulli {
    logits: Tensor,
}

impl FactorialBernoulli {
    pub fn new(logits: Tensor) -> Self {
        Self { logits }
    }

    pub fn logits(&self) -> &Tensor {
        &self.logits
    }

    pub fn probs(&self) -> Result<Tensor> {
        ops::sigmoid(&self.logits)
    }

    /// Draw one sample per unit.
    ///
    /// In training mode this is the concrete relaxation
    /// `sigmoid((logits + logistic) / temperature)`, so gradients flow
    /// through the sample; in evaluation mode a hard draw in {0, 1}.
    pub fn sample(&self, noise: &NoiseSource, temperature: f64, train: bool) -> Result<Tensor> {
        if train {
            let logistic = noise.logistic_like(&self.logits)?;
            ops::sigmoid(&((&self.logits + logistic)? / temperature)?)
        } else {
            noise.bernoulli(&self.probs()?)
        }
    }

    /// Per-unit entropy estimate at the drawn sample, `-log q(z)` elementwise.
    /// Summing over the unit dimension gives the per-sample entropy term of
    /// the KL computation.
    pub fn entropy(&self, sample: &Tensor) -> Result<Tensor> {
        sigmoid_cross_entropy_with_logits(&self.logits, sample)
    }

    pub fn dim_units(&self) -> usize {
        self.logits.dims().last().copied().unwrap_or(0)
    }
}
