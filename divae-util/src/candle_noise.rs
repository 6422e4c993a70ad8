use std::cell::RefCell;

use candle_core::{DType, Result, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Explicit, seedable source of sampling noise.
///
/// Every stochastic draw in the model family (posterior sampling,
/// reparameterization, Gibbs chains) goes through one of these, handed in at
/// construction time, so a run is reproducible from its seed alone. The
/// forward pipeline is single-threaded, hence the `RefCell`.
pub struct NoiseSource {
    rng: RefCell<StdRng>,
}

impl NoiseSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Uniform draws on [0, 1) with the shape and device of `like`.
    pub fn uniform_like(&self, like: &Tensor) -> Result<Tensor> {
        let mut rng = self.rng.borrow_mut();
        let draws: Vec<f32> = (0..like.elem_count()).map(|_| rng.random::<f32>()).collect();
        Tensor::from_vec(draws, like.dims(), like.device())
    }

    /// Standard normal draws with the shape and device of `like`.
    pub fn normal_like(&self, like: &Tensor) -> Result<Tensor> {
        let mut rng = self.rng.borrow_mut();
        let draws: Vec<f32> = (0..like.elem_count())
            .map(|_| rng.sample(StandardNormal))
            .collect();
        Tensor::from_vec(draws, like.dims(), like.device())
    }

    /// Standard logistic draws `log(u) - log(1 - u)`; the additive noise of
    /// the concrete (Gumbel-sigmoid) relaxation of a Bernoulli variable.
    pub fn logistic_like(&self, like: &Tensor) -> Result<Tensor> {
        let eps = 1e-7f32;
        let mut rng = self.rng.borrow_mut();
        let draws: Vec<f32> = (0..like.elem_count())
            .map(|_| {
                let u = rng.random::<f32>();
                (u + eps).ln() - (1.0 - u + eps).ln()
            })
            .collect();
        Tensor::from_vec(draws, like.dims(), like.device())
    }

    /// Hard Bernoulli draws: 1 where `u < probs`, 0 elsewhere.
    pub fn bernoulli(&self, probs: &Tensor) -> Result<Tensor> {
        let u = self.uniform_like(probs)?;
        u.lt(probs)?.to_dtype(DType::F32)
    }
}
