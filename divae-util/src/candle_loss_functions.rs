use candle_core::{bail, Result, Tensor, Var};

/// Numerically stable softplus: `log(1 + exp(x)) = max(x,0) + log(1 + exp(-|x|))`.
pub fn softplus(x: &Tensor) -> Result<Tensor> {
    x.relu()? + (x.abs()?.neg()?.exp()? + 1.0)?.log()?
}

/// Elementwise logistic loss of `logits` against `labels` in [0, 1]:
///
/// `max(z, 0) - z * x + log(1 + exp(-|z|))`
///
/// For a label drawn from the factorized Bernoulli this is the per-unit
/// negative log-mass, so summing over the unit dimension gives a per-sample
/// cross-entropy.
pub fn sigmoid_cross_entropy_with_logits(logits: &Tensor, labels: &Tensor) -> Result<Tensor> {
    (logits.relu()? - logits.mul(labels)?)? + (logits.abs()?.neg()?.exp()? + 1.0)?.log()?
}

/// Per-sample summed Bernoulli cross-entropy of probabilities against labels,
///
/// `-sum_d [ x * log(p) + (1 - x) * log(1 - p) ]`
///
/// * `probs` - reconstruction probabilities (already through the sigmoid)
/// * `labels` - observed data in [0, 1]
pub fn bernoulli_cross_entropy(probs: &Tensor, labels: &Tensor) -> Result<Tensor> {
    let eps = 1e-7;
    let p = probs.clamp(eps, 1.0 - eps)?;
    let llik = (labels.mul(&p.log()?)? + labels.affine(-1.0, 1.0)?.mul(&p.affine(-1.0, 1.0)?.log()?)?)?;
    llik.neg()?.sum(llik.rank() - 1)
}

/// KL divergence loss between a factorized Gaussian and the standard normal
///
/// `0.5 * sum(exp(lnvar) - 1 + mean^2 - lnvar)`
///
/// * `z_mean` - mean of Gaussian distribution
/// * `z_lnvar` - log variance of Gaussian distribution
pub fn gaussian_kl_loss(z_mean: &Tensor, z_lnvar: &Tensor) -> Result<Tensor> {
    let z_var = z_lnvar.exp()?;
    (z_var - 1. + z_mean.powf(2.)? - z_lnvar)?.sum(z_mean.rank() - 1)? * 0.5
}

/// Squared L2 norm accumulated over a set of trainable variables; the
/// weight-decay penalty is this scaled by the decay coefficient.
pub fn weight_norm_loss(vars: &[Var]) -> Result<Tensor> {
    let mut total: Option<Tensor> = None;
    for v in vars {
        let sq = v.as_tensor().sqr()?.sum_all()?;
        total = Some(match total {
            Some(acc) => (acc + sq)?,
            None => sq,
        });
    }
    match total {
        Some(t) => Ok(t),
        None => bail!("no trainable variables to regularize"),
    }
}
