use approx::assert_abs_diff_eq;
use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{Activation, VarBuilder, VarMap};
use divae_util::candle_model_divae::{DiVae, DiVaeConfig};
use divae_util::candle_model_traits::{GenerativeModelT, LatentState, PriorModuleT};
use divae_util::candle_noise::NoiseSource;
use divae_util::candle_rbm_prior::RbmPrior;

const D: usize = 12;

/// Deterministic prior: always emits the same visible configuration and
/// scores a sample by the sum of its units.
struct StubPrior {
    v0: Tensor,
}

impl PriorModuleT for StubPrior {
    fn sample(&self, n: usize) -> Result<Tensor> {
        self.v0.broadcast_as((n, self.dim_visible()))?.contiguous()
    }

    fn cross_entropy(&self, v_nk: &Tensor) -> Result<Tensor> {
        v_nk.sum(1)
    }

    fn dim_visible(&self) -> usize {
        self.v0.dims().last().copied().unwrap_or(0)
    }
}

fn config(n_levels: usize, n_latent_units: usize) -> DiVaeConfig {
    DiVaeConfig {
        n_features: D,
        n_levels,
        n_latent_units,
        n_det_units: 8,
        n_det_layers: 1,
        activation: Activation::Relu,
        temperature: 0.5,
        weight_decay: 0.1,
    }
}

fn divae_with_stub(
    n_levels: usize,
    n_latent_units: usize,
    v0: Vec<f32>,
) -> Result<(DiVae<StubPrior>, VarMap)> {
    let variables = VarMap::new();
    let vs = VarBuilder::from_varmap(&variables, DType::F32, &Device::Cpu);
    let prior = StubPrior {
        v0: Tensor::from_vec(v0, (1, n_latent_units), &Device::Cpu)?,
    };
    let model = DiVae::new(
        &config(n_levels, n_latent_units),
        prior,
        NoiseSource::seeded(3),
        variables.clone(),
        vs.pp("divae"),
    )?;
    Ok((model, variables))
}

fn divae_with_rbm(
    n_levels: usize,
    n_latent_units: usize,
) -> Result<(DiVae<RbmPrior>, VarMap)> {
    let variables = VarMap::new();
    let vs = VarBuilder::from_varmap(&variables, DType::F32, &Device::Cpu);
    let prior = RbmPrior::new(
        n_latent_units,
        6,
        5,
        NoiseSource::seeded(17),
        vs.pp("prior"),
    )?;
    let model = DiVae::new(
        &config(n_levels, n_latent_units),
        prior,
        NoiseSource::seeded(3),
        variables.clone(),
        vs.pp("divae"),
    )?;
    Ok((model, variables))
}

fn hierarchical(output: &divae_util::candle_model_traits::ModelOutput) -> &[divae_util::candle_model_traits::LevelPosterior] {
    match &output.latent {
        LatentState::Hierarchical(posterior) => posterior,
        _ => panic!("expected a hierarchical latent state"),
    }
}

#[test]
fn forward_produces_logits_and_one_pair_per_level() -> Result<()> {
    let (model, _) = divae_with_rbm(3, 4)?;
    let x = Tensor::rand(0f32, 1f32, (6, D), &Device::Cpu)?;
    let output = model.forward_t(&x, true)?;
    assert_eq!(output.recon.dims2()?, (6, D));
    let posterior = hierarchical(&output);
    assert_eq!(posterior.len(), 3);
    for level in posterior {
        assert_eq!(level.sample.dims2()?, (6, 4));
    }
    Ok(())
}

#[test]
fn single_level_kl_matches_the_closed_form_reference() -> Result<()> {
    let (model, _) = divae_with_stub(1, 4, vec![1.0, 0.0, 1.0, 0.0])?;
    let x = Tensor::rand(0f32, 1f32, (5, D), &Device::Cpu)?;
    let output = model.forward_t(&x, false)?;
    let posterior = hierarchical(&output);

    let kl = model.kl_divergence(posterior, false)?.to_vec1::<f32>()?;

    // independent reference: cross-entropy (sum of sample units under the
    // stub) minus the entropy estimate -log q(z) summed over units
    let logits: Vec<Vec<f32>> = posterior[0].distribution.logits().to_vec2()?;
    let sample: Vec<Vec<f32>> = posterior[0].sample.to_vec2()?;
    for (i, kl_i) in kl.iter().enumerate() {
        let cross_entropy: f32 = sample[i].iter().sum();
        let entropy: f32 = logits[i]
            .iter()
            .zip(sample[i].iter())
            .map(|(&l, &z)| l.max(0.0) - l * z + (1.0 + (-l.abs()).exp()).ln())
            .sum();
        assert_abs_diff_eq!(*kl_i, cross_entropy - entropy, epsilon = 1e-3);
    }
    Ok(())
}

#[test]
fn hierarchical_training_kl_keeps_the_mean_field_value() -> Result<()> {
    // the prior-side surrogate is gradient-only; the reported value must
    // stay the pathwise estimate
    let (model, _) = divae_with_stub(3, 4, vec![1.0, 0.0, 1.0, 0.0])?;
    let x = Tensor::rand(0f32, 1f32, (5, D), &Device::Cpu)?;
    let output = model.forward_t(&x, true)?;
    let posterior = hierarchical(&output);

    let kl_train = model.kl_divergence(posterior, true)?.to_vec1::<f32>()?;
    let kl_eval = model.kl_divergence(posterior, false)?.to_vec1::<f32>()?;
    for (a, b) in kl_train.iter().zip(kl_eval.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
    }
    Ok(())
}

#[test]
fn generation_has_expected_shape_and_range() -> Result<()> {
    let (model, _) = divae_with_rbm(2, 4)?;
    let samples = model.generate_samples(9)?;
    assert_eq!(samples.dims2()?, (9, D));
    for v in samples.flatten_all()?.to_vec1::<f32>()? {
        assert!((0.0..=1.0).contains(&v), "sample out of range: {}", v);
    }
    Ok(())
}

#[test]
fn stub_prior_generates_identical_reconstructions() -> Result<()> {
    let (model, _) = divae_with_stub(2, 4, vec![1.0, 0.0, 0.0, 1.0])?;
    let samples = model.generate_samples(5)?;
    let rows: Vec<Vec<f32>> = samples.to_vec2()?;
    for row in rows.iter().skip(1) {
        for (a, b) in row.iter().zip(rows[0].iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }
    Ok(())
}

#[test]
fn weight_decay_applies_in_training_mode_only() -> Result<()> {
    use divae_util::candle_loss_functions::weight_norm_loss;

    let (model, variables) = divae_with_stub(2, 4, vec![1.0, 0.0, 0.0, 1.0])?;
    let x = Tensor::rand(0f32, 1f32, (4, D), &Device::Cpu)?;
    let output = model.forward_t(&x, true)?;

    let loss_train = model.loss(&x, &output, true)?.to_scalar::<f32>()?;
    let loss_eval = model.loss(&x, &output, false)?.to_scalar::<f32>()?;
    let penalty = 0.1 * weight_norm_loss(&variables.all_vars())?.to_scalar::<f32>()?;

    assert!(penalty > 0.0);
    assert_abs_diff_eq!(loss_train - loss_eval, penalty, epsilon = 1e-3);
    Ok(())
}

#[test]
fn construction_rejects_a_mismatched_prior_width() -> Result<()> {
    let variables = VarMap::new();
    let vs = VarBuilder::from_varmap(&variables, DType::F32, &Device::Cpu);
    let prior = StubPrior {
        v0: Tensor::from_vec(vec![1.0f32, 0.0, 1.0], (1, 3), &Device::Cpu)?,
    };
    let result = DiVae::new(
        &config(2, 4),
        prior,
        NoiseSource::seeded(3),
        variables.clone(),
        vs.pp("divae"),
    );
    assert!(result.is_err());
    Ok(())
}

#[test]
fn evaluation_loss_is_finite_with_an_rbm_prior() -> Result<()> {
    let (model, _) = divae_with_rbm(2, 4)?;
    let x = Tensor::rand(0f32, 1f32, (4, D), &Device::Cpu)?;
    let output = model.forward_t(&x, false)?;
    let loss = model.loss(&x, &output, false)?.to_scalar::<f32>()?;
    assert!(loss.is_finite());
    Ok(())
}
