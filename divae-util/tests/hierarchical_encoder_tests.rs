use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{Activation, VarBuilder, VarMap};
use divae_util::candle_encoder_hierarchical::HierarchicalEncoder;
use divae_util::candle_noise::NoiseSource;

fn encoder(n_levels: usize, n_features: usize, n_latent_units: usize) -> Result<HierarchicalEncoder> {
    let variables = VarMap::new();
    let vs = VarBuilder::from_varmap(&variables, DType::F32, &Device::Cpu);
    HierarchicalEncoder::new(
        n_features,
        n_levels,
        n_latent_units,
        16,
        2,
        Activation::Relu,
        0.5,
        NoiseSource::seeded(7),
        vs,
    )
}

#[test]
fn returns_one_pair_per_level_for_any_batch_size() -> Result<()> {
    let enc = encoder(3, 12, 5)?;
    for n in [1usize, 4, 17] {
        let x = Tensor::zeros((n, 12), DType::F32, &Device::Cpu)?;
        let posterior = enc.forward_t(&x, false)?;
        assert_eq!(posterior.len(), 3);
        for level in posterior.iter() {
            assert_eq!(level.sample.dims2()?, (n, 5));
            assert_eq!(level.distribution.dim_units(), 5);
        }
    }
    Ok(())
}

#[test]
fn latent_width_grows_linearly_with_depth() -> Result<()> {
    let enc = encoder(4, 10, 3)?;
    assert_eq!(enc.n_levels(), 4);
    assert_eq!(enc.dim_obs(), 10);
    assert_eq!(enc.dim_latent(), 12);
    Ok(())
}

#[test]
fn single_level_degenerates_to_mean_field() -> Result<()> {
    let enc = encoder(1, 8, 4)?;
    let x = Tensor::zeros((5, 8), DType::F32, &Device::Cpu)?;
    let posterior = enc.forward_t(&x, false)?;
    assert_eq!(posterior.len(), 1);
    assert_eq!(posterior[0].sample.dims2()?, (5, 4));
    Ok(())
}

#[test]
fn rejects_mismatched_input_width() -> Result<()> {
    let enc = encoder(2, 8, 4)?;
    let x = Tensor::zeros((3, 9), DType::F32, &Device::Cpu)?;
    assert!(enc.forward_t(&x, false).is_err());
    Ok(())
}

#[test]
fn construction_rejects_inconsistent_configuration() {
    assert!(encoder(0, 8, 4).is_err());
    assert!(encoder(2, 8, 0).is_err());
    assert!(encoder(2, 0, 4).is_err());
}

#[test]
fn evaluation_samples_are_binary() -> Result<()> {
    let enc = encoder(2, 6, 3)?;
    let x = Tensor::rand(0f32, 1f32, (4, 6), &Device::Cpu)?;
    for level in enc.forward_t(&x, false)? {
        for v in level.sample.flatten_all()?.to_vec1::<f32>()? {
            assert!(v == 0.0 || v == 1.0, "non-binary evaluation sample: {}", v);
        }
    }
    Ok(())
}

#[test]
fn training_samples_stay_in_the_unit_interval() -> Result<()> {
    let enc = encoder(2, 6, 3)?;
    let x = Tensor::rand(0f32, 1f32, (4, 6), &Device::Cpu)?;
    for level in enc.forward_t(&x, true)? {
        for v in level.sample.flatten_all()?.to_vec1::<f32>()? {
            assert!((0.0..=1.0).contains(&v), "relaxed sample out of range: {}", v);
        }
    }
    Ok(())
}
