use candle_core::{bail, Result, Tensor};
use candle_nn::{Activation, Linear, Module, VarBuilder};

/// A stack of `Linear` layers, each followed by an optional activation.
pub struct StackLayers {
    layers: Vec<(Linear, Option<Activation>)>,
    dim_input: usize,
    dim_output: usize,
}

impl Module for StackLayers {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for (linear, activation) in self.layers.iter() {
            x = linear.forward(&x)?;
            if let Some(activation) = activation {
                x = activation.forward(&x)?;
            }
        }
        Ok(x)
    }
}

impl StackLayers {
    pub fn dim_input(&self) -> usize {
        self.dim_input
    }

    pub fn dim_output(&self) -> usize {
        self.dim_output
    }
}

/// Build a fully connected stack following a node size schedule.
///
/// All layers use `activation` except the last, which applies
/// `output_activation` when given and otherwise emits raw values (logits or
/// distribution parameters).
///
/// Parameters are registered as `fc.{j}.{weight,bias}`.
pub fn stack_linear(
    dims: &[usize],
    activation: Activation,
    output_activation: Option<Activation>,
    vs: VarBuilder,
) -> Result<StackLayers> {
    if dims.len() < 2 {
        bail!(
            "node schedule needs at least an input and an output width, got {:?}",
            dims
        );
    }
    if dims.iter().any(|&d| d == 0) {
        bail!("zero-width layer in node schedule {:?}", dims);
    }

    let last = dims.len() - 2;
    let mut layers = Vec::with_capacity(dims.len() - 1);
    for (j, pair) in dims.windows(2).enumerate() {
        let linear = candle_nn::linear(pair[0], pair[1], vs.pp(format!("fc.{}", j)))?;
        let act = if j == last {
            output_activation
        } else {
            Some(activation)
        };
        layers.push((linear, act));
    }

    Ok(StackLayers {
        layers,
        dim_input: dims[0],
        dim_output: dims[dims.len() - 1],
    })
}
