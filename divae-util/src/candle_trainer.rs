use crate::candle_data_loader::DataLoader;
use crate::candle_inference::TrainConfig;
use crate::candle_model_traits::GenerativeModelT;

use candle_nn::{AdamW, Optimizer, VarMap};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;

/// Model-agnostic training loop over the common model capability set.
pub struct Trainer<'a> {
    pub model: &'a dyn GenerativeModelT,
    pub variable_map: &'a VarMap,
}

impl<'a> Trainer<'a> {
    pub fn new(model: &'a dyn GenerativeModelT, variable_map: &'a VarMap) -> Self {
        Self {
            model,
            variable_map,
        }
    }

    /// Run AdamW over shuffled, preloaded minibatches.
    ///
    /// * `data` - data loader with `minibatch_data`
    /// * `train_config` - training configuration
    ///
    /// Returns the per-epoch mean loss trace.
    pub fn train<DataL>(
        &mut self,
        data: &mut DataL,
        train_config: &TrainConfig,
    ) -> anyhow::Result<Vec<f32>>
    where
        DataL: DataLoader,
    {
        let device = &train_config.device;
        let mut adam = AdamW::new_lr(
            self.variable_map.all_vars(),
            train_config.learning_rate.into(),
        )?;

        let pb = ProgressBar::new(train_config.num_epochs as u64);

        if !train_config.show_progress || train_config.verbose {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        data.shuffle_minibatch(train_config.batch_size)?;
        let num_minibatches = data.num_minibatch();

        let minibatches = (0..num_minibatches)
            .map(|b| data.minibatch_data(b, device))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut loss_trace = vec![];

        for _epoch in 0..train_config.num_epochs {
            let mut loss_tot = 0f32;

            for minibatch_data in minibatches.iter() {
                let x_nd = &minibatch_data.input;
                let output = self.model.forward_t(x_nd, true)?;
                let loss = self.model.loss(x_nd, &output, true)?;
                adam.backward_step(&loss)?;
                loss_tot += loss.to_scalar::<f32>()?;
            }

            loss_trace.push(loss_tot / num_minibatches.max(1) as f32);
            pb.inc(1);

            if train_config.verbose {
                info!(
                    "[{}] loss: {}",
                    _epoch + 1,
                    loss_trace.last().ok_or(anyhow::anyhow!("loss trace"))?
                );
            }
        } // each epoch

        pb.finish_and_clear();
        Ok(loss_trace)
    }
}
