pub mod candle_aux_layers;
pub mod candle_data_loader;
pub mod candle_decoder_bernoulli;
pub mod candle_distributions;
pub mod candle_encoder_hierarchical;
pub mod candle_inference;
pub mod candle_loss_functions;
pub mod candle_model_ae;
pub mod candle_model_divae;
pub mod candle_model_traits;
pub mod candle_model_vae;
pub mod candle_noise;
pub mod candle_rbm_prior;
pub mod candle_trainer;
pub mod cli;

pub use candle_core;
pub use candle_nn;
