pub mod backbone;
pub mod mshnet;
pub mod state;

use rand::rngs::StdRng;

use crate::data::episode::Batch;
use crate::error::Result;
use crate::layers::dense::ParamMut;
use crate::math::matrix::Matrix;
use crate::train::mode::Mode;

pub use backbone::Backbone;
pub use mshnet::MshNet;
pub use state::{ParamCounts, StateDict};

/// Result of one forward pass.
#[derive(Debug, Clone)]
pub struct ForwardOutput {
    /// Per episode, `pixels x classes` logits in row-major pixel order.
    pub logits: Vec<Matrix>,
    /// Mean loss over every labelled query pixel in the batch.
    pub loss: f64,
}

/// A trainable few-shot segmentation model as seen by the training loop.
///
/// Gradients accumulate across `backward` calls until `zero_grad`, and
/// `backward` consumes what the last training-mode `forward` retained.
pub trait SegmentationModel {
    fn set_mode(&mut self, mode: Mode);

    fn forward(&mut self, batch: &Batch, rng: &mut StdRng) -> Result<ForwardOutput>;

    fn zero_grad(&mut self);

    fn backward(&mut self) -> Result<()>;

    /// The parameters the optimizer is bound to, in a stable order.
    fn trainable_params(&mut self) -> Vec<ParamMut<'_>>;

    fn state_dict(&self) -> StateDict;

    fn load_state_dict(&mut self, state: StateDict) -> Result<()>;

    fn param_counts(&self) -> ParamCounts;
}
