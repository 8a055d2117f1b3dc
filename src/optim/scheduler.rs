use serde::{Serialize, Deserialize};

use crate::optim::sgd::Sgd;

/// Decay factor applied on every scheduler step.
pub const LR_GAMMA: f64 = 0.9;

/// Serializable scheduler state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub base_lr: f64,
    pub gamma: f64,
    pub last_epoch: usize,
}

/// Exponential learning-rate decay: after `n` steps the optimizer runs at
/// `base_lr * gamma^n`.
///
/// The scheduler does not decide when to step; the trainer calls `step` on
/// its own cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialLr {
    base_lr: f64,
    gamma: f64,
    last_epoch: usize,
}

impl ExponentialLr {
    /// Binds to the optimizer's current learning rate as the base rate.
    pub fn new(optimizer: &Sgd, gamma: f64) -> ExponentialLr {
        ExponentialLr { base_lr: optimizer.learning_rate, gamma, last_epoch: 0 }
    }

    pub fn get_lr(&self) -> f64 {
        self.base_lr * self.gamma.powi(self.last_epoch as i32)
    }

    /// Advances one decay step and writes the new rate into the optimizer.
    pub fn step(&mut self, optimizer: &mut Sgd) {
        self.last_epoch += 1;
        optimizer.learning_rate = self.get_lr();
    }

    pub fn steps_taken(&self) -> usize {
        self.last_epoch
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState { base_lr: self.base_lr, gamma: self.gamma, last_epoch: self.last_epoch }
    }

    pub fn load_state(&mut self, state: SchedulerState) {
        self.base_lr = state.base_lr;
        self.gamma = state.gamma;
        self.last_epoch = state.last_epoch;
    }
}
