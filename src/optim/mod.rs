pub mod sgd;
pub mod scheduler;

pub use sgd::{Sgd, SgdState};
pub use scheduler::{ExponentialLr, SchedulerState, LR_GAMMA};
