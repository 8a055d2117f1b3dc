pub mod epoch;
pub mod epoch_stats;
pub mod mode;
pub mod seed;
pub mod trainer;

pub use epoch::{run_epoch, WRITE_BATCH_IDX};
pub use epoch_stats::{EpochStats, PassMetrics};
pub use mode::Mode;
pub use seed::{SeedControl, EVAL_SEED};
pub use trainer::{RunReport, Trainer, LR_STEP_EVERY};
