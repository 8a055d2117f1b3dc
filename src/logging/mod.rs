pub mod run_logger;
pub mod scalar_writer;

pub use run_logger::{RunLogger, BEST_MODEL_FILE, LOG_FILE};
pub use scalar_writer::{ScalarRecord, ScalarWriter, SCALAR_FILE};
