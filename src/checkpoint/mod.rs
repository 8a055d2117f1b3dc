pub mod bundle;
pub mod start_state;

pub use bundle::{CheckpointDir, ResumeBundle, RESUME_FILE, WEIGHT_FILE};
pub use start_state::StartState;
