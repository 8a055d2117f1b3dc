pub mod average_meter;
pub mod evaluator;

pub use average_meter::AverageMeter;
pub use evaluator::{AreaCounts, Evaluator};
