use serde::{Serialize, Deserialize};

/// Loss and IoU metrics of one pass over a dataloader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassMetrics {
    pub loss: f64,
    /// Mean foreground IoU over the split's classes, in percent.
    pub miou: f64,
    /// Mean of background and foreground IoU, in percent.
    pub fb_iou: f64,
}

/// Per-epoch record the controller collects into its `RunReport`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 0-based epoch index.
    pub epoch: usize,
    pub train: PassMetrics,
    pub val: PassMetrics,
    /// Learning rate in effect after this epoch's scheduler decision.
    pub lr: f64,
    /// Whether this epoch produced a new best snapshot.
    pub improved: bool,
    /// Wall-clock duration of the epoch in milliseconds.
    pub elapsed_ms: u64,
}
