use log::info;

use crate::checkpoint::bundle::{CheckpointDir, ResumeBundle};
use crate::error::Result;
use crate::model::state::StateDict;

/// How a run begins, decided once from the checkpoint directory.
#[derive(Debug, Clone)]
pub enum StartState {
    /// `resume.json` found: restore parameters, optimizer and scheduler and
    /// continue at the stored epoch.
    Resumed(ResumeBundle),
    /// Only `weight.json` found: load parameters, start at epoch 0.
    WeightsOnly(StateDict),
    /// Nothing found: fresh parameters, epoch 0.
    Fresh,
}

impl StartState {
    /// The resumable bundle wins over bare weights. A file that exists but
    /// cannot be read is an error, never a fresh start.
    pub fn resolve(dir: &CheckpointDir) -> Result<StartState> {
        let resume = dir.resume_path();
        if resume.exists() {
            info!("load state_dict from: {}", resume.display());
            return Ok(StartState::Resumed(dir.load_resume()?));
        }
        let weight = dir.weight_path();
        if weight.exists() {
            info!("load weights from: {}", weight.display());
            return Ok(StartState::WeightsOnly(dir.load_weights()?));
        }
        info!("there is no resume or weight under {}", dir.root().display());
        Ok(StartState::Fresh)
    }

    pub fn epoch(&self) -> usize {
        match self {
            StartState::Resumed(bundle) => bundle.epoch,
            StartState::WeightsOnly(_) | StartState::Fresh => 0,
        }
    }
}
