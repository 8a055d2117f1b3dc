use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::model::state::StateDict;
use crate::optim::scheduler::SchedulerState;
use crate::optim::sgd::SgdState;

pub const RESUME_FILE: &str = "resume.json";
pub const WEIGHT_FILE: &str = "weight.json";

/// Everything needed to continue a run where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeBundle {
    pub epoch: usize,
    pub state_dict: StateDict,
    pub optimizer: SgdState,
    pub lr: SchedulerState,
}

/// The checkpoint directory and the files the trainer keeps in it.
#[derive(Debug, Clone)]
pub struct CheckpointDir {
    root: PathBuf,
}

impl CheckpointDir {
    pub fn new(root: impl Into<PathBuf>) -> CheckpointDir {
        CheckpointDir { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resume_path(&self) -> PathBuf {
        self.root.join(RESUME_FILE)
    }

    pub fn weight_path(&self) -> PathBuf {
        self.root.join(WEIGHT_FILE)
    }

    /// `train_epoch_<epoch>_<miou>.json`
    pub fn best_path(&self, epoch: usize, miou: f64) -> PathBuf {
        self.root.join(format!("train_epoch_{}_{}.json", epoch, miou))
    }

    pub fn save_resume(&self, bundle: &ResumeBundle) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        save_json(&self.resume_path(), bundle)
    }

    pub fn load_resume(&self) -> Result<ResumeBundle> {
        load_json(&self.resume_path())
    }

    pub fn load_weights(&self) -> Result<StateDict> {
        load_json(&self.weight_path())
    }

    pub fn save_best(&self, epoch: usize, miou: f64, state: &StateDict) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.best_path(epoch, miou);
        save_json(&path, state)?;
        Ok(path)
    }
}

/// Serializes `value` to a pretty-printed JSON file.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let write = || -> Result<()> {
        let file = fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, value)?;
        Ok(())
    };
    write().map_err(|e| Error::at_checkpoint(path, e))
}

/// Deserializes a JSON file previously written by `save_json`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let read = || -> Result<T> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    };
    read().map_err(|e| Error::at_checkpoint(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_snapshot_name_carries_epoch_and_miou() {
        let dir = CheckpointDir::new("/ckpt");
        assert_eq!(dir.best_path(3, 41.5), PathBuf::from("/ckpt/train_epoch_3_41.5.json"));
    }

    #[test]
    fn corrupt_file_reports_its_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CheckpointDir::new(tmp.path());
        fs::write(dir.resume_path(), b"{ not json").unwrap();
        match dir.load_resume() {
            Err(Error::Checkpoint { path, .. }) => assert_eq!(path, dir.resume_path()),
            other => panic!("expected checkpoint error, got {:?}", other.map(|b| b.epoch)),
        }
    }
}
