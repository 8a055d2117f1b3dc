use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Named parameter tensors of a model, e.g. `merge.0.weight`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDict(pub BTreeMap<String, Matrix>);

impl StateDict {
    pub fn new() -> StateDict {
        StateDict(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Matrix) {
        self.0.insert(name.into(), value);
    }

    /// Removes and returns `name`; a missing key is a checkpoint mismatch.
    pub fn take(&mut self, name: &str) -> Result<Matrix> {
        self.0
            .remove(name)
            .ok_or_else(|| Error::StateMismatch(format!("missing key \"{}\" in state dict", name)))
    }

    /// Fails if any key was not consumed by `take`.
    pub fn ensure_consumed(&self) -> Result<()> {
        match self.0.keys().next() {
            Some(key) => Err(Error::StateMismatch(format!("unexpected key \"{}\" in state dict", key))),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parameter totals reported at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamCounts {
    pub backbone: usize,
    pub learnable: usize,
}

impl ParamCounts {
    pub fn total(&self) -> usize {
        self.backbone + self.learnable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_and_consume() {
        let mut sd = StateDict::new();
        sd.insert("a", Matrix::zeros(1, 1));
        sd.insert("b", Matrix::zeros(1, 1));
        sd.take("a").unwrap();
        assert!(sd.take("a").is_err());
        assert!(sd.ensure_consumed().is_err());
        sd.take("b").unwrap();
        sd.ensure_consumed().unwrap();
    }
}
