#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;

use mshnet::data::{Batch, Benchmark, DataLoader, SyntheticSource};
use mshnet::error::{Error, Result};
use mshnet::layers::ParamMut;
use mshnet::logging::RunLogger;
use mshnet::model::{ForwardOutput, ParamCounts, SegmentationModel, StateDict};
use mshnet::optim::LR_GAMMA;
use mshnet::{CheckpointDir, ExponentialLr, Matrix, Mode, SeedControl, Sgd, Trainer};

pub const PARAM: &str = "mock.w";

/// Model with one `1 x 2` parameter whose validation predictions follow a
/// script: for the n-th eval pass, `true` predicts foreground everywhere and
/// `false` background. Counts forwards and loads.
pub struct ScriptedModel {
    pub w: Matrix,
    grad: Matrix,
    mode: Mode,
    pending: bool,
    eval_script: Vec<bool>,
    pub eval_passes: usize,
    pub train_forwards: usize,
    pub eval_forwards: usize,
    pub loaded: Vec<Matrix>,
}

impl ScriptedModel {
    pub fn new(eval_script: Vec<bool>) -> ScriptedModel {
        ScriptedModel {
            w: Matrix::zeros(1, 2),
            grad: Matrix::zeros(1, 2),
            mode: Mode::Train,
            pending: false,
            eval_script,
            eval_passes: 0,
            train_forwards: 0,
            eval_forwards: 0,
            loaded: Vec::new(),
        }
    }

    fn predicts_foreground(&self) -> bool {
        self.eval_script.get(self.eval_passes.wrapping_sub(1)).copied().unwrap_or(true)
    }
}

impl SegmentationModel for ScriptedModel {
    fn set_mode(&mut self, mode: Mode) {
        if mode == Mode::Eval {
            self.eval_passes += 1;
            self.pending = false;
        }
        self.mode = mode;
    }

    fn forward(&mut self, batch: &Batch, _rng: &mut StdRng) -> Result<ForwardOutput> {
        batch.validate()?;
        let row = match self.mode {
            Mode::Train => {
                self.train_forwards += 1;
                self.pending = true;
                self.w.row(0).to_vec()
            }
            Mode::Eval => {
                self.eval_forwards += 1;
                if self.predicts_foreground() { vec![0.0, 1.0] } else { vec![1.0, 0.0] }
            }
        };
        let logits = batch
            .query_mask
            .iter()
            .map(|m| Matrix::from_rows(vec![row.clone(); m.labels.len()]))
            .collect();
        Ok(ForwardOutput { logits, loss: 0.5 })
    }

    fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    fn backward(&mut self) -> Result<()> {
        if !self.pending {
            return Err(Error::Autograd("no training forward to differentiate".into()));
        }
        self.pending = false;
        self.grad.axpy(1.0, &Matrix::from_vec(1, 2, vec![0.1, -0.1]));
        Ok(())
    }

    fn trainable_params(&mut self) -> Vec<ParamMut<'_>> {
        vec![ParamMut { name: PARAM.to_string(), value: &mut self.w, grad: &self.grad }]
    }

    fn state_dict(&self) -> StateDict {
        let mut sd = StateDict::new();
        sd.insert(PARAM, self.w.clone());
        sd
    }

    fn load_state_dict(&mut self, mut state: StateDict) -> Result<()> {
        let w = state.take(PARAM)?;
        state.ensure_consumed()?;
        self.loaded.push(w.clone());
        self.w = w;
        Ok(())
    }

    fn param_counts(&self) -> ParamCounts {
        ParamCounts { backbone: 0, learnable: 2 }
    }
}

/// Synthetic pascal loaders: `train_len` training episodes and two
/// validation episodes, batches of two.
pub fn loaders(train_len: usize) -> (DataLoader, DataLoader) {
    let trn = SyntheticSource::new(Benchmark::Pascal, vec![5, 6, 7], train_len, 4, 1);
    let val = SyntheticSource::new(Benchmark::Pascal, vec![0, 1], 2, 4, 1);
    (
        DataLoader::new(Arc::new(trn), 2, 1, true),
        DataLoader::new(Arc::new(val), 2, 1, false),
    )
}

pub fn log_dir(root: &Path) -> std::path::PathBuf {
    root.join("logs").join("run.log")
}

pub fn checkpoints(root: &Path) -> CheckpointDir {
    CheckpointDir::new(root.join("resume"))
}

/// Trainer over `model` with the default optimizer settings, logging and
/// checkpointing under `root`.
pub fn trainer(mut model: ScriptedModel, root: &Path, niter: usize, train_len: usize) -> Trainer<ScriptedModel> {
    let n_params = model.trainable_params().len();
    let optimizer = Sgd::new(0.025, 0.9, 0.00005, n_params);
    let scheduler = ExponentialLr::new(&optimizer, LR_GAMMA);
    let (trn, val) = loaders(train_len);
    let logger = RunLogger::initialize(log_dir(root)).unwrap();
    Trainer::new(model, optimizer, scheduler, trn, val, checkpoints(root), logger, niter)
        .with_seeds(SeedControl::with_training_seed(1))
}
