use log::debug;
use rand::rngs::StdRng;
use rand::Rng;

use crate::activation::activation::ActivationFunction;
use crate::data::episode::Batch;
use crate::data::image::{Image, Mask};
use crate::error::{Error, Result};
use crate::layers::dense::{Layer, ParamMut};
use crate::layers::dropout::Dropout;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::model::backbone::{Backbone, FrozenBackbone};
use crate::model::state::{ParamCounts, StateDict};
use crate::model::{ForwardOutput, SegmentationModel};
use crate::train::mode::Mode;

const MERGE_HIDDEN: usize = 16;
const MERGE_DROPOUT: f64 = 0.1;
/// Background and foreground.
const NUM_LOGITS: usize = 2;
const EPS: f64 = 1e-7;

/// Few-shot segmenter built on multi-level similarity ("hyper-relation")
/// features.
///
/// For every backbone level the query's per-pixel features are compared by
/// cosine similarity against the foreground and background prototypes
/// (masked feature means) of each support, averaged over shots. The stacked
/// similarities go through a small trainable merge head that emits
/// background/foreground logits per pixel. Only the merge head is trained.
pub struct MshNet {
    backbone: FrozenBackbone,
    shot: usize,
    merge_hidden: Layer,
    merge_dropout: Dropout,
    merge_out: Layer,
    mode: Mode,
    pending: Option<PendingGrad>,
}

/// What the last training-mode forward needs for `backward`.
struct PendingGrad {
    probs: Matrix,
    targets: Vec<u8>,
    counted: usize,
}

impl MshNet {
    pub fn new<R: Rng + ?Sized>(backbone: Backbone, shot: usize, rng: &mut R) -> MshNet {
        let backbone = FrozenBackbone::new(backbone);
        let relation_width = 2 * backbone.layers.len();
        MshNet {
            backbone,
            shot,
            merge_hidden: Layer::new(MERGE_HIDDEN, relation_width, ActivationFunction::ReLU, rng),
            merge_dropout: Dropout::new(MERGE_DROPOUT),
            merge_out: Layer::new(NUM_LOGITS, MERGE_HIDDEN, ActivationFunction::Identity, rng),
            mode: Mode::Train,
            pending: None,
        }
    }

    pub fn backbone(&self) -> Backbone {
        self.backbone.kind
    }

    pub fn shot(&self) -> usize {
        self.shot
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// `pixels x (2 * levels)` similarities, columns `[fg, bg]` per level.
    fn relation_features(&mut self, query: &Image, supports: &[Image], masks: &[Mask]) -> Matrix {
        let query_levels = self.backbone.extract(query);
        let n = query.num_pixels();
        let weight = 1.0 / supports.len() as f64;
        let mut sims: Vec<Matrix> = query_levels.iter().map(|_| Matrix::zeros(n, 2)).collect();

        for (img, mask) in supports.iter().zip(masks) {
            let support_levels = self.backbone.extract(img);
            for (level, feats) in support_levels.iter().enumerate() {
                let fg = masked_mean(feats, mask, 1);
                let bg = masked_mean(feats, mask, 0);
                for p in 0..n {
                    let q = query_levels[level].row(p);
                    let row = sims[level].row_mut(p);
                    row[0] += weight * cosine(q, &fg);
                    row[1] += weight * cosine(q, &bg);
                }
            }
        }

        let refs: Vec<&Matrix> = sims.iter().collect();
        Matrix::hstack(&refs)
    }
}

impl SegmentationModel for MshNet {
    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        if !mode.is_training() {
            self.pending = None;
        }
    }

    fn forward(&mut self, batch: &Batch, rng: &mut StdRng) -> Result<ForwardOutput> {
        batch.validate()?;
        if let Some(i) = batch.support_imgs.iter().position(|s| s.len() != self.shot) {
            return Err(Error::MalformedBatch(format!(
                "episode {} has {} supports, model is {}-shot",
                i,
                batch.support_imgs[i].len(),
                self.shot
            )));
        }
        let training = self.mode.is_training();

        let mut relations = Vec::with_capacity(batch.len());
        for i in 0..batch.len() {
            relations.push(self.relation_features(
                &batch.query_img[i],
                &batch.support_imgs[i],
                &batch.support_masks[i],
            ));
        }
        let refs: Vec<&Matrix> = relations.iter().collect();
        let stacked = Matrix::vstack(&refs);

        let hidden = self.merge_hidden.forward(&stacked, training);
        let hidden = self.merge_dropout.forward(&hidden, training, rng);
        let logits = self.merge_out.forward(&hidden, training);

        let targets: Vec<u8> = batch.query_mask.iter().flat_map(|m| m.labels.iter().copied()).collect();
        let probs = CrossEntropyLoss::softmax(&logits);
        let (total, counted) = CrossEntropyLoss::loss(&probs, &targets);
        let loss = if counted == 0 { 0.0 } else { total / counted as f64 };
        debug!("forward: {} episodes, {} labelled pixels, loss {:.5}", batch.len(), counted, loss);

        self.pending = if training { Some(PendingGrad { probs, targets, counted }) } else { None };

        let mut per_episode = Vec::with_capacity(batch.len());
        let mut start = 0;
        for rel in &relations {
            per_episode.push(logits.rows_range(start, rel.rows));
            start += rel.rows;
        }
        Ok(ForwardOutput { logits: per_episode, loss })
    }

    fn zero_grad(&mut self) {
        self.merge_hidden.zero_grad();
        self.merge_out.zero_grad();
    }

    fn backward(&mut self) -> Result<()> {
        let pending = self.pending.take().ok_or_else(|| {
            Error::Autograd("backward requires a forward pass in training mode".into())
        })?;
        if pending.counted == 0 {
            return Ok(());
        }
        let grad = CrossEntropyLoss::derivative(&pending.probs, &pending.targets, 1.0 / pending.counted as f64);
        let grad = self.merge_out.backward(&grad)?;
        let grad = self.merge_dropout.backward(&grad)?;
        self.merge_hidden.backward(&grad)?;
        Ok(())
    }

    fn trainable_params(&mut self) -> Vec<ParamMut<'_>> {
        let [w0, b0] = self.merge_hidden.params_mut("merge.0");
        let [w2, b2] = self.merge_out.params_mut("merge.2");
        vec![w0, b0, w2, b2]
    }

    fn state_dict(&self) -> StateDict {
        let mut sd = StateDict::new();
        for (i, layer) in self.backbone.layers.iter().enumerate() {
            sd.insert(format!("backbone.{i}.weight"), layer.weights.clone());
            sd.insert(format!("backbone.{i}.bias"), layer.biases.clone());
        }
        sd.insert("merge.0.weight", self.merge_hidden.weights.clone());
        sd.insert("merge.0.bias", self.merge_hidden.biases.clone());
        sd.insert("merge.2.weight", self.merge_out.weights.clone());
        sd.insert("merge.2.bias", self.merge_out.biases.clone());
        sd
    }

    fn load_state_dict(&mut self, mut state: StateDict) -> Result<()> {
        for (i, layer) in self.backbone.layers.iter_mut().enumerate() {
            let w = state.take(&format!("backbone.{i}.weight"))?;
            let b = state.take(&format!("backbone.{i}.bias"))?;
            layer.load(w, b)?;
        }
        let w = state.take("merge.0.weight")?;
        let b = state.take("merge.0.bias")?;
        self.merge_hidden.load(w, b)?;
        let w = state.take("merge.2.weight")?;
        let b = state.take("merge.2.bias")?;
        self.merge_out.load(w, b)?;
        state.ensure_consumed()
    }

    fn param_counts(&self) -> ParamCounts {
        ParamCounts {
            backbone: self.backbone.param_count(),
            learnable: self.merge_hidden.param_count() + self.merge_out.param_count(),
        }
    }
}

/// Mean feature row over pixels labelled `label`; zeros if there are none.
fn masked_mean(feats: &Matrix, mask: &Mask, label: u8) -> Vec<f64> {
    let mut acc = vec![0.0; feats.cols];
    let mut n = 0usize;
    for (p, &l) in mask.labels.iter().enumerate() {
        if l == label {
            for (a, f) in acc.iter_mut().zip(feats.row(p)) {
                *a += f;
            }
            n += 1;
        }
    }
    if n > 0 {
        acc.iter_mut().for_each(|a| *a /= n as f64);
    }
    acc
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    dot / (na * nb + EPS)
}
