use crate::math::matrix::Matrix;

/// Label value excluded from loss and metrics (object boundaries).
pub const IGNORE_INDEX: u8 = 255;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

/// Per-pixel softmax cross-entropy over class logits.
///
/// `logits` is `pixels x classes`; `targets` holds one class index per
/// pixel, or `IGNORE_INDEX`.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// Row-wise softmax, shifted by the row max for stability.
    pub fn softmax(logits: &Matrix) -> Matrix {
        let mut out = logits.clone();
        for r in 0..out.rows {
            let row = out.row_mut(r);
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            for v in row.iter_mut() {
                *v = (*v - max).exp();
                sum += *v;
            }
            for v in row.iter_mut() {
                *v /= sum;
            }
        }
        out
    }

    /// Summed loss `-log p[target]` and the number of pixels that counted.
    pub fn loss(probs: &Matrix, targets: &[u8]) -> (f64, usize) {
        let mut total = 0.0;
        let mut counted = 0;
        for (r, &t) in targets.iter().enumerate() {
            if t == IGNORE_INDEX {
                continue;
            }
            total -= (probs.get(r, t as usize) + EPS).ln();
            counted += 1;
        }
        (total, counted)
    }

    /// Gradient of the combined softmax + cross-entropy w.r.t. the logits,
    /// `(p - onehot(target)) * scale`, zero on ignored pixels.
    pub fn derivative(probs: &Matrix, targets: &[u8], scale: f64) -> Matrix {
        let mut grad = probs.clone();
        for (r, &t) in targets.iter().enumerate() {
            let row = grad.row_mut(r);
            if t == IGNORE_INDEX {
                row.iter_mut().for_each(|v| *v = 0.0);
                continue;
            }
            row[t as usize] -= 1.0;
            row.iter_mut().for_each(|v| *v *= scale);
        }
        grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_pixels_do_not_count() {
        let logits = Matrix::from_rows(vec![vec![0.0, 0.0], vec![5.0, -5.0]]);
        let probs = CrossEntropyLoss::softmax(&logits);
        let (total, counted) = CrossEntropyLoss::loss(&probs, &[IGNORE_INDEX, 0]);
        assert_eq!(counted, 1);
        assert!(total < 1e-3);
        let grad = CrossEntropyLoss::derivative(&probs, &[IGNORE_INDEX, 0], 1.0);
        assert_eq!(grad.row(0), &[0.0, 0.0]);
    }

    #[test]
    fn uniform_logits_give_log2() {
        let probs = CrossEntropyLoss::softmax(&Matrix::zeros(1, 2));
        let (total, _) = CrossEntropyLoss::loss(&probs, &[1]);
        assert!((total - 2f64.ln()).abs() < 1e-9);
    }
}
