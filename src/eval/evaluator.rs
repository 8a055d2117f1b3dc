use crate::data::episode::Batch;
use crate::error::{Error, Result};
use crate::loss::cross_entropy::IGNORE_INDEX;

/// Pixel areas of one episode, indexed by label (0 background, 1 foreground).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AreaCounts {
    pub inter: [u64; 2],
    pub union: [u64; 2],
}

pub struct Evaluator;

impl Evaluator {
    /// Intersection and union areas between each predicted mask and its
    /// ground truth. Pixels labelled `IGNORE_INDEX` in the ground truth are
    /// left out of both.
    pub fn classify_prediction(pred_masks: &[Vec<usize>], batch: &Batch) -> Result<Vec<AreaCounts>> {
        if pred_masks.len() != batch.query_mask.len() {
            return Err(Error::MalformedBatch(format!(
                "{} predictions for {} query masks",
                pred_masks.len(),
                batch.query_mask.len()
            )));
        }

        pred_masks
            .iter()
            .zip(&batch.query_mask)
            .map(|(pred, gt)| {
                if pred.len() != gt.labels.len() {
                    return Err(Error::MalformedBatch(format!(
                        "prediction has {} pixels, ground truth {}",
                        pred.len(),
                        gt.labels.len()
                    )));
                }
                let mut area_pred = [0u64; 2];
                let mut area_gt = [0u64; 2];
                let mut inter = [0u64; 2];
                for (&p, &g) in pred.iter().zip(&gt.labels) {
                    if g == IGNORE_INDEX {
                        continue;
                    }
                    let (p, g) = (p.min(1), g.min(1) as usize);
                    area_pred[p] += 1;
                    area_gt[g] += 1;
                    if p == g {
                        inter[p] += 1;
                    }
                }
                let union = [
                    area_pred[0] + area_gt[0] - inter[0],
                    area_pred[1] + area_gt[1] - inter[1],
                ];
                Ok(AreaCounts { inter, union })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::episode::Episode;
    use crate::data::image::{Image, Mask};
    use crate::math::matrix::Matrix;

    fn batch_with_mask(labels: Vec<u8>) -> Batch {
        let n = labels.len();
        let img = Image::new(1, n, Matrix::zeros(n, 3));
        let mask = Mask::new(1, n, labels);
        Batch::collate(vec![Episode {
            query_img: img.clone(),
            query_mask: mask.clone(),
            support_imgs: vec![img],
            support_masks: vec![mask],
            class_id: 0,
        }])
    }

    #[test]
    fn counts_intersection_and_union_per_label() {
        let batch = batch_with_mask(vec![0, 0, 1, 1]);
        let areas = Evaluator::classify_prediction(&[vec![0, 1, 1, 0]], &batch).unwrap();
        assert_eq!(areas[0].inter, [1, 1]);
        assert_eq!(areas[0].union, [3, 3]);
    }

    #[test]
    fn ignored_pixels_are_excluded() {
        let batch = batch_with_mask(vec![1, IGNORE_INDEX, 1]);
        let areas = Evaluator::classify_prediction(&[vec![1, 0, 1]], &batch).unwrap();
        assert_eq!(areas[0].inter, [0, 2]);
        assert_eq!(areas[0].union, [0, 2]);
    }
}
