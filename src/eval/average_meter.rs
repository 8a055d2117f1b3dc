use log::info;

use crate::data::source::EpisodeSource;
use crate::error::{Error, Result};
use crate::eval::evaluator::AreaCounts;

/// Accumulates per-class intersection/union areas and batch losses over
/// one pass.
///
/// mIoU averages the foreground IoU over the split's classes; FB-IoU
/// averages the background and foreground IoU after pooling those classes.
/// Both are reported in percent.
pub struct AverageMeter {
    class_ids_interest: Vec<usize>,
    intersection_buf: [Vec<f64>; 2],
    union_buf: [Vec<f64>; 2],
    pub loss_buf: Vec<f64>,
}

impl AverageMeter {
    pub fn new(dataset: &dyn EpisodeSource) -> AverageMeter {
        let nclass = dataset.nclass();
        AverageMeter {
            class_ids_interest: dataset.class_ids().to_vec(),
            intersection_buf: [vec![0.0; nclass], vec![0.0; nclass]],
            union_buf: [vec![0.0; nclass], vec![0.0; nclass]],
            loss_buf: Vec::new(),
        }
    }

    pub fn update(&mut self, areas: &[AreaCounts], class_ids: &[usize], loss: f64) -> Result<()> {
        if areas.len() != class_ids.len() {
            return Err(Error::MalformedBatch(format!(
                "{} area counts for {} class ids",
                areas.len(),
                class_ids.len()
            )));
        }
        let nclass = self.union_buf[0].len();
        for (area, &class_id) in areas.iter().zip(class_ids) {
            if class_id >= nclass {
                return Err(Error::MalformedBatch(format!(
                    "class id {} outside the {}-class label space",
                    class_id, nclass
                )));
            }
            for label in 0..2 {
                self.intersection_buf[label][class_id] += area.inter[label] as f64;
                self.union_buf[label][class_id] += area.union[label] as f64;
            }
        }
        self.loss_buf.push(loss);
        Ok(())
    }

    /// `(mIoU, FB-IoU)` in percent over the classes of interest.
    pub fn compute_iou(&self) -> (f64, f64) {
        let classes = &self.class_ids_interest;
        if classes.is_empty() {
            return (0.0, 0.0);
        }

        let miou = classes
            .iter()
            .map(|&c| self.intersection_buf[1][c] / self.union_buf[1][c].max(1.0))
            .sum::<f64>()
            / classes.len() as f64
            * 100.0;

        let fb_iou = (0..2)
            .map(|label| {
                let inter: f64 = classes.iter().map(|&c| self.intersection_buf[label][c]).sum();
                let union: f64 = classes.iter().map(|&c| self.union_buf[label][c]).sum();
                inter / union.max(1.0)
            })
            .sum::<f64>()
            / 2.0
            * 100.0;

        (miou, fb_iou)
    }

    pub fn mean_loss(&self) -> f64 {
        if self.loss_buf.is_empty() {
            return 0.0;
        }
        self.loss_buf.iter().sum::<f64>() / self.loss_buf.len() as f64
    }

    /// Logs running metrics every `write_batch_idx` batches.
    pub fn write_process(&self, batch_idx: usize, datalen: usize, epoch: usize, write_batch_idx: usize) {
        if write_batch_idx == 0 || batch_idx % write_batch_idx != 0 {
            return;
        }
        let (miou, fb_iou) = self.compute_iou();
        let last = self.loss_buf.last().copied().unwrap_or(0.0);
        info!(
            "[Epoch: {:02}] [Batch: {:04}/{:04}] L: {:6.5}  Avg L: {:6.5}  mIoU: {:5.2}  |  FB-IoU: {:5.2}",
            epoch,
            batch_idx + 1,
            datalen,
            last,
            self.mean_loss(),
            miou,
            fb_iou
        );
    }

    /// Logs the end-of-pass summary tagged with `split`.
    pub fn write_result(&self, split: &str, epoch: usize) {
        let (miou, fb_iou) = self.compute_iou();
        info!(
            "*** {} [@Epoch {:02}] Avg L: {:6.5}  mIoU: {:5.2}   FB-IoU: {:5.2}   ***",
            split,
            epoch,
            self.mean_loss(),
            miou,
            fb_iou
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::benchmark::Benchmark;
    use crate::data::synthetic::SyntheticSource;

    fn meter() -> AverageMeter {
        let source = SyntheticSource::new(Benchmark::Pascal, vec![3, 4], 2, 4, 1);
        AverageMeter::new(&source)
    }

    #[test]
    fn miou_averages_foreground_iou_over_classes() {
        let mut m = meter();
        let perfect = AreaCounts { inter: [10, 6], union: [10, 6] };
        let half = AreaCounts { inter: [8, 2], union: [12, 4] };
        m.update(&[perfect, half], &[3, 4], 0.5).unwrap();

        let (miou, fb_iou) = m.compute_iou();
        assert!((miou - 75.0).abs() < 1e-9);
        // bg: 18 / 22, fg: 8 / 10
        let expected_fb = (18.0 / 22.0 + 0.8) / 2.0 * 100.0;
        assert!((fb_iou - expected_fb).abs() < 1e-9);
    }

    #[test]
    fn classes_without_union_count_as_zero() {
        let mut m = meter();
        m.update(&[AreaCounts { inter: [4, 4], union: [4, 4] }], &[3], 1.0).unwrap();
        let (miou, _) = m.compute_iou();
        assert!((miou - 50.0).abs() < 1e-9);
    }

    #[test]
    fn loss_mean_and_class_bounds() {
        let mut m = meter();
        m.update(&[AreaCounts::default()], &[3], 1.0).unwrap();
        m.update(&[AreaCounts::default()], &[3], 2.0).unwrap();
        assert_eq!(m.mean_loss(), 1.5);
        assert!(m.update(&[AreaCounts::default()], &[20], 1.0).is_err());
    }
}
