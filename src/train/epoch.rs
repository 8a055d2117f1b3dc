use crate::data::loader::DataLoader;
use crate::device::Device;
use crate::error::Result;
use crate::eval::{AverageMeter, Evaluator};
use crate::model::SegmentationModel;
use crate::optim::sgd::Sgd;
use crate::train::epoch_stats::PassMetrics;
use crate::train::mode::Mode;
use crate::train::seed::SeedControl;

/// A progress line is logged every this many batches.
pub const WRITE_BATCH_IDX: usize = 50;

/// Runs one full pass of `loader` through `model` and returns the mean
/// batch loss, mIoU and FB-IoU.
///
/// In `Mode::Train` every batch ends with zero-grad, backward and an
/// optimizer step. In `Mode::Eval` the optimizer is left untouched and the
/// model retains nothing for backward. Any malformed batch aborts the pass.
pub fn run_epoch<M: SegmentationModel + ?Sized>(
    epoch: usize,
    model: &mut M,
    loader: &DataLoader,
    optimizer: &mut Sgd,
    mode: Mode,
    seeds: &mut SeedControl,
    device: Device,
) -> Result<PassMetrics> {
    seeds.reseed(mode);
    model.set_mode(mode);

    let mut meter = AverageMeter::new(loader.dataset());
    let mut model_rng = seeds.fork();
    let datalen = loader.len();

    for (idx, batch) in loader.iter(seeds.fork()).enumerate() {
        let batch = batch?.to_device(device);

        let out = model.forward(&batch, &mut model_rng)?;
        let pred_masks: Vec<Vec<usize>> = out.logits.iter().map(|l| l.argmax_rows()).collect();

        if mode.is_training() {
            model.zero_grad();
            model.backward()?;
            optimizer.step(&mut model.trainable_params())?;
        }

        let areas = Evaluator::classify_prediction(&pred_masks, &batch)?;
        meter.update(&areas, &batch.class_id, out.loss)?;
        meter.write_process(idx, datalen, epoch, WRITE_BATCH_IDX);
    }

    meter.write_result(mode.label(), epoch);
    let (miou, fb_iou) = meter.compute_iou();
    Ok(PassMetrics { loss: meter.mean_loss(), miou, fb_iou })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::data::benchmark::Benchmark;
    use crate::data::synthetic::SyntheticSource;
    use crate::model::backbone::Backbone;
    use crate::model::mshnet::MshNet;

    fn setup() -> (MshNet, Sgd, DataLoader) {
        let mut rng = StdRng::seed_from_u64(3);
        let mut model = MshNet::new(Backbone::Vgg16, 1, &mut rng);
        let n_params = model.trainable_params().len();
        let source = SyntheticSource::new(Benchmark::Pascal, vec![0, 1], 6, 6, 1);
        let loader = DataLoader::new(Arc::new(source), 2, 1, false);
        (model, Sgd::new(0.01, 0.9, 0.0, n_params), loader)
    }

    #[test]
    fn eval_pass_is_reproducible_and_leaves_parameters() {
        let (mut model, mut opt, loader) = setup();
        let mut seeds = SeedControl::new();
        let before = model.state_dict();

        let a = run_epoch(0, &mut model, &loader, &mut opt, Mode::Eval, &mut seeds, Device::Cpu).unwrap();
        let b = run_epoch(0, &mut model, &loader, &mut opt, Mode::Eval, &mut seeds, Device::Cpu).unwrap();

        assert_eq!(a.miou.to_bits(), b.miou.to_bits());
        assert_eq!(a.fb_iou.to_bits(), b.fb_iou.to_bits());
        assert_eq!(model.state_dict(), before);
    }

    #[test]
    fn training_pass_updates_merge_head() {
        let (mut model, mut opt, loader) = setup();
        let mut seeds = SeedControl::with_training_seed(11);
        let before = model.state_dict();

        let metrics = run_epoch(0, &mut model, &loader, &mut opt, Mode::Train, &mut seeds, Device::Cpu).unwrap();

        assert!(metrics.loss.is_finite());
        assert!((0.0..=100.0).contains(&metrics.miou));
        assert_ne!(model.state_dict(), before);
    }
}
