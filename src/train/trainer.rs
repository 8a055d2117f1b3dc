use std::time::Instant;

use log::info;

use crate::checkpoint::bundle::{CheckpointDir, ResumeBundle};
use crate::checkpoint::start_state::StartState;
use crate::data::loader::DataLoader;
use crate::device::Device;
use crate::error::Result;
use crate::logging::run_logger::RunLogger;
use crate::logging::scalar_writer::ScalarWriter;
use crate::model::SegmentationModel;
use crate::optim::scheduler::ExponentialLr;
use crate::optim::sgd::Sgd;
use crate::train::epoch::run_epoch;
use crate::train::epoch_stats::EpochStats;
use crate::train::mode::Mode;
use crate::train::seed::SeedControl;

/// The scheduler steps after every epoch divisible by this, except epoch 0.
pub const LR_STEP_EVERY: usize = 5;

/// What a finished run did, for callers and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Epoch the run started at (non-zero only when resumed).
    pub start_epoch: usize,
    pub history: Vec<EpochStats>,
    /// Epochs after whose training pass the scheduler stepped.
    pub scheduler_steps: Vec<usize>,
    /// Best validation mIoU seen by this run; `-inf` if no epoch ran.
    pub best_miou: f64,
    /// Always `niter`.
    pub final_epoch: usize,
}

/// Drives a run: resolve where to start, then train, checkpoint, adjust the
/// learning rate and validate once per epoch until `niter`.
pub struct Trainer<M: SegmentationModel> {
    model: M,
    optimizer: Sgd,
    scheduler: ExponentialLr,
    train_loader: DataLoader,
    val_loader: DataLoader,
    checkpoints: CheckpointDir,
    logger: RunLogger,
    seeds: SeedControl,
    device: Device,
    niter: usize,
}

impl<M: SegmentationModel> Trainer<M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: M,
        optimizer: Sgd,
        scheduler: ExponentialLr,
        train_loader: DataLoader,
        val_loader: DataLoader,
        checkpoints: CheckpointDir,
        logger: RunLogger,
        niter: usize,
    ) -> Trainer<M> {
        Trainer {
            model,
            optimizer,
            scheduler,
            train_loader,
            val_loader,
            checkpoints,
            logger,
            seeds: SeedControl::new(),
            device: Device::Cpu,
            niter,
        }
    }

    pub fn with_device(mut self, device: Device) -> Trainer<M> {
        self.device = device;
        self
    }

    pub fn with_seeds(mut self, seeds: SeedControl) -> Trainer<M> {
        self.seeds = seeds;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn optimizer(&self) -> &Sgd {
        &self.optimizer
    }

    pub fn scheduler(&self) -> &ExponentialLr {
        &self.scheduler
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn run(&mut self) -> Result<RunReport> {
        self.logger.log_params(self.model.param_counts());

        let start = StartState::resolve(&self.checkpoints)?;
        let start_epoch = self.apply_start(start)?;
        info!("start epoch: {}, lr: {}", start_epoch, self.optimizer.learning_rate);

        let mut scalars = ScalarWriter::open(self.logger.dir())?;
        let mut report = RunReport {
            start_epoch,
            history: Vec::new(),
            scheduler_steps: Vec::new(),
            best_miou: f64::NEG_INFINITY,
            final_epoch: self.niter,
        };

        for epoch in start_epoch..self.niter {
            let started = Instant::now();

            let train = run_epoch(
                epoch,
                &mut self.model,
                &self.train_loader,
                &mut self.optimizer,
                Mode::Train,
                &mut self.seeds,
                self.device,
            )?;

            self.checkpoints.save_resume(&ResumeBundle {
                epoch,
                state_dict: self.model.state_dict(),
                optimizer: self.optimizer.state(),
                lr: self.scheduler.state(),
            })?;

            if epoch % LR_STEP_EVERY == 0 && epoch != 0 {
                self.scheduler.step(&mut self.optimizer);
                report.scheduler_steps.push(epoch);
                info!("current lr: {}", self.optimizer.learning_rate);
            }

            let val = run_epoch(
                epoch,
                &mut self.model,
                &self.val_loader,
                &mut self.optimizer,
                Mode::Eval,
                &mut self.seeds,
                self.device,
            )?;

            let improved = val.miou > report.best_miou;
            if improved {
                report.best_miou = val.miou;
                let state = self.model.state_dict();
                self.logger.save_model_miou(&state, epoch, val.miou)?;
                self.checkpoints.save_best(epoch, val.miou, &state)?;
            }

            scalars.add_scalars("data/loss", &[("trn_loss", train.loss), ("val_loss", val.loss)], epoch)?;
            scalars.add_scalars("data/miou", &[("trn_miou", train.miou), ("val_miou", val.miou)], epoch)?;
            scalars.add_scalars("data/fb_iou", &[("trn_fb_iou", train.fb_iou), ("val_fb_iou", val.fb_iou)], epoch)?;
            scalars.flush()?;

            report.history.push(EpochStats {
                epoch,
                train,
                val,
                lr: self.optimizer.learning_rate,
                improved,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        scalars.close()?;
        info!("==================== Finished Training ====================");
        Ok(report)
    }

    /// Loads whatever the start state carries and returns the first epoch.
    fn apply_start(&mut self, start: StartState) -> Result<usize> {
        let epoch = start.epoch();
        match start {
            StartState::Resumed(bundle) => {
                self.model.load_state_dict(bundle.state_dict)?;
                self.optimizer.load_state(bundle.optimizer)?;
                self.scheduler.load_state(bundle.lr);
            }
            StartState::WeightsOnly(state) => self.model.load_state_dict(state)?,
            StartState::Fresh => {}
        }
        Ok(epoch)
    }
}
