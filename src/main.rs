use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use mshnet::data::{Benchmark, DataLoader, FolderDataset, Split};
use mshnet::optim::LR_GAMMA;
use mshnet::{CheckpointDir, Config, Device, ExponentialLr, MshNet, RunLogger, SegmentationModel, Sgd, Trainer};

fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;

    let log_dir = config.log_dir();
    let logger = RunLogger::initialize(&log_dir)
        .with_context(|| format!("creating run log directory {}", log_dir.display()))?;
    logger.log_args(&config.entries());

    let device = Device::detect();

    let mut model = MshNet::new(config.backbone, config.shot, &mut StdRng::from_entropy());
    let n_params = model.trainable_params().len();
    let optimizer = Sgd::new(config.lr, config.momentum, config.weight_decay, n_params);
    let scheduler = ExponentialLr::new(&optimizer, LR_GAMMA);

    let train_loader = loader(&config, Split::Trn, true)?;
    let val_loader = loader(&config, Split::Val, false)?;

    let report = Trainer::new(
        model,
        optimizer,
        scheduler,
        train_loader,
        val_loader,
        CheckpointDir::new(&config.save_path),
        logger,
        config.niter,
    )
    .with_device(device)
    .run()
    .context("training failed")?;

    info!("best val. mIoU: {:5.2} over epochs {}..{}", report.best_miou, report.start_epoch, report.final_epoch);
    Ok(())
}

fn loader(config: &Config, split: Split, shuffle: bool) -> Result<DataLoader> {
    let dataset = FolderDataset::new(
        &config.datapath,
        config.benchmark,
        config.fold,
        split,
        config.shot,
        config.img_size,
    )
    .with_context(|| describe(config.benchmark, split))?;
    Ok(DataLoader::new(Arc::new(dataset), config.bsz, config.nworker, shuffle))
}

fn describe(benchmark: Benchmark, split: Split) -> String {
    format!("loading {} {} split", benchmark, split)
}
