use std::path::PathBuf;

use chrono::Local;
use clap::Parser;

use crate::data::benchmark::{Benchmark, NFOLDS};
use crate::error::{Error, Result};
use crate::model::backbone::Backbone;

/// Run options for few-shot segmentation training.
#[derive(Parser, Debug, Clone)]
#[command(name = "mshnet-train", about = "Train MSHNet for few-shot semantic segmentation")]
pub struct Config {
    /// Dataset root holding one directory per benchmark.
    #[arg(long, default_value = "../dataset")]
    pub datapath: PathBuf,

    /// Checkpoint directory (resume.json, weight.json, best snapshots).
    #[arg(long, default_value = "./resume")]
    pub save_path: PathBuf,

    #[arg(long, value_enum, default_value_t = Benchmark::Pascal)]
    pub benchmark: Benchmark,

    /// Run name under `logs/`; a timestamped name when empty.
    #[arg(long, default_value = "")]
    pub logpath: String,

    #[arg(long, default_value_t = 16)]
    pub bsz: usize,

    #[arg(long, default_value_t = 1)]
    pub shot: usize,

    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    #[arg(long, default_value_t = 0.00005)]
    pub weight_decay: f64,

    #[arg(long, default_value_t = 0.025)]
    pub lr: f64,

    /// Number of epochs.
    #[arg(long, default_value_t = 300)]
    pub niter: usize,

    #[arg(long, default_value_t = 4)]
    pub nworker: usize,

    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..NFOLDS as i64))]
    pub fold: u8,

    #[arg(long, value_enum, default_value_t = Backbone::Resnet50)]
    pub backbone: Backbone,

    /// Side length images and masks are resized to.
    #[arg(long, default_value_t = 473)]
    pub img_size: u32,
}

impl Config {
    /// Checks what clap cannot express.
    pub fn validate(&self) -> Result<()> {
        let sizes = [("bsz", self.bsz), ("shot", self.shot), ("img_size", self.img_size as usize)];
        for (name, value) in sizes {
            if value == 0 {
                return Err(Error::Config(format!("{} must be at least 1", name)));
            }
        }
        if self.lr.is_nan() || self.lr <= 0.0 {
            return Err(Error::Config(format!("lr must be positive, got {}", self.lr)));
        }
        if self.fold >= NFOLDS {
            return Err(Error::Config(format!("fold must be below {}, got {}", NFOLDS, self.fold)));
        }
        Ok(())
    }

    /// `logs/<logpath>.log`, with a timestamp standing in for an empty name.
    pub fn log_dir(&self) -> PathBuf {
        let name = if self.logpath.is_empty() {
            Local::now().format("train_%m%d_%H%M%S").to_string()
        } else {
            self.logpath.clone()
        };
        PathBuf::from("logs").join(format!("{}.log", name))
    }

    /// Argument table logged at startup.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("datapath", self.datapath.display().to_string()),
            ("save_path", self.save_path.display().to_string()),
            ("benchmark", self.benchmark.to_string()),
            ("logpath", self.logpath.clone()),
            ("bsz", self.bsz.to_string()),
            ("shot", self.shot.to_string()),
            ("momentum", self.momentum.to_string()),
            ("weight_decay", self.weight_decay.to_string()),
            ("lr", self.lr.to_string()),
            ("niter", self.niter.to_string()),
            ("nworker", self.nworker.to_string()),
            ("fold", self.fold.to_string()),
            ("backbone", self.backbone.to_string()),
            ("img_size", self.img_size.to_string()),
        ]
    }
}
