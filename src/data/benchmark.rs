use std::fmt;

use clap::ValueEnum;
use serde::{Serialize, Deserialize};

/// Number of cross-validation folds for the fold-based benchmarks.
pub const NFOLDS: u8 = 4;

/// Few-shot segmentation benchmark. Fixes the class count and how classes
/// are partitioned into training and validation sets per fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Benchmark {
    /// PASCAL-5i: 20 classes, 5 held out per fold.
    Pascal,
    /// COCO-20i: 80 classes, every 4th class held out per fold.
    Coco,
    /// FSS-1000: 1000 classes with a fixed train / val split.
    Fss,
}

/// Which side of the class partition a loader serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Trn,
    Val,
}

impl Split {
    pub fn is_training(self) -> bool {
        matches!(self, Split::Trn)
    }
}

impl Benchmark {
    pub fn nclass(self) -> usize {
        match self {
            Benchmark::Pascal => 20,
            Benchmark::Coco => 80,
            Benchmark::Fss => 1000,
        }
    }

    /// Directory name under the dataset root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Benchmark::Pascal => "pascal",
            Benchmark::Coco => "coco",
            Benchmark::Fss => "fss",
        }
    }

    /// Class ids served for `split` under `fold`, in ascending order.
    ///
    /// FSS-1000 has no folds: classes 0..520 train and 520..760 validate.
    pub fn class_ids(self, fold: u8, split: Split) -> Vec<usize> {
        let fold = fold as usize;
        let val: Vec<usize> = match self {
            Benchmark::Pascal => {
                let per_fold = self.nclass() / NFOLDS as usize;
                (fold * per_fold..(fold + 1) * per_fold).collect()
            }
            Benchmark::Coco => {
                let per_fold = self.nclass() / NFOLDS as usize;
                (0..per_fold).map(|k| fold + NFOLDS as usize * k).collect()
            }
            Benchmark::Fss => {
                return match split {
                    Split::Trn => (0..520).collect(),
                    Split::Val => (520..760).collect(),
                };
            }
        };
        match split {
            Split::Val => val,
            Split::Trn => (0..self.nclass()).filter(|c| !val.contains(c)).collect(),
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Split::Trn => "trn",
            Split::Val => "val",
        })
    }
}
