pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod optim;
pub mod error;
pub mod device;
pub mod config;
pub mod data;
pub mod model;
pub mod eval;
pub mod checkpoint;
pub mod logging;
pub mod train;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use optim::sgd::Sgd;
pub use optim::scheduler::ExponentialLr;
pub use error::{Error, Result};
pub use device::Device;
pub use config::Config;
pub use data::{Batch, Benchmark, DataLoader, EpisodeSource, FolderDataset, Split};
pub use model::{Backbone, MshNet, SegmentationModel};
pub use checkpoint::{CheckpointDir, StartState};
pub use logging::{RunLogger, ScalarWriter};
pub use train::{Mode, RunReport, SeedControl, Trainer};
