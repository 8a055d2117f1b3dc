use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the training pipeline.
///
/// None of these are retried: every variant aborts the run and is reported
/// to the operator.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration detected after argument parsing.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A batch violated the shape contract between dataloader and model.
    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    /// A state dict or checkpoint does not fit the model / optimizer it is loaded into.
    #[error("checkpoint mismatch: {0}")]
    StateMismatch(String),

    /// Backward pass requested without the activations it needs.
    #[error("autograd: {0}")]
    Autograd(String),

    /// Reading or writing a checkpoint file failed.
    #[error("checkpoint {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// The dataset on disk does not satisfy the episode sampler.
    #[error("dataset: {0}")]
    Dataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Attaches the checkpoint path to an I/O or decoding failure.
    pub fn at_checkpoint(path: impl Into<PathBuf>, source: Error) -> Error {
        Error::Checkpoint { path: path.into(), source: Box::new(source) }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
