pub mod benchmark;
pub mod episode;
pub mod folder;
pub mod image;
pub mod loader;
pub mod source;
pub mod synthetic;

pub use benchmark::{Benchmark, Split, NFOLDS};
pub use episode::{Batch, Episode};
pub use folder::FolderDataset;
pub use self::image::{Image, Mask};
pub use loader::DataLoader;
pub use source::EpisodeSource;
pub use synthetic::SyntheticSource;
