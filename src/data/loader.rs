use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::data::episode::{Batch, Episode};
use crate::data::source::EpisodeSource;
use crate::error::{Error, Result};

/// Cuts an `EpisodeSource` into ordered batches.
///
/// With `nworker > 1` the episodes of a batch are decoded on scoped worker
/// threads. Episode order and every episode's seed are fixed before
/// dispatch, so output does not depend on the worker count.
pub struct DataLoader {
    dataset: Arc<dyn EpisodeSource>,
    batch_size: usize,
    nworker: usize,
    shuffle: bool,
}

impl DataLoader {
    pub fn new(dataset: Arc<dyn EpisodeSource>, batch_size: usize, nworker: usize, shuffle: bool) -> DataLoader {
        assert!(batch_size > 0, "batch_size must be at least 1");
        DataLoader { dataset, batch_size, nworker, shuffle }
    }

    pub fn dataset(&self) -> &dyn EpisodeSource {
        self.dataset.as_ref()
    }

    /// Number of batches per pass; the last one may be short.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// One pass over the dataset. All randomness (order, support sampling)
    /// comes from `rng`.
    pub fn iter(&self, mut rng: StdRng) -> Batches<'_> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut rng);
        }
        Batches { loader: self, order, pos: 0, rng }
    }

    fn load(&self, jobs: Vec<(usize, u64)>) -> Result<Vec<Episode>> {
        let load_one = |(idx, seed): (usize, u64)| {
            self.dataset.episode(idx, &mut StdRng::seed_from_u64(seed))
        };

        if self.nworker <= 1 || jobs.len() <= 1 {
            return jobs.into_iter().map(load_one).collect();
        }

        let per_worker = jobs.len().div_ceil(self.nworker);
        let chunks: Vec<Vec<(usize, u64)>> = jobs.chunks(per_worker).map(|c| c.to_vec()).collect();
        thread::scope(|s| -> Result<Vec<Episode>> {
            let handles: Vec<_> = chunks
                .into_iter()
                .map(|chunk| s.spawn(move || chunk.into_iter().map(load_one).collect::<Vec<_>>()))
                .collect();
            let mut episodes = Vec::with_capacity(jobs.len());
            for handle in handles {
                let loaded = handle
                    .join()
                    .map_err(|_| Error::Dataset("dataloader worker panicked".into()))?;
                for ep in loaded {
                    episodes.push(ep?);
                }
            }
            Ok(episodes)
        })
    }
}

/// Iterator over one pass of a `DataLoader`.
pub struct Batches<'a> {
    loader: &'a DataLoader,
    order: Vec<usize>,
    pos: usize,
    rng: StdRng,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.order.len() {
            return None;
        }
        let end = (self.pos + self.loader.batch_size).min(self.order.len());
        let jobs: Vec<(usize, u64)> = self.order[self.pos..end]
            .iter()
            .map(|&idx| (idx, self.rng.gen::<u64>()))
            .collect();
        self.pos = end;
        Some(self.loader.load(jobs).map(Batch::collate))
    }
}
