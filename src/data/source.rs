use rand::rngs::StdRng;

use crate::data::benchmark::Benchmark;
use crate::data::episode::Episode;
use crate::error::Result;

/// An indexable collection of few-shot episodes for one split.
///
/// Support sampling may be random; implementations must draw only from the
/// `rng` they are given so that a fixed seed yields identical episodes.
pub trait EpisodeSource: Send + Sync {
    fn benchmark(&self) -> Benchmark;

    /// Size of the label space metrics are accumulated over.
    fn nclass(&self) -> usize {
        self.benchmark().nclass()
    }

    /// Classes this split serves; metrics average over these only.
    fn class_ids(&self) -> &[usize];

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn episode(&self, idx: usize, rng: &mut StdRng) -> Result<Episode>;
}
