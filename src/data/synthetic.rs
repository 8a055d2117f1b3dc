use rand::rngs::StdRng;
use rand::Rng;

use crate::data::benchmark::Benchmark;
use crate::data::episode::Episode;
use crate::data::image::{Image, Mask};
use crate::data::source::EpisodeSource;
use crate::error::Result;
use crate::math::matrix::Matrix;

/// In-memory episodes: a bright square of a class-specific colour on a
/// noisy dark background. Square placement and noise come from the episode
/// rng. Used for smoke runs and tests without a dataset on disk.
pub struct SyntheticSource {
    benchmark: Benchmark,
    class_ids: Vec<usize>,
    len: usize,
    size: usize,
    shot: usize,
}

impl SyntheticSource {
    pub fn new(benchmark: Benchmark, class_ids: Vec<usize>, len: usize, size: usize, shot: usize) -> SyntheticSource {
        assert!(!class_ids.is_empty(), "synthetic source needs at least one class");
        assert!(size >= 2, "synthetic images must be at least 2x2");
        SyntheticSource { benchmark, class_ids, len, size, shot }
    }

    fn sample(&self, class_id: usize, rng: &mut StdRng) -> (Image, Mask) {
        let n = self.size;
        let side = n / 2;
        let top = rng.gen_range(0..=n - side);
        let left = rng.gen_range(0..=n - side);
        let colour = [
            1.0 + (class_id % 3) as f64 * 0.5,
            1.5 - (class_id % 2) as f64 * 0.5,
            2.0,
        ];

        let mut pixels = Matrix::zeros(n * n, 3);
        let mut labels = vec![0u8; n * n];
        for y in 0..n {
            for x in 0..n {
                let i = y * n + x;
                let inside = (top..top + side).contains(&y) && (left..left + side).contains(&x);
                for c in 0..3 {
                    let noise = rng.gen_range(-0.1..0.1);
                    let base = if inside { colour[c] } else { -1.0 };
                    pixels.set(i, c, base + noise);
                }
                if inside {
                    labels[i] = 1;
                }
            }
        }
        (Image::new(n, n, pixels), Mask::new(n, n, labels))
    }
}

impl EpisodeSource for SyntheticSource {
    fn benchmark(&self) -> Benchmark {
        self.benchmark
    }

    fn class_ids(&self) -> &[usize] {
        &self.class_ids
    }

    fn len(&self) -> usize {
        self.len
    }

    fn episode(&self, idx: usize, rng: &mut StdRng) -> Result<Episode> {
        let class_id = self.class_ids[idx % self.class_ids.len()];
        let (query_img, query_mask) = self.sample(class_id, rng);
        let (support_imgs, support_masks) = (0..self.shot).map(|_| self.sample(class_id, rng)).unzip();
        Ok(Episode { query_img, query_mask, support_imgs, support_masks, class_id })
    }
}
