use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::data::benchmark::{Benchmark, Split};
use crate::data::episode::Episode;
use crate::data::image::{Image, Mask};
use crate::data::source::EpisodeSource;
use crate::error::{Error, Result};

const MASK_SUFFIX: &str = "_mask";
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Episodes read from an on-disk class-per-directory layout:
///
/// ```text
/// <datapath>/<benchmark>/<class_id>/<stem>.jpg
/// <datapath>/<benchmark>/<class_id>/<stem>_mask.png
/// ```
///
/// Every image of every class in the split is one query. Its supports are
/// `shot` other images of the same class, drawn per episode. Each class of
/// the split must have its directory; metrics average over all of them.
pub struct FolderDataset {
    benchmark: Benchmark,
    split: Split,
    shot: usize,
    img_size: u32,
    class_ids: Vec<usize>,
    images_by_class: BTreeMap<usize, Vec<PathBuf>>,
    queries: Vec<(usize, usize)>,
}

impl FolderDataset {
    pub fn new(
        datapath: &Path,
        benchmark: Benchmark,
        fold: u8,
        split: Split,
        shot: usize,
        img_size: u32,
    ) -> Result<FolderDataset> {
        let root = datapath.join(benchmark.dir_name());
        let class_ids = benchmark.class_ids(fold, split);

        let mut images_by_class = BTreeMap::new();
        for &class_id in &class_ids {
            let dir = root.join(class_id.to_string());
            if !dir.is_dir() {
                return Err(Error::Dataset(format!(
                    "{} {} split (fold {}) needs class {}, but {} is missing",
                    benchmark,
                    split,
                    fold,
                    class_id,
                    dir.display()
                )));
            }
            let images = list_images(&dir)?;
            if images.len() < shot + 1 {
                return Err(Error::Dataset(format!(
                    "class {} has {} images, {}-shot episodes need at least {}",
                    class_id,
                    images.len(),
                    shot,
                    shot + 1
                )));
            }
            images_by_class.insert(class_id, images);
        }

        let queries: Vec<(usize, usize)> = images_by_class
            .iter()
            .flat_map(|(&class_id, images)| (0..images.len()).map(move |i| (class_id, i)))
            .collect();
        if queries.is_empty() {
            return Err(Error::Dataset(format!(
                "no {} episodes for {} fold {} under {}",
                split,
                benchmark,
                fold,
                root.display()
            )));
        }

        info!(
            "Total # images in {} {} (fold {}): {} over {} classes",
            benchmark,
            split,
            fold,
            queries.len(),
            images_by_class.len()
        );

        Ok(FolderDataset {
            benchmark,
            split,
            shot,
            img_size,
            class_ids,
            images_by_class,
            queries,
        })
    }

    pub fn split(&self) -> Split {
        self.split
    }

    fn load_pair(&self, path: &Path) -> Result<(Image, Mask)> {
        let img = image::open(path)?.to_rgb8();
        let mask = image::open(mask_path(path))?.to_luma8();
        Ok((Image::from_rgb(&img, self.img_size), Mask::from_luma(&mask, self.img_size)))
    }
}

impl EpisodeSource for FolderDataset {
    fn benchmark(&self) -> Benchmark {
        self.benchmark
    }

    fn class_ids(&self) -> &[usize] {
        &self.class_ids
    }

    fn len(&self) -> usize {
        self.queries.len()
    }

    fn episode(&self, idx: usize, rng: &mut StdRng) -> Result<Episode> {
        let &(class_id, query_idx) = self
            .queries
            .get(idx)
            .ok_or_else(|| Error::Dataset(format!("episode index {} out of range", idx)))?;
        let images = &self.images_by_class[&class_id];

        let candidates: Vec<usize> = (0..images.len()).filter(|&i| i != query_idx).collect();
        let supports: Vec<usize> = candidates.choose_multiple(rng, self.shot).cloned().collect();

        let (query_img, query_mask) = self.load_pair(&images[query_idx])?;
        let mut support_imgs = Vec::with_capacity(self.shot);
        let mut support_masks = Vec::with_capacity(self.shot);
        for i in supports {
            let (img, mask) = self.load_pair(&images[i])?;
            support_imgs.push(img);
            support_masks.push(mask);
        }

        Ok(Episode { query_img, query_mask, support_imgs, support_masks, class_id })
    }
}

/// `dir/abc.jpg` -> `dir/abc_mask.png`
fn mask_path(image: &Path) -> PathBuf {
    let stem = image.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    image.with_file_name(format!("{stem}{MASK_SUFFIX}.png"))
}

/// Query images in `dir`, sorted by name. Every image needs a mask beside it.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        let is_mask = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.ends_with(MASK_SUFFIX))
            .unwrap_or(false);
        if !is_image || is_mask {
            continue;
        }
        if !mask_path(&path).is_file() {
            return Err(Error::Dataset(format!("{} has no mask", path.display())));
        }
        images.push(path);
    }
    images.sort();
    Ok(images)
}
