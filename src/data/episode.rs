use crate::data::image::{Image, Mask};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::loss::cross_entropy::IGNORE_INDEX;

/// One few-shot episode: a query to segment and `shot` labelled supports of
/// the same class.
#[derive(Debug, Clone)]
pub struct Episode {
    pub query_img: Image,
    pub query_mask: Mask,
    pub support_imgs: Vec<Image>,
    pub support_masks: Vec<Mask>,
    pub class_id: usize,
}

/// A collated batch of episodes. Entry `i` of every field belongs to
/// episode `i`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub query_img: Vec<Image>,
    pub support_imgs: Vec<Vec<Image>>,
    pub support_masks: Vec<Vec<Mask>>,
    pub query_mask: Vec<Mask>,
    pub class_id: Vec<usize>,
    pub device: Device,
}

impl Batch {
    pub fn collate(episodes: Vec<Episode>) -> Batch {
        let mut batch = Batch {
            query_img: Vec::with_capacity(episodes.len()),
            support_imgs: Vec::with_capacity(episodes.len()),
            support_masks: Vec::with_capacity(episodes.len()),
            query_mask: Vec::with_capacity(episodes.len()),
            class_id: Vec::with_capacity(episodes.len()),
            device: Device::Cpu,
        };
        for ep in episodes {
            batch.query_img.push(ep.query_img);
            batch.support_imgs.push(ep.support_imgs);
            batch.support_masks.push(ep.support_masks);
            batch.query_mask.push(ep.query_mask);
            batch.class_id.push(ep.class_id);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.query_img.len()
    }

    pub fn is_empty(&self) -> bool {
        self.query_img.is_empty()
    }

    pub fn to_device(mut self, device: Device) -> Batch {
        self.device = device;
        self
    }

    /// Checks the contract the model relies on: equal stack lengths, at
    /// least one support per episode, masks matching their images and mask
    /// labels in {0, 1, `IGNORE_INDEX`}.
    pub fn validate(&self) -> Result<()> {
        let n = self.query_img.len();
        if n == 0 {
            return Err(Error::MalformedBatch("batch holds no episodes".into()));
        }
        for (field, len) in [
            ("support_imgs", self.support_imgs.len()),
            ("support_masks", self.support_masks.len()),
            ("query_mask", self.query_mask.len()),
            ("class_id", self.class_id.len()),
        ] {
            if len != n {
                return Err(Error::MalformedBatch(format!(
                    "{field} has {len} entries, query_img has {n}"
                )));
            }
        }
        for i in 0..n {
            let (imgs, masks) = (&self.support_imgs[i], &self.support_masks[i]);
            if imgs.is_empty() {
                return Err(Error::MalformedBatch(format!("episode {i} has no support images")));
            }
            if imgs.len() != masks.len() {
                return Err(Error::MalformedBatch(format!(
                    "episode {i}: {} support images but {} support masks",
                    imgs.len(),
                    masks.len()
                )));
            }
            if !self.query_mask[i].same_size(&self.query_img[i]) {
                return Err(Error::MalformedBatch(format!("episode {i}: query mask size differs from image")));
            }
            if imgs.iter().zip(masks).any(|(img, mask)| !mask.same_size(img)) {
                return Err(Error::MalformedBatch(format!("episode {i}: support mask size differs from image")));
            }
            let labelled = std::iter::once(&self.query_mask[i]).chain(masks);
            if let Some(bad) = labelled.flat_map(|m| m.labels.iter()).find(|&&l| !is_valid_label(l)) {
                return Err(Error::MalformedBatch(format!(
                    "episode {i}: mask label {bad} is neither 0, 1 nor {IGNORE_INDEX}"
                )));
            }
        }
        Ok(())
    }
}

fn is_valid_label(label: u8) -> bool {
    label <= 1 || label == IGNORE_INDEX
}
