use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

use crate::loss::cross_entropy::IGNORE_INDEX;
use crate::math::matrix::Matrix;

/// ImageNet channel statistics used to normalize RGB inputs.
const MEAN: [f64; 3] = [0.485, 0.456, 0.406];
const STD: [f64; 3] = [0.229, 0.224, 0.225];

/// Normalized RGB image stored as a `(height * width) x 3` matrix, one row
/// per pixel in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub height: usize,
    pub width: usize,
    pub pixels: Matrix,
}

/// Per-pixel segmentation labels: 0 background, 1 foreground,
/// `IGNORE_INDEX` for pixels excluded from loss and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub height: usize,
    pub width: usize,
    pub labels: Vec<u8>,
}

impl Image {
    pub fn new(height: usize, width: usize, pixels: Matrix) -> Image {
        assert_eq!(pixels.rows, height * width, "pixel rows must equal height * width");
        assert_eq!(pixels.cols, 3, "images carry three channels");
        Image { height, width, pixels }
    }

    /// Resizes to `size x size` and normalizes with the ImageNet statistics.
    pub fn from_rgb(img: &RgbImage, size: u32) -> Image {
        let resized = imageops::resize(img, size, size, FilterType::Triangle);
        let mut pixels = Matrix::zeros((size * size) as usize, 3);
        for (i, px) in resized.pixels().enumerate() {
            for c in 0..3 {
                let v = px.0[c] as f64 / 255.0;
                pixels.set(i, c, (v - MEAN[c]) / STD[c]);
            }
        }
        Image::new(size as usize, size as usize, pixels)
    }

    pub fn num_pixels(&self) -> usize {
        self.height * self.width
    }
}

impl Mask {
    pub fn new(height: usize, width: usize, labels: Vec<u8>) -> Mask {
        assert_eq!(labels.len(), height * width, "label count must equal height * width");
        Mask { height, width, labels }
    }

    /// Resizes with nearest-neighbour sampling so labels stay crisp, then
    /// thresholds: below 64 is background, above 191 foreground, anything
    /// in between is a boundary pixel and ignored.
    pub fn from_luma(img: &GrayImage, size: u32) -> Mask {
        let resized = imageops::resize(img, size, size, FilterType::Nearest);
        let labels = resized
            .pixels()
            .map(|px| match px.0[0] {
                0..=63 => 0,
                192..=255 => 1,
                _ => IGNORE_INDEX,
            })
            .collect();
        Mask::new(size as usize, size as usize, labels)
    }

    pub fn foreground_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    pub fn same_size(&self, img: &Image) -> bool {
        self.height == img.height && self.width == img.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn mask_thresholds_into_three_labels() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 0, Luma([128]));
        img.put_pixel(2, 0, Luma([255]));
        let mask = Mask::from_luma(&img, 3);
        assert_eq!(&mask.labels[..3], &[0, IGNORE_INDEX, 1]);
    }

    #[test]
    fn rgb_is_normalized_per_channel() {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([255, 255, 255]));
        let out = Image::from_rgb(&img, 2);
        assert_eq!(out.num_pixels(), 4);
        assert!((out.pixels.get(0, 0) - (1.0 - 0.485) / 0.229).abs() < 1e-9);
    }
}
