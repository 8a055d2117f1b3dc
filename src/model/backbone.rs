use std::fmt;

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::data::image::Image;
use crate::layers::dense::Layer;
use crate::math::matrix::Matrix;

/// Channels fed to the first backbone layer: RGB plus the 3x3 neighbourhood
/// mean of RGB.
const INPUT_CHANNELS: usize = 6;

/// Seed for the frozen backbone weights, offset per architecture.
const BACKBONE_SEED: u64 = 0x5eed_ba5e;

/// Feature extractor architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backbone {
    Vgg16,
    Resnet50,
    Resnet101,
}

impl Backbone {
    /// Output width of each feature level, shallow to deep.
    pub fn level_widths(self) -> &'static [usize] {
        match self {
            Backbone::Vgg16 => &[8, 16],
            Backbone::Resnet50 => &[8, 16, 16],
            Backbone::Resnet101 => &[8, 16, 16, 16],
        }
    }

    fn activation(self) -> ActivationFunction {
        match self {
            Backbone::Vgg16 => ActivationFunction::ReLU,
            Backbone::Resnet50 | Backbone::Resnet101 => ActivationFunction::LeakyReLU { alpha: 0.01 },
        }
    }

    fn seed(self) -> u64 {
        BACKBONE_SEED + self as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            Backbone::Vgg16 => "vgg16",
            Backbone::Resnet50 => "resnet50",
            Backbone::Resnet101 => "resnet101",
        }
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frozen per-pixel feature extractor. Every layer's activation is kept as
/// one feature level; the weights are fixed for a given architecture and
/// never receive gradients.
#[derive(Debug, Clone)]
pub struct FrozenBackbone {
    pub kind: Backbone,
    pub layers: Vec<Layer>,
}

impl FrozenBackbone {
    pub fn new(kind: Backbone) -> FrozenBackbone {
        let mut rng = StdRng::seed_from_u64(kind.seed());
        let mut input_size = INPUT_CHANNELS;
        let layers = kind
            .level_widths()
            .iter()
            .map(|&width| {
                let layer = Layer::new(width, input_size, kind.activation(), &mut rng);
                input_size = width;
                layer
            })
            .collect();
        FrozenBackbone { kind, layers }
    }

    /// Feature maps (`pixels x width`) for every level.
    pub fn extract(&mut self, img: &Image) -> Vec<Matrix> {
        let mut current = Matrix::hstack(&[&img.pixels, &local_mean(img)]);
        let mut levels = Vec::with_capacity(self.layers.len());
        for layer in &mut self.layers {
            current = layer.forward(&current, false);
            levels.push(current.clone());
        }
        levels
    }

    pub fn param_count(&self) -> usize {
        self.layers.iter().map(Layer::param_count).sum()
    }
}

/// 3x3 box mean of each channel, clamped at the borders.
fn local_mean(img: &Image) -> Matrix {
    let (h, w) = (img.height, img.width);
    let mut out = Matrix::zeros(h * w, 3);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0; 3];
            let mut n = 0.0;
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let px = img.pixels.row(ny * w + nx);
                    for c in 0..3 {
                        acc[c] += px[c];
                    }
                    n += 1.0;
                }
            }
            let row = out.row_mut(y * w + x);
            for c in 0..3 {
                row[c] = acc[c] / n;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn architectures_are_reproducible_and_distinct() {
        let a = FrozenBackbone::new(Backbone::Resnet50);
        let b = FrozenBackbone::new(Backbone::Resnet50);
        assert_eq!(a.layers[0].weights, b.layers[0].weights);
        let v = FrozenBackbone::new(Backbone::Vgg16);
        assert_ne!(a.layers[0].weights, v.layers[0].weights);
        assert_eq!(FrozenBackbone::new(Backbone::Resnet101).layers.len(), 4);
    }

    #[test]
    fn extract_yields_one_map_per_level() {
        let mut bb = FrozenBackbone::new(Backbone::Vgg16);
        let img = Image::new(2, 3, Matrix::from_vec(6, 3, vec![0.5; 18]));
        let levels = bb.extract(&img);
        assert_eq!(levels.len(), 2);
        assert_eq!((levels[1].rows, levels[1].cols), (6, 16));
    }

    #[test]
    fn local_mean_of_constant_image_is_constant() {
        let img = Image::new(3, 3, Matrix::from_vec(9, 3, vec![2.0; 27]));
        assert!(local_mean(&img).data.iter().all(|&v| (v - 2.0).abs() < 1e-12));
    }
}
