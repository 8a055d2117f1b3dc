use rand::Rng;

use crate::math::matrix::Matrix;
use crate::error::{Error, Result};

/// Inverted dropout: in training mode each unit is zeroed with probability
/// `p` and survivors are scaled by `1 / (1 - p)`; in evaluation mode it is
/// the identity.
#[derive(Debug, Clone)]
pub struct Dropout {
    pub p: f64,
    mask: Option<Matrix>,
}

impl Dropout {
    pub fn new(p: f64) -> Dropout {
        assert!((0.0..1.0).contains(&p), "dropout probability must be in [0, 1)");
        Dropout { p, mask: None }
    }

    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Matrix, training: bool, rng: &mut R) -> Matrix {
        if !training || self.p == 0.0 {
            self.mask = None;
            return input.clone();
        }
        let keep = 1.0 / (1.0 - self.p);
        let mask = input.map(|_| if rng.gen::<f64>() < self.p { 0.0 } else { keep });
        let out = input.hadamard(&mask);
        self.mask = Some(mask);
        out
    }

    pub fn backward(&self, grad_out: &Matrix) -> Result<Matrix> {
        match &self.mask {
            Some(mask) => Ok(grad_out.hadamard(mask)),
            None if self.p == 0.0 => Ok(grad_out.clone()),
            None => Err(Error::Autograd("dropout backward without a training-mode forward".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn eval_mode_is_identity() {
        let mut d = Dropout::new(0.5);
        let x = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0]]);
        assert_eq!(d.forward(&x, false, &mut StdRng::seed_from_u64(1)), x);
    }

    #[test]
    fn training_mode_scales_survivors() {
        let mut d = Dropout::new(0.5);
        let x = Matrix::from_vec(1, 64, vec![1.0; 64]);
        let y = d.forward(&x, true, &mut StdRng::seed_from_u64(1));
        assert!(y.data.iter().all(|&v| v == 0.0 || v == 2.0));
        assert!(y.data.iter().any(|&v| v == 0.0));
    }
}
