use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::layers::dense::ParamMut;
use crate::math::matrix::Matrix;

/// Serializable optimizer state: hyperparameters, current learning rate and
/// one momentum buffer per bound parameter (by position).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgdState {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    pub momentum_buffers: Vec<Option<Matrix>>,
}

/// SGD with momentum and L2 weight decay, bound to a fixed list of
/// parameters.
///
/// Per parameter `p` with gradient `g`:
/// ```text
/// d   = g + weight_decay * p
/// buf = d                      (first step)
/// buf = momentum * buf + d     (later steps)
/// p   = p - lr * buf
/// ```
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    n_params: usize,
    momentum_buffers: Vec<Option<Matrix>>,
}

impl Sgd {
    pub fn new(learning_rate: f64, momentum: f64, weight_decay: f64, n_params: usize) -> Sgd {
        Sgd {
            learning_rate,
            momentum,
            weight_decay,
            n_params,
            momentum_buffers: vec![None; n_params],
        }
    }

    /// Applies one update to every bound parameter given its accumulated gradient.
    pub fn step(&mut self, params: &mut [ParamMut<'_>]) -> Result<()> {
        if params.len() != self.n_params {
            return Err(Error::StateMismatch(format!(
                "optimizer bound to {} parameters, step received {}",
                self.n_params,
                params.len()
            )));
        }

        for (param, buf) in params.iter_mut().zip(self.momentum_buffers.iter_mut()) {
            if !param.value.same_shape(param.grad) {
                return Err(Error::StateMismatch(format!("gradient shape mismatch for {}", param.name)));
            }

            let mut d_p = param.grad.clone();
            if self.weight_decay != 0.0 {
                d_p.axpy(self.weight_decay, param.value);
            }

            if self.momentum != 0.0 {
                match buf {
                    Some(b) if b.same_shape(&d_p) => {
                        *b = b.map(|x| x * self.momentum);
                        b.axpy(1.0, &d_p);
                    }
                    Some(_) => {
                        return Err(Error::StateMismatch(format!(
                            "momentum buffer shape mismatch for {}",
                            param.name
                        )))
                    }
                    None => *buf = Some(d_p.clone()),
                }
                if let Some(b) = buf {
                    d_p = b.clone();
                }
            }

            param.value.axpy(-self.learning_rate, &d_p);
        }

        Ok(())
    }

    pub fn state(&self) -> SgdState {
        SgdState {
            learning_rate: self.learning_rate,
            momentum: self.momentum,
            weight_decay: self.weight_decay,
            momentum_buffers: self.momentum_buffers.clone(),
        }
    }

    /// Restores a previously saved state. The buffer count must match the
    /// number of bound parameters.
    pub fn load_state(&mut self, state: SgdState) -> Result<()> {
        if state.momentum_buffers.len() != self.n_params {
            return Err(Error::StateMismatch(format!(
                "optimizer state holds {} buffers, optimizer is bound to {} parameters",
                state.momentum_buffers.len(),
                self.n_params
            )));
        }
        self.learning_rate = state.learning_rate;
        self.momentum = state.momentum;
        self.weight_decay = state.weight_decay;
        self.momentum_buffers = state.momentum_buffers;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_once(opt: &mut Sgd, value: &mut Matrix, grad: &Matrix) {
        let mut params = [ParamMut { name: "w".into(), value, grad }];
        opt.step(&mut params).unwrap();
    }

    #[test]
    fn momentum_and_weight_decay_follow_the_update_rule() {
        let mut opt = Sgd::new(0.1, 0.9, 0.5, 1);
        let mut w = Matrix::from_rows(vec![vec![1.0]]);
        let g = Matrix::from_rows(vec![vec![2.0]]);

        // d = 2 + 0.5 * 1 = 2.5; buf = 2.5; w = 1 - 0.25
        step_once(&mut opt, &mut w, &g);
        assert!((w.get(0, 0) - 0.75).abs() < 1e-12);

        // d = 2 + 0.5 * 0.75 = 2.375; buf = 0.9 * 2.5 + 2.375 = 4.625
        step_once(&mut opt, &mut w, &g);
        assert!((w.get(0, 0) - (0.75 - 0.4625)).abs() < 1e-12);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut opt = Sgd::new(0.025, 0.9, 5e-5, 1);
        let mut w = Matrix::from_rows(vec![vec![1.0, -1.0]]);
        let g = Matrix::from_rows(vec![vec![0.3, 0.1]]);
        step_once(&mut opt, &mut w, &g);

        let json = serde_json::to_string(&opt.state()).unwrap();
        let mut restored = Sgd::new(1.0, 0.0, 0.0, 1);
        restored.load_state(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.state(), opt.state());
    }

    #[test]
    fn rejects_state_for_a_different_parameter_set() {
        let mut opt = Sgd::new(0.1, 0.9, 0.0, 2);
        let other = Sgd::new(0.1, 0.9, 0.0, 3).state();
        assert!(opt.load_state(other).is_err());
    }
}
