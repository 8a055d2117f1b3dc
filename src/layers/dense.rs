use rand::Rng;

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};
use crate::error::{Error, Result};

/// A trainable tensor paired with its accumulated gradient, as handed to
/// the optimizer.
pub struct ParamMut<'a> {
    pub name: String,
    pub value: &'a mut Matrix,
    pub grad: &'a Matrix,
}

/// Fully connected layer applied row-wise: `a = act(X W + b)`.
///
/// `X` is `n x input_size` (one row per pixel), `W` is `input_size x size`
/// and `b` is a `1 x size` row broadcast over all rows.
#[derive(Debug, Clone)]
pub struct Layer {
    pub size: usize,
    pub input_size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
    grad_weights: Matrix,
    grad_biases: Matrix,
    // Forward caches; only populated when the caller asks to keep them.
    input: Option<Matrix>,
    pre_neurons: Option<Matrix>,
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let weights = match activation {
            ActivationFunction::Identity => Matrix::xavier(input_size, size, rng),
            _ => Matrix::he(input_size, size, rng),
        };
        Layer {
            size,
            input_size,
            weights,
            biases: Matrix::zeros(1, size),
            activator: activation,
            grad_weights: Matrix::zeros(input_size, size),
            grad_biases: Matrix::zeros(1, size),
            input: None,
            pre_neurons: None,
        }
    }

    /// Forward pass over a batch of rows. With `keep_cache` the input and
    /// pre-activation are retained for `backward`.
    pub fn forward(&mut self, input: &Matrix, keep_cache: bool) -> Matrix {
        let mut z = input * &self.weights;
        z.add_row(&self.biases);
        let a = z.map(|x| self.activator.function(x));
        if keep_cache {
            self.input = Some(input.clone());
            self.pre_neurons = Some(z);
        } else {
            self.input = None;
            self.pre_neurons = None;
        }
        a
    }

    /// Accumulates parameter gradients for `grad_out` (dL/da, same shape as
    /// the last output) and returns dL/dX.
    pub fn backward(&mut self, grad_out: &Matrix) -> Result<Matrix> {
        let (input, z) = match (&self.input, &self.pre_neurons) {
            (Some(input), Some(z)) => (input, z),
            _ => {
                return Err(Error::Autograd(
                    "backward called without a cached training-mode forward pass".into(),
                ))
            }
        };
        if !grad_out.same_shape(z) {
            return Err(Error::Autograd(format!(
                "gradient shape {}x{} does not match layer output {}x{}",
                grad_out.rows, grad_out.cols, z.rows, z.cols
            )));
        }

        // Hadamard product: delta = dL/da * act'(z)
        let act_derivative = z.map(|x| self.activator.derivative(x));
        let delta = grad_out.hadamard(&act_derivative);

        let w_grad = &input.transpose() * &delta;
        self.grad_weights.axpy(1.0, &w_grad);
        self.grad_biases.axpy(1.0, &delta.sum_rows());

        Ok(&delta * &self.weights.transpose())
    }

    pub fn zero_grad(&mut self) {
        self.grad_weights.fill(0.0);
        self.grad_biases.fill(0.0);
    }

    pub fn grads(&self) -> (&Matrix, &Matrix) {
        (&self.grad_weights, &self.grad_biases)
    }

    /// Weights and biases with their gradients, named `<prefix>.weight` / `<prefix>.bias`.
    pub fn params_mut(&mut self, prefix: &str) -> [ParamMut<'_>; 2] {
        [
            ParamMut {
                name: format!("{prefix}.weight"),
                value: &mut self.weights,
                grad: &self.grad_weights,
            },
            ParamMut {
                name: format!("{prefix}.bias"),
                value: &mut self.biases,
                grad: &self.grad_biases,
            },
        ]
    }

    pub fn param_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Replaces weights and biases, checking shapes.
    pub fn load(&mut self, weights: Matrix, biases: Matrix) -> Result<()> {
        if !weights.same_shape(&self.weights) || !biases.same_shape(&self.biases) {
            return Err(Error::StateMismatch(format!(
                "layer expects {}x{} weights, got {}x{}",
                self.weights.rows, self.weights.cols, weights.rows, weights.cols
            )));
        }
        self.weights = weights;
        self.biases = biases;
        Ok(())
    }
}
