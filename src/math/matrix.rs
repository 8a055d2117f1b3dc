use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::{Add, Sub, Mul};

/// Dense row-major matrix of `f64`.
///
/// Feature maps are stored as `pixels x channels`, so one row is one pixel
/// and every layer of the network is a plain matrix product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Wraps a flat row-major buffer. Panics if the length does not match.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Matrix {
        assert_eq!(data.len(), rows * cols, "buffer length does not match {}x{}", rows, cols);
        Matrix { rows, cols, data }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Matrix {
        let n = rows.len();
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        Matrix::from_vec(n, cols, data)
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both draws in (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Xavier (Glorot) initialization: N(0, sqrt(1 / rows)).
    ///
    /// Weights are laid out `fan_in x fan_out`, so `rows` is the fan-in.
    pub fn xavier<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let std_dev = (1.0 / rows.max(1) as f64).sqrt();
        let data = (0..rows * cols)
            .map(|_| Matrix::sample_standard_normal(rng) * std_dev)
            .collect();
        Matrix { rows, cols, data }
    }

    /// He initialization: N(0, sqrt(2 / rows)). Used before ReLU layers.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let std_dev = (2.0 / rows.max(1) as f64).sqrt();
        let data = (0..rows * cols)
            .map(|_| Matrix::sample_standard_normal(rng) * std_dev)
            .collect();
        Matrix { rows, cols, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn same_shape(&self, other: &Matrix) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        res
    }

    pub fn map<F>(&self, mut functor: F) -> Matrix
    where
        F: FnMut(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Element-wise (Hadamard) product of two same-shape matrices.
    pub fn hadamard(&self, other: &Matrix) -> Matrix {
        assert!(self.same_shape(other), "Matrices are of incorrect sizes");
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a * b).collect(),
        }
    }

    /// Adds a `1 x cols` row vector to every row.
    pub fn add_row(&mut self, bias: &Matrix) {
        assert!(bias.rows == 1 && bias.cols == self.cols, "bias must be 1x{}", self.cols);
        for chunk in self.data.chunks_mut(self.cols.max(1)) {
            for (x, b) in chunk.iter_mut().zip(&bias.data) {
                *x += b;
            }
        }
    }

    /// Column sums as a `1 x cols` row vector.
    pub fn sum_rows(&self) -> Matrix {
        let mut res = Matrix::zeros(1, self.cols);
        for chunk in self.data.chunks(self.cols.max(1)) {
            for (acc, x) in res.data.iter_mut().zip(chunk) {
                *acc += x;
            }
        }
        res
    }

    /// `self += alpha * other`
    pub fn axpy(&mut self, alpha: f64, other: &Matrix) {
        assert!(self.same_shape(other), "Matrices are of incorrect sizes");
        for (x, y) in self.data.iter_mut().zip(&other.data) {
            *x += alpha * y;
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Index of the largest value in each row. Ties resolve to the lowest index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        (0..self.rows)
            .map(|r| {
                let row = self.row(r);
                let mut best = 0;
                for (i, &v) in row.iter().enumerate().skip(1) {
                    if v > row[best] {
                        best = i;
                    }
                }
                best
            })
            .collect()
    }

    /// Concatenates matrices with equal row counts along the column axis.
    pub fn hstack(parts: &[&Matrix]) -> Matrix {
        let rows = parts.first().map(|m| m.rows).unwrap_or(0);
        assert!(parts.iter().all(|m| m.rows == rows), "Matrices are of incorrect sizes");
        let cols: usize = parts.iter().map(|m| m.cols).sum();
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for m in parts {
                data.extend_from_slice(m.row(r));
            }
        }
        Matrix { rows, cols, data }
    }

    /// Concatenates matrices with equal column counts along the row axis.
    pub fn vstack(parts: &[&Matrix]) -> Matrix {
        let cols = parts.first().map(|m| m.cols).unwrap_or(0);
        assert!(parts.iter().all(|m| m.cols == cols), "Matrices are of incorrect sizes");
        let rows = parts.iter().map(|m| m.rows).sum();
        let mut data = Vec::with_capacity(rows * cols);
        for m in parts {
            data.extend_from_slice(&m.data);
        }
        Matrix { rows, cols, data }
    }

    /// Copies the row range `[start, start + count)` into a new matrix.
    pub fn rows_range(&self, start: usize, count: usize) -> Matrix {
        assert!(start + count <= self.rows, "row range out of bounds");
        Matrix {
            rows: count,
            cols: self.cols,
            data: self.data[start * self.cols..(start + count) * self.cols].to_vec(),
        }
    }

}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Add for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        if !self.same_shape(rhs) {
            panic!("Matrices are of incorrect sizes")
        }
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a + b).collect(),
        }
    }
}

impl Sub for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        if !self.same_shape(rhs) {
            panic!("Matrices are of incorrect sizes")
        }
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a - b).collect(),
        }
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.cols != rhs.rows {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);

        // i-k-j order keeps the inner loop on contiguous rows of both operands.
        for i in 0..self.rows {
            let out = &mut res.data[i * rhs.cols..(i + 1) * rhs.cols];
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == 0.0 {
                    continue;
                }
                let rhs_row = &rhs.data[k * rhs.cols..(k + 1) * rhs.cols];
                for (o, b) in out.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn product_matches_hand_computation() {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = Matrix::from_rows(vec![vec![5.0], vec![6.0]]);
        let c = &a * &b;
        assert_eq!(c, Matrix::from_rows(vec![vec![17.0], vec![39.0]]));
    }

    #[test]
    fn row_broadcast_and_column_sums() {
        let mut m = Matrix::zeros(3, 2);
        m.add_row(&Matrix::from_rows(vec![vec![1.0, -2.0]]));
        assert_eq!(m.sum_rows(), Matrix::from_rows(vec![vec![3.0, -6.0]]));
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        let m = Matrix::from_rows(vec![vec![0.5, 0.5], vec![0.1, 0.9]]);
        assert_eq!(m.argmax_rows(), vec![0, 1]);
    }

    #[test]
    fn hstack_places_parts_side_by_side() {
        let a = Matrix::from_rows(vec![vec![1.0], vec![2.0]]);
        let b = Matrix::from_rows(vec![vec![3.0, 4.0], vec![5.0, 6.0]]);
        let s = Matrix::hstack(&[&a, &b]);
        assert_eq!((s.rows, s.cols), (2, 3));
        assert_eq!(s.row(1), &[2.0, 5.0, 6.0]);
    }

    #[test]
    fn map_accepts_stateful_closures() {
        let m = Matrix::zeros(2, 2);
        let mut next = 0.0;
        let counted = m.map(|_| {
            next += 1.0;
            next
        });
        assert_eq!(counted.data, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn seeded_init_is_reproducible() {
        let a = Matrix::xavier(4, 3, &mut StdRng::seed_from_u64(7));
        let b = Matrix::xavier(4, 3, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
