use serde::{Deserialize, Serialize};

/// Dense row-major matrix used by every layer in the crate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(r: usize, c: usize) -> Self {
        Matrix {
            rows: r,
            cols: c,
            data: vec![0.0; r * c],
        }
    }

    pub fn from_vec(r: usize, c: usize, v: Vec<f32>) -> Self {
        assert_eq!(v.len(), r * c);
        Matrix {
            rows: r,
            cols: c,
            data: v,
        }
    }

    /// Build a matrix from nested rows. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Self {
        if rows.is_empty() {
            return Matrix::zeros(0, 0);
        }
        let cols = rows[0].len();
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            assert_eq!(row.len(), cols, "ragged rows");
            data.extend_from_slice(row);
        }
        Matrix::from_vec(rows.len(), cols, data)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, v: f32) {
        self.data[r * self.cols + c] = v;
    }

    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f32] {
        let cols = self.cols;
        &mut self.data[r * cols..(r + 1) * cols]
    }

    pub fn matmul(a: &Matrix, b: &Matrix) -> Matrix {
        assert_eq!(a.cols, b.rows, "matmul: {:?} x {:?}", a.shape(), b.shape());
        let mut out = vec![0.0; a.rows * b.cols];
        for i in 0..a.rows {
            let a_row = &a.data[i * a.cols..(i + 1) * a.cols];
            let out_row = &mut out[i * b.cols..(i + 1) * b.cols];
            for (k, &a_val) in a_row.iter().enumerate() {
                let b_row = &b.data[k * b.cols..(k + 1) * b.cols];
                for (o, &bv) in out_row.iter_mut().zip(b_row) {
                    *o += a_val * bv;
                }
            }
        }
        Matrix::from_vec(a.rows, b.cols, out)
    }

    pub fn add(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.shape(), other.shape());
        let v = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a + b)
            .collect();
        Matrix::from_vec(self.rows, self.cols, v)
    }

    /// Add `bias` to every row.
    pub fn add_row(&self, bias: &[f32]) -> Matrix {
        assert_eq!(self.cols, bias.len());
        let mut out = self.clone();
        for row in out.data.chunks_mut(self.cols.max(1)) {
            for (v, b) in row.iter_mut().zip(bias) {
                *v += b;
            }
        }
        out
    }

    /// Elementwise product.
    pub fn hadamard(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.shape(), other.shape());
        let v = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a * b)
            .collect();
        Matrix::from_vec(self.rows, self.cols, v)
    }

    pub fn map<F: Fn(f32) -> f32>(&self, f: F) -> Matrix {
        Matrix::from_vec(self.rows, self.cols, self.data.iter().map(|&v| f(v)).collect())
    }

    pub fn transpose(&self) -> Matrix {
        let mut v = vec![0.0; self.rows * self.cols];
        for i in 0..self.rows {
            for j in 0..self.cols {
                v[j * self.rows + i] = self.get(i, j);
            }
        }
        Matrix::from_vec(self.cols, self.rows, v)
    }

    /// Concatenate `a` and `b` along the column axis.
    pub fn concat_cols(a: &Matrix, b: &Matrix) -> Matrix {
        assert_eq!(a.rows, b.rows, "concat_cols: {:?} and {:?}", a.shape(), b.shape());
        let cols = a.cols + b.cols;
        let mut data = Vec::with_capacity(a.rows * cols);
        for r in 0..a.rows {
            data.extend_from_slice(a.row(r));
            data.extend_from_slice(b.row(r));
        }
        Matrix::from_vec(a.rows, cols, data)
    }

    /// Row-wise softmax, shifted by the row maximum.
    pub fn softmax(&self) -> Matrix {
        let mut v = vec![0.0; self.data.len()];
        for (out_row, row) in v
            .chunks_mut(self.cols.max(1))
            .zip(self.data.chunks(self.cols.max(1)))
        {
            let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0;
            for (o, &x) in out_row.iter_mut().zip(row) {
                let e = (x - max).exp();
                *o = e;
                sum += e;
            }
            for o in out_row.iter_mut() {
                *o /= sum;
            }
        }
        Matrix::from_vec(self.rows, self.cols, v)
    }

    /// Row-wise log-softmax: `x - max - ln(sum(exp(x - max)))`.
    pub fn log_softmax(&self) -> Matrix {
        let mut v = vec![0.0; self.data.len()];
        for (out_row, row) in v
            .chunks_mut(self.cols.max(1))
            .zip(self.data.chunks(self.cols.max(1)))
        {
            let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let lse = row.iter().map(|&x| (x - max).exp()).sum::<f32>().ln() + max;
            for (o, &x) in out_row.iter_mut().zip(row) {
                *o = x - lse;
            }
        }
        Matrix::from_vec(self.rows, self.cols, v)
    }
}
