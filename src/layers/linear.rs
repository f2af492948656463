use serde::{Deserialize, Serialize};

use crate::math::Matrix;
use crate::rng::{rng_from_env, uniform_matrix};

// Affine map `y = x W + b` with `W` stored as (in_dim x out_dim) so a batch of
// row vectors multiplies straight through.  The bias is optional: the
// attention projections and the LSTM decoder cells run without one.

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearT {
    pub w: Matrix,
    pub b: Option<Vec<f32>>,
}

impl LinearT {
    /// Bias-free layer initialised from `U(-1/sqrt(in), 1/sqrt(in))`.
    pub fn new(in_dim: usize, out_dim: usize) -> Self {
        let bound = init_bound(in_dim);
        let mut rng = rng_from_env();
        Self {
            w: uniform_matrix(&mut rng, in_dim, out_dim, bound),
            b: None,
        }
    }

    /// Layer with a bias drawn from the same range as the weights.
    pub fn with_bias(in_dim: usize, out_dim: usize) -> Self {
        let bound = init_bound(in_dim);
        let mut rng = rng_from_env();
        let w = uniform_matrix(&mut rng, in_dim, out_dim, bound);
        let b = uniform_matrix(&mut rng, 1, out_dim, bound).data;
        Self { w, b: Some(b) }
    }

    /// Wrap explicit weights, e.g. pretrained or hand-set values.
    pub fn from_weights(w: Matrix, b: Option<Vec<f32>>) -> Self {
        if let Some(b) = &b {
            assert_eq!(b.len(), w.cols, "bias length must match output dim");
        }
        Self { w, b }
    }

    pub fn in_dim(&self) -> usize {
        self.w.rows
    }

    pub fn out_dim(&self) -> usize {
        self.w.cols
    }

    pub fn forward(&self, x: &Matrix) -> Matrix {
        let y = Matrix::matmul(x, &self.w);
        match &self.b {
            Some(b) => y.add_row(b),
            None => y,
        }
    }

    /// Replace weights and bias with `other`, which must have the same layout
    /// and a weight buffer that fills its shape.
    pub fn assign(&mut self, other: &LinearT) -> bool {
        let same_bias = match (&self.b, &other.b) {
            (Some(a), Some(b)) => a.len() == b.len(),
            (None, None) => true,
            _ => false,
        };
        let filled = other.w.data.len() == other.w.rows * other.w.cols;
        if self.w.shape() != other.w.shape() || !same_bias || !filled {
            return false;
        }
        self.w = other.w.clone();
        self.b = other.b.clone();
        true
    }

    pub fn parameters(&mut self) -> Vec<&mut LinearT> {
        vec![self]
    }

    pub fn weights(&self) -> Vec<&LinearT> {
        vec![self]
    }
}

fn init_bound(fan_in: usize) -> f32 {
    if fan_in == 0 {
        0.0
    } else {
        1.0 / (fan_in as f32).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_applies_bias_per_row() {
        let lin = LinearT::from_weights(
            Matrix::from_vec(2, 1, vec![1.0, 2.0]),
            Some(vec![0.5]),
        );
        let x = Matrix::from_vec(2, 2, vec![1.0, 1.0, 0.0, 1.0]);
        assert_eq!(lin.forward(&x).data, vec![3.5, 2.5]);
    }

    #[test]
    fn assign_rejects_other_layout() {
        let mut a = LinearT::new(2, 3);
        let b = LinearT::with_bias(2, 3);
        assert!(!a.assign(&b));
        let c = LinearT::new(2, 3);
        assert!(a.assign(&c));
        assert_eq!(a, c);
    }

    #[test]
    fn assign_rejects_short_weight_buffer() {
        let mut a = LinearT::new(2, 3);
        let before = a.clone();
        let mut short = LinearT::new(2, 3);
        short.w.data.truncate(4);
        assert!(!a.assign(&short));
        assert_eq!(a, before);
    }
}
