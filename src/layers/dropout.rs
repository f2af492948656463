use crate::math::Matrix;
use crate::rng::rng_from_env;
use rand::Rng;

/// Dropout layer that randomly zeros elements during training.
///
/// During the forward pass, each element of the input is kept with
/// probability `1 - p`. When an element is kept its value is scaled by
/// `1/(1 - p)` to preserve the expected activation ("inverted" dropout).
/// Outside training mode the input passes through unchanged.
pub struct Dropout {
    p: f32,
    training: bool,
    rng: rand::rngs::StdRng,
}

impl Dropout {
    /// Create a dropout layer with drop probability `p`, in training mode.
    pub fn new(p: f32) -> Self {
        Self {
            p,
            training: true,
            rng: rng_from_env(),
        }
    }

    pub fn p(&self) -> f32 {
        self.p
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn forward(&mut self, x: &Matrix) -> Matrix {
        if !self.training || self.p == 0.0 {
            return x.clone();
        }
        let scale = if self.p < 1.0 { 1.0 / (1.0 - self.p) } else { 0.0 };
        let mut out = Matrix::zeros(x.rows, x.cols);
        for (o, &v) in out.data.iter_mut().zip(&x.data) {
            if self.rng.gen::<f32>() >= self.p {
                *o = v * scale;
            }
        }
        out
    }
}
