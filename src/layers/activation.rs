use crate::math::Matrix;

/// Logistic sigmoid applied elementwise.
pub fn sigmoid(m: &Matrix) -> Matrix {
    m.map(|v| 1.0 / (1.0 + (-v).exp()))
}

/// Hyperbolic tangent applied elementwise.
pub fn tanh(m: &Matrix) -> Matrix {
    m.map(f32::tanh)
}

/// `1 - x` elementwise, used for the GRU update gate.
pub fn one_minus(m: &Matrix) -> Matrix {
    m.map(|v| 1.0 - v)
}
