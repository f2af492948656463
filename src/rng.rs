use crate::math::Matrix;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{StandardNormal, Uniform};
use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create a [`StdRng`] seeded from the `SEED` environment variable.
///
/// Each call uses a unique seed derived from the base seed and an
/// incrementing counter, so parameter initialisation and every dropout mask
/// stream are reproducible yet distinct.
pub fn rng_from_env() -> StdRng {
    let base = std::env::var("SEED")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let idx = COUNTER.fetch_add(1, Ordering::SeqCst);
    StdRng::seed_from_u64(base + idx)
}

/// Matrix with entries drawn from `U(-bound, bound)`.
///
/// Recurrent and linear weights use `bound = 1/sqrt(fan)`.
pub fn uniform_matrix<R: Rng>(rng: &mut R, rows: usize, cols: usize, bound: f32) -> Matrix {
    if bound <= 0.0 {
        return Matrix::zeros(rows, cols);
    }
    let dist = Uniform::new_inclusive(-bound, bound);
    Matrix::from_vec(rows, cols, (0..rows * cols).map(|_| rng.sample(&dist)).collect())
}

/// Matrix with entries drawn from `N(0, 1)`, the default embedding init.
pub fn normal_matrix<R: Rng>(rng: &mut R, rows: usize, cols: usize) -> Matrix {
    Matrix::from_vec(
        rows,
        cols,
        (0..rows * cols)
            .map(|_| rng.sample::<f32, _>(StandardNormal))
            .collect(),
    )
}
