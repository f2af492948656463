use crate::config::EmbeddingSource;
use crate::error::{ensure_shape, Result, Seq2SeqError};
use crate::math::Matrix;
use crate::rng::{normal_matrix, rng_from_env};
use crate::tensor::{Tensor, TokenMatrix};

use super::linear::LinearT;

/// Index reserved for padding; its embedding row is pinned to zero.
pub const PAD: usize = 0;

/// Embedding lookup table of shape `(vocab_size + 1) x dim`.
///
/// Row [`PAD`] is zeroed on construction and again by [`EmbeddingT::pin_padding`]
/// whenever the owning model applies an external parameter update.
pub struct EmbeddingT {
    pub table: LinearT,
    finetune: bool,
}

impl EmbeddingT {
    pub fn new(vocab_size: usize, dim: usize) -> Self {
        let mut rng = rng_from_env();
        let mut emb = Self {
            table: LinearT::from_weights(normal_matrix(&mut rng, vocab_size + 1, dim), None),
            finetune: true,
        };
        emb.pin_padding();
        emb
    }

    pub fn from_source(src: &EmbeddingSource) -> Result<Self> {
        let mut emb = match &src.weights {
            Some(w) => {
                ensure_shape(w.shape() == (src.vocab_size + 1, src.dim), || {
                    format!(
                        "pretrained embeddings are {:?}, expected ({}, {})",
                        w.shape(),
                        src.vocab_size + 1,
                        src.dim
                    )
                })?;
                let mut emb = Self {
                    table: LinearT::from_weights(w.clone(), None),
                    finetune: true,
                };
                emb.pin_padding();
                emb
            }
            None => Self::new(src.vocab_size, src.dim),
        };
        emb.finetune = src.finetune;
        Ok(emb)
    }

    /// Number of rows, i.e. vocabulary size including padding.
    pub fn num_embeddings(&self) -> usize {
        self.table.w.rows
    }

    pub fn dim(&self) -> usize {
        self.table.w.cols
    }

    pub fn finetune(&self) -> bool {
        self.finetune
    }

    pub fn pin_padding(&mut self) {
        self.table.w.row_mut(PAD).fill(0.0);
    }

    /// Look up `tokens`, one output row per token.
    pub fn lookup(&self, tokens: &[usize]) -> Result<Matrix> {
        let n = self.num_embeddings();
        if let Some(&bad) = tokens.iter().find(|&&t| t >= n) {
            return Err(Seq2SeqError::ShapeMismatch(format!(
                "token index {bad} outside embedding table of {n} rows"
            )));
        }
        let dim = self.dim();
        let mut data = Vec::with_capacity(tokens.len() * dim);
        for &t in tokens {
            data.extend_from_slice(self.table.w.row(t));
        }
        Ok(Matrix::from_vec(tokens.len(), dim, data))
    }

    /// Embed a time-major token matrix into a `(time, batch, dim)` tensor.
    pub fn forward(&self, tokens: &TokenMatrix) -> Result<Tensor> {
        let m = self.lookup(&tokens.data)?;
        Ok(Tensor::new(m.data, vec![tokens.rows, tokens.cols, self.dim()]))
    }

    pub fn parameters(&mut self) -> Vec<&mut LinearT> {
        self.table.parameters()
    }

    pub fn weights(&self) -> Vec<&LinearT> {
        self.table.weights()
    }
}
