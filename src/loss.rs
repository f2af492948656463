use crate::error::{ensure_shape, Result, Seq2SeqError};
use crate::layers::PAD;
use crate::tensor::{Tensor, TokenMatrix};

/// Summed negative log-likelihood over a batch of sequences that ignores
/// padding targets.
///
/// Every class has weight 1 except [`PAD`], which has weight 0, so padded
/// positions contribute nothing. The result is a sum, not a mean; use
/// [`SequenceCriterion::count_tokens`] to normalise outside.
#[derive(Clone, Debug)]
pub struct SequenceCriterion {
    weights: Vec<f32>,
}

impl SequenceCriterion {
    pub fn new(num_classes: usize) -> Self {
        let mut weights = vec![1.0; num_classes];
        if let Some(w) = weights.get_mut(PAD) {
            *w = 0.0;
        }
        Self { weights }
    }

    pub fn num_classes(&self) -> usize {
        self.weights.len()
    }

    /// Weighted NLL for every flattened (batch x time) position.
    ///
    /// `log_probs` is `(batch, time, classes)` and `targets` `(batch, time)`;
    /// the two are matched after flattening, so any layout works as long as
    /// both use the same one.
    pub fn forward_positions(&self, log_probs: &Tensor, targets: &TokenMatrix) -> Result<Vec<f32>> {
        let classes = *log_probs.shape.last().unwrap_or(&0);
        ensure_shape(classes == self.num_classes(), || {
            format!(
                "predictions have {} classes, criterion expects {}",
                classes,
                self.num_classes()
            )
        })?;
        let flat = log_probs.to_matrix();
        let total = targets.data.len();
        ensure_shape(flat.rows == total, || {
            format!(
                "predictions {:?} flatten to {} rows but targets {:?} hold {}",
                log_probs.shape,
                flat.rows,
                targets.shape(),
                total
            )
        })?;

        targets
            .data
            .iter()
            .enumerate()
            .map(|(row, &t)| {
                let w = *self.weights.get(t).ok_or_else(|| {
                    Seq2SeqError::ShapeMismatch(format!(
                        "target {t} outside {} classes",
                        self.num_classes()
                    ))
                })?;
                Ok(if w == 0.0 { 0.0 } else { -w * flat.get(row, t) })
            })
            .collect()
    }

    /// Total loss over all non-padding positions.
    pub fn forward(&self, log_probs: &Tensor, targets: &TokenMatrix) -> Result<f32> {
        Ok(self.forward_positions(log_probs, targets)?.iter().sum())
    }

    /// Number of targets that are not padding.
    pub fn count_tokens(targets: &TokenMatrix) -> usize {
        targets.data.iter().filter(|&&t| t != PAD).count()
    }
}
