pub mod seq2seq;
pub mod seq2seq_attn;

pub use seq2seq::Seq2SeqModel;
pub use seq2seq_attn::Seq2SeqAttnModel;

use std::path::PathBuf;

use crate::error::Result;
use crate::layers::{LinearT, RnnState};
use crate::loss::SequenceCriterion;
use crate::math::Matrix;
use crate::tensor::{Tensor, TokenMatrix};
use crate::weights::{self, ModelState};

/// Common surface of the plain and attentive encoder-decoders.
///
/// Token matrices are `(batch, time)` when the model was built with
/// `batch_first`, `(time, batch)` otherwise, and predictions come back in the
/// same layout with the class axis last. Encoder outputs are always
/// time-major `(source_len, batch, hidden)`.
pub trait EncoderDecoder {
    /// Run the encoder over `src`, returning per-timestep outputs and the
    /// final layered state.
    fn encode(&self, src: &TokenMatrix) -> Result<(Tensor, RnnState)>;

    /// Teacher-forced decode of `dst` starting from `state`.
    fn decode(&mut self, context: &Tensor, state: RnnState, dst: &TokenMatrix) -> Result<Tensor>;

    fn forward(&mut self, src: &TokenMatrix, dst: &TokenMatrix) -> Result<Tensor> {
        let (context, state) = self.encode(src)?;
        self.decode(&context, state, dst)
    }

    /// Target vocabulary size including the padding class.
    fn num_classes(&self) -> usize;

    fn create_loss(&self) -> SequenceCriterion {
        SequenceCriterion::new(self.num_classes())
    }

    /// Toggle dropout. Models start in training mode.
    fn set_training(&mut self, training: bool);

    /// Trainable parameters. Embedding tables built with `finetune = false`
    /// are left out.
    fn parameters(&mut self) -> Vec<&mut LinearT>;

    /// Every parameter block in a fixed order, trainable or not.
    fn weights(&self) -> Vec<&LinearT>;

    fn weights_mut(&mut self) -> Vec<&mut LinearT>;

    /// Zero the padding rows of both embedding tables.
    fn pin_padding(&mut self);

    /// Apply an external update to the trainable parameters, then restore
    /// the zero padding rows.
    fn update_parameters<F>(&mut self, update: F)
    where
        F: FnOnce(&mut [&mut LinearT]),
        Self: Sized,
    {
        {
            let mut params = self.parameters();
            update(&mut params);
        }
        self.pin_padding();
    }

    fn to_state(&self) -> ModelState;

    fn from_state(state: ModelState) -> Result<Self>
    where
        Self: Sized;

    /// Write the model to `{dir}/{base}.model`.
    fn save(&self, dir: &str, base: &str) -> Result<PathBuf> {
        let path = weights::model_path(dir, base);
        weights::save_state(&path, &self.to_state())?;
        Ok(path)
    }

    /// Read a model written by [`EncoderDecoder::save`].
    fn load(dir: &str, base: &str) -> Result<Self>
    where
        Self: Sized,
    {
        let state = weights::load_state(&weights::model_path(dir, base))?;
        Self::from_state(state)
    }
}

/// Bring a token matrix into time-major layout.
pub(crate) fn time_major(tokens: &TokenMatrix, batch_first: bool) -> TokenMatrix {
    if batch_first {
        tokens.transpose()
    } else {
        tokens.clone()
    }
}

/// Project time-major decoder outputs `(time, batch, hidden)` to
/// log-probabilities and restore the external layout.
pub(crate) fn predict(outputs: &Tensor, preds: &LinearT, batch_first: bool) -> Tensor {
    let (steps, batch) = (outputs.shape[0], outputs.shape[1]);
    let flat = if steps * batch == 0 {
        Matrix::zeros(0, outputs.shape[2])
    } else {
        outputs.to_matrix()
    };
    let logp = preds.forward(&flat).log_softmax();
    let pred = Tensor::new(logp.data, vec![steps, batch, preds.out_dim()]);
    if batch_first {
        pred.transpose01()
    } else {
        pred
    }
}
