use crate::config::{EmbeddingSource, Seq2SeqConfig};
use crate::error::{ensure_shape, Result};
use crate::layers::{EmbeddingT, LinearT, Rnn, RnnState};
use crate::tensor::{Tensor, TokenMatrix};
use crate::weights::{import_weights, EmbeddingShape, ModelKind, ModelState};

use super::{predict, time_major, EncoderDecoder};

/// Encoder-decoder without attention.
///
/// The encoder and decoder are separately parameterised multi-layer RNNs.
/// The decoder starts from the encoder's final state and consumes the whole
/// teacher-forced target sequence in one pass; the encoder's per-timestep
/// outputs are not read. There is no dropout, so training and evaluation
/// behave the same.
pub struct Seq2SeqModel {
    pub embed_in: EmbeddingT,
    pub embed_out: EmbeddingT,
    pub encoder_rnn: Rnn,
    pub decoder_rnn: Rnn,
    pub preds: LinearT,
    config: Seq2SeqConfig,
}

impl Seq2SeqModel {
    pub fn new(
        embed_in: &EmbeddingSource,
        embed_out: &EmbeddingSource,
        config: &Seq2SeqConfig,
    ) -> Result<Self> {
        config.validate()?;
        let kind = config.cell_kind();
        let hsz = config.hidden_size;
        let embed_in = EmbeddingT::from_source(embed_in)?;
        let embed_out = EmbeddingT::from_source(embed_out)?;
        let encoder_rnn = Rnn::new(kind, embed_in.dim(), hsz, config.num_layers);
        let decoder_rnn = Rnn::new(kind, embed_out.dim(), hsz, config.num_layers);
        let preds = LinearT::with_bias(hsz, embed_out.num_embeddings());
        log::debug!(
            "built plain {} seq2seq: {} layers, hidden {}, {} -> {} classes",
            kind.name(),
            config.num_layers,
            hsz,
            embed_in.num_embeddings(),
            embed_out.num_embeddings()
        );
        Ok(Self {
            embed_in,
            embed_out,
            encoder_rnn,
            decoder_rnn,
            preds,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &Seq2SeqConfig {
        &self.config
    }
}

impl EncoderDecoder for Seq2SeqModel {
    fn encode(&self, src: &TokenMatrix) -> Result<(Tensor, RnnState)> {
        let src = time_major(src, self.config.batch_first);
        let embedded = self.embed_in.forward(&src)?;
        let (context, state) = self.encoder_rnn.forward(&embedded, None)?;
        log::debug!("encoded {:?} -> context {:?}", src.shape(), context.shape);
        Ok((context, state))
    }

    fn decode(&mut self, _context: &Tensor, state: RnnState, dst: &TokenMatrix) -> Result<Tensor> {
        let dst = time_major(dst, self.config.batch_first);
        let (_, batch, _) = state.dims();
        ensure_shape(dst.cols == batch, || {
            format!(
                "target batch {} does not match encoder state batch {}",
                dst.cols, batch
            )
        })?;
        let embedded = self.embed_out.forward(&dst)?;
        let (output, _) = self.decoder_rnn.forward(&embedded, Some(state))?;
        Ok(predict(&output, &self.preds, self.config.batch_first))
    }

    fn num_classes(&self) -> usize {
        self.embed_out.num_embeddings()
    }

    fn set_training(&mut self, _training: bool) {}

    fn parameters(&mut self) -> Vec<&mut LinearT> {
        let mut params = Vec::new();
        if self.embed_in.finetune() {
            params.extend(self.embed_in.parameters());
        }
        if self.embed_out.finetune() {
            params.extend(self.embed_out.parameters());
        }
        params.extend(self.encoder_rnn.parameters());
        params.extend(self.decoder_rnn.parameters());
        params.extend(self.preds.parameters());
        params
    }

    fn weights(&self) -> Vec<&LinearT> {
        let mut w = self.embed_in.weights();
        w.extend(self.embed_out.weights());
        w.extend(self.encoder_rnn.weights());
        w.extend(self.decoder_rnn.weights());
        w.extend(self.preds.weights());
        w
    }

    fn weights_mut(&mut self) -> Vec<&mut LinearT> {
        let mut w = self.embed_in.parameters();
        w.extend(self.embed_out.parameters());
        w.extend(self.encoder_rnn.parameters());
        w.extend(self.decoder_rnn.parameters());
        w.extend(self.preds.parameters());
        w
    }

    fn pin_padding(&mut self) {
        self.embed_in.pin_padding();
        self.embed_out.pin_padding();
    }

    fn to_state(&self) -> ModelState {
        ModelState {
            kind: ModelKind::Plain,
            config: self.config.clone(),
            embed_in: EmbeddingShape::of(&self.embed_in),
            embed_out: EmbeddingShape::of(&self.embed_out),
            weights: self.weights().into_iter().cloned().collect(),
        }
    }

    fn from_state(state: ModelState) -> Result<Self> {
        state.expect_kind(ModelKind::Plain)?;
        let mut model = Self::new(
            &state.embed_in.to_source(),
            &state.embed_out.to_source(),
            &state.config,
        )?;
        import_weights(model.weights_mut(), &state.weights)?;
        model.pin_padding();
        Ok(model)
    }
}
