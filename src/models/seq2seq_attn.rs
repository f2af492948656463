use crate::config::{EmbeddingSource, Seq2SeqConfig};
use crate::error::{ensure_shape, Result};
use crate::layers::{activation, Dropout, EmbeddingT, LinearT, Rnn, RnnState, StackedCell};
use crate::math::Matrix;
use crate::tensor::{Tensor, TokenMatrix};
use crate::weights::{import_weights, EmbeddingShape, ModelKind, ModelState};

use super::{predict, time_major, EncoderDecoder};

/// Encoder-decoder with global dot-product attention and input feeding.
///
/// The decoder walks the target one step at a time. At step `t` the target
/// embedding is concatenated with the previous attended output, advanced
/// through a [`StackedCell`], scored against every encoder position, and the
/// pooled context is fused with the raw cell output:
///
/// ```text
/// x_t  = [e_t ; h~_{t-1}]
/// o_t  = cell(x_t, s_{t-1})
/// a_t  = softmax(C (W_q o_t))
/// h~_t = dropout(tanh(W_c [a_t C ; o_t]))
/// ```
///
/// `h~_t` is both the step's output and the next step's feed, with
/// `h~_0 = 0` and `s_0` the encoder's final state.
pub struct Seq2SeqAttnModel {
    pub embed_in: EmbeddingT,
    pub embed_out: EmbeddingT,
    pub encoder_rnn: Rnn,
    pub decoder_rnn: StackedCell,
    /// `W_q`, hidden -> hidden, no bias.
    pub output_to_attn: LinearT,
    /// `W_c`, 2 * hidden -> hidden, no bias.
    pub attn_out: LinearT,
    pub preds: LinearT,
    dropout: Dropout,
    config: Seq2SeqConfig,
    training: bool,
}

impl Seq2SeqAttnModel {
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
        let decoder_rnn = StackedCell::new(
            kind,
            config.num_layers,
            embed_out.dim() + hsz,
            hsz,
            config.dropout,
        );
        let preds = LinearT::with_bias(hsz, embed_out.num_embeddings());
        log::debug!(
            "built attentive {} seq2seq: {} layers, hidden {}, dropout {}, {} -> {} classes",
            kind.name(),
            config.num_layers,
            hsz,
            config.dropout,
            embed_in.num_embeddings(),
            embed_out.num_embeddings()
        );
        Ok(Self {
            embed_in,
            embed_out,
            encoder_rnn,
            decoder_rnn,
            output_to_attn: LinearT::new(hsz, hsz),
            attn_out: LinearT::new(2 * hsz, hsz),
            preds,
            dropout: Dropout::new(config.dropout),
            config: config.clone(),
            training: true,
        })
    }

    pub fn config(&self) -> &Seq2SeqConfig {
        &self.config
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// One attention readout.
    ///
    /// `output_t` is the raw cell output `(batch, hidden)` and `context` the
    /// batch-major encoder outputs `(batch, source_len, hidden)`. Returns the
    /// fused output `(batch, hidden)` before dropout and the attention
    /// weights `(batch, source_len)`.
    pub(crate) fn attend(&self, output_t: &Matrix, context: &Tensor) -> (Matrix, Matrix) {
        let (batch, src_len, hidden) = (context.shape[0], context.shape[1], context.shape[2]);
        let query = self.output_to_attn.forward(output_t);
        let query = Tensor::new(query.data, vec![batch, hidden, 1]);
        let scores = Tensor::bmm(context, &query);
        let weights = Matrix::from_vec(batch, src_len, scores.data).softmax();

        let a = Tensor::new(weights.data.clone(), vec![batch, 1, src_len]);
        let pooled = Tensor::bmm(&a, context);
        let pooled = Matrix::from_vec(batch, hidden, pooled.data);

        let combined = Matrix::concat_cols(&pooled, output_t);
        let fused = activation::tanh(&self.attn_out.forward(&combined));
        (fused, weights)
    }

    /// Decode and also return the attention weights of every step,
    /// shaped `(target_len, batch, source_len)`.
    pub fn decode_with_attention(
        &mut self,
        context: &Tensor,
        state: RnnState,
        dst: &TokenMatrix,
    ) -> Result<(Tensor, Tensor)> {
        let dst = time_major(dst, self.config.batch_first);
        let hsz = self.config.hidden_size;
        ensure_shape(context.shape.len() == 3, || {
            format!("context must be (source_len, batch, hidden), got {:?}", context.shape)
        })?;
        let (src_len, batch) = (context.shape[0], context.shape[1]);
        ensure_shape(context.shape[2] == hsz, || {
            format!("context hidden {} does not match decoder hidden {}", context.shape[2], hsz)
        })?;
        ensure_shape(dst.cols == batch, || {
            format!("target batch {} does not match context batch {}", dst.cols, batch)
        })?;
        state.check(self.decoder_rnn.kind(), self.decoder_rnn.num_layers(), batch, hsz)?;

        let embedded = self.embed_out.forward(&dst)?;
        let context_bm = context.transpose01();

        let mut h_i = state;
        let mut output_i = Matrix::zeros(batch, hsz);
        let mut outputs = Vec::with_capacity(dst.rows);
        let mut attention = Vec::with_capacity(dst.rows);
        for t in 0..dst.rows {
            let embed_i = Matrix::concat_cols(&embedded.slice(t), &output_i);
            let (raw, next) = self.decoder_rnn.step(&embed_i, h_i)?;
            h_i = next;
            let (fused, weights) = self.attend(&raw, &context_bm);
            output_i = self.dropout.forward(&fused);
            outputs.push(output_i.clone());
            attention.push(weights);
        }
        log::debug!(
            "decoded {} steps over {} source positions, batch {}",
            dst.rows,
            src_len,
            batch
        );

        let (output, attention) = if outputs.is_empty() {
            (
                Tensor::zeros(vec![0, batch, hsz]),
                Tensor::zeros(vec![0, batch, src_len]),
            )
        } else {
            (Tensor::stack(&outputs), Tensor::stack(&attention))
        };
        let pred = predict(&output, &self.preds, self.config.batch_first);
        Ok((pred, attention))
    }
}

impl EncoderDecoder for Seq2SeqAttnModel {
    fn encode(&self, src: &TokenMatrix) -> Result<(Tensor, RnnState)> {
        let src = time_major(src, self.config.batch_first);
        let embedded = self.embed_in.forward(&src)?;
        let (context, state) = self.encoder_rnn.forward(&embedded, None)?;
        log::debug!("encoded {:?} -> context {:?}", src.shape(), context.shape);
        Ok((context, state))
    }

    fn decode(&mut self, context: &Tensor, state: RnnState, dst: &TokenMatrix) -> Result<Tensor> {
        Ok(self.decode_with_attention(context, state, dst)?.0)
    }

    fn num_classes(&self) -> usize {
        self.embed_out.num_embeddings()
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        self.dropout.set_training(training);
        self.decoder_rnn.set_training(training);
    }

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
        params.extend(self.output_to_attn.parameters());
        params.extend(self.attn_out.parameters());
        params.extend(self.preds.parameters());
        params
    }

    fn weights(&self) -> Vec<&LinearT> {
        let mut w = self.embed_in.weights();
        w.extend(self.embed_out.weights());
        w.extend(self.encoder_rnn.weights());
        w.extend(self.decoder_rnn.weights());
        w.extend(self.output_to_attn.weights());
        w.extend(self.attn_out.weights());
        w.extend(self.preds.weights());
        w
    }

    fn weights_mut(&mut self) -> Vec<&mut LinearT> {
        let mut w = self.embed_in.parameters();
        w.extend(self.embed_out.parameters());
        w.extend(self.encoder_rnn.parameters());
        w.extend(self.decoder_rnn.parameters());
        w.extend(self.output_to_attn.parameters());
        w.extend(self.attn_out.parameters());
        w.extend(self.preds.parameters());
        w
    }

    fn pin_padding(&mut self) {
        self.embed_in.pin_padding();
        self.embed_out.pin_padding();
    }

    fn to_state(&self) -> ModelState {
        ModelState {
            kind: ModelKind::Attention,
            config: self.config.clone(),
            embed_in: EmbeddingShape::of(&self.embed_in),
            embed_out: EmbeddingShape::of(&self.embed_out),
            weights: self.weights().into_iter().cloned().collect(),
        }
    }

    fn from_state(state: ModelState) -> Result<Self> {
        state.expect_kind(ModelKind::Attention)?;
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
