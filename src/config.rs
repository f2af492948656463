use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{Result, Seq2SeqError};
use crate::layers::CellKind;
use crate::math::Matrix;

/// Model hyper-parameters loaded from a TOML or JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seq2SeqConfig {
    /// Recurrent hidden size shared by encoder and decoder.
    pub hidden_size: usize,
    /// Number of stacked recurrent layers.
    pub num_layers: usize,
    /// `"gru"` selects GRU cells; anything else selects LSTM cells.
    pub rnn_type: String,
    /// Token matrices are (batch x time) when true, (time x batch) otherwise.
    pub batch_first: bool,
    /// Maximum sequence length. Recorded with the model, not enforced.
    pub max_len: usize,
    /// Dropout probability used by the attentive decoder.
    pub dropout: f32,
    /// Build the attentive model rather than the plain one.
    pub attention: bool,
}

impl Default for Seq2SeqConfig {
    fn default() -> Self {
        Self {
            hidden_size: 256,
            num_layers: 1,
            rnn_type: "lstm".to_string(),
            batch_first: true,
            max_len: 100,
            dropout: 0.5,
            attention: true,
        }
    }
}

impl Seq2SeqConfig {
    /// Load configuration from the given path.  TOML or JSON is chosen by the
    /// file extension; missing fields take their defaults.
    pub fn from_path(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let cfg: Seq2SeqConfig = if path.ends_with(".json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 {
            return Err(Seq2SeqError::Config("hidden_size must be positive".into()));
        }
        if self.num_layers == 0 {
            return Err(Seq2SeqError::Config("num_layers must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Seq2SeqError::Config(format!(
                "dropout must lie in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }

    pub fn cell_kind(&self) -> CellKind {
        CellKind::from_name(&self.rnn_type)
    }
}

/// One side's vocabulary and embedding description.
///
/// The embedding table always has `vocab_size + 1` rows: row 0 is the
/// padding token and real tokens use indices `1..=vocab_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSource {
    pub vocab_size: usize,
    pub dim: usize,
    /// Optional pretrained table of shape `(vocab_size + 1) x dim`.
    pub weights: Option<Matrix>,
    /// Whether the table belongs to the trainable parameter set.
    pub finetune: bool,
}

impl EmbeddingSource {
    /// Randomly initialised, trainable embeddings.
    pub fn new(vocab_size: usize, dim: usize) -> Self {
        Self {
            vocab_size,
            dim,
            weights: None,
            finetune: true,
        }
    }

    /// Pretrained embeddings; shape is taken from the matrix.
    pub fn pretrained(weights: Matrix, finetune: bool) -> Self {
        Self {
            vocab_size: weights.rows.saturating_sub(1),
            dim: weights.cols,
            weights: Some(weights),
            finetune,
        }
    }
}
