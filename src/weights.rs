use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{EmbeddingSource, Seq2SeqConfig};
use crate::error::{Result, Seq2SeqError};
use crate::layers::{EmbeddingT, LinearT};

/// Which encoder-decoder a saved blob belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    Plain,
    Attention,
}

/// Vocabulary shape of one embedding table, enough to rebuild it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingShape {
    pub vocab_size: usize,
    pub dim: usize,
    pub finetune: bool,
}

impl EmbeddingShape {
    pub fn of(emb: &EmbeddingT) -> Self {
        Self {
            vocab_size: emb.num_embeddings() - 1,
            dim: emb.dim(),
            finetune: emb.finetune(),
        }
    }

    /// A randomly initialised source with this shape; weights are filled in
    /// from the saved parameters afterwards.
    pub fn to_source(&self) -> EmbeddingSource {
        EmbeddingSource {
            vocab_size: self.vocab_size,
            dim: self.dim,
            weights: None,
            finetune: self.finetune,
        }
    }
}

/// Everything needed to reconstruct a model: hyper-parameters plus every
/// linear map in the model's fixed parameter order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelState {
    pub kind: ModelKind,
    pub config: Seq2SeqConfig,
    pub embed_in: EmbeddingShape,
    pub embed_out: EmbeddingShape,
    pub weights: Vec<LinearT>,
}

impl ModelState {
    pub fn expect_kind(&self, kind: ModelKind) -> Result<()> {
        if self.kind != kind {
            return Err(Seq2SeqError::Format(format!(
                "file holds a {:?} model, expected {:?}",
                self.kind, kind
            )));
        }
        Ok(())
    }
}

/// `{dir}/{base}.model`
pub fn model_path(dir: &str, base: &str) -> PathBuf {
    Path::new(dir).join(format!("{base}.model"))
}

/// Copy saved parameters into `params`, which must match in count and layout.
pub fn import_weights(params: Vec<&mut LinearT>, saved: &[LinearT]) -> Result<()> {
    if params.len() != saved.len() {
        return Err(Seq2SeqError::Format(format!(
            "file holds {} parameter blocks, model has {}",
            saved.len(),
            params.len()
        )));
    }
    for (i, (p, s)) in params.into_iter().zip(saved).enumerate() {
        if !p.assign(s) {
            return Err(Seq2SeqError::Format(format!(
                "parameter block {i} is {:?} holding {} values, model expects {:?}",
                s.w.shape(),
                s.w.data.len(),
                p.w.shape()
            )));
        }
    }
    Ok(())
}

pub fn save_state(path: &Path, state: &ModelState) -> Result<()> {
    let bin = bincode::serialize(state)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bin)?;
    log::info!("Saved {:?} model to {}", state.kind, path.display());
    Ok(())
}

pub fn load_state(path: &Path) -> Result<ModelState> {
    let bin = fs::read(path)?;
    let state: ModelState = bincode::deserialize(&bin)?;
    log::info!("Loaded {:?} model from {}", state.kind, path.display());
    Ok(state)
}
