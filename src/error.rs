//! Error types shared by the models, configuration and persistence code.

use thiserror::Error;

/// Errors produced while building, running, saving or loading a model.
#[derive(Debug, Error)]
pub enum Seq2SeqError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid model file: {0}")]
    Format(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, Seq2SeqError>;

/// Return a [`Seq2SeqError::ShapeMismatch`] unless `ok` holds.
pub(crate) fn ensure_shape(ok: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Seq2SeqError::ShapeMismatch(msg()))
    }
}
