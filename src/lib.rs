pub mod config;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod models;
pub mod rng;
pub mod tensor;
pub mod weights;

pub use config::{EmbeddingSource, Seq2SeqConfig};
pub use error::{Result, Seq2SeqError};
pub use loss::SequenceCriterion;
pub use models::{EncoderDecoder, Seq2SeqAttnModel, Seq2SeqModel};
pub use tensor::{Tensor, TokenMatrix};
