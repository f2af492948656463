pub mod activation;
pub mod dropout;
pub mod embedding;
pub mod linear;
pub mod rnn;
pub mod stacked;

pub use dropout::Dropout;
pub use embedding::{EmbeddingT, PAD};
pub use linear::LinearT;
pub use rnn::{CellKind, CellState, GruCell, LstmCell, Rnn, RnnCell, RnnState};
pub use stacked::StackedCell;
