use crate::error::{ensure_shape, Result};
use crate::math::Matrix;

use super::dropout::Dropout;
use super::linear::LinearT;
use super::rnn::{CellKind, RnnCell, RnnState};

/// `num_layers` recurrent cells advanced together for a single timestep.
///
/// Each layer feeds the next one, and the value handed onward is passed
/// through dropout after every layer. That includes the last layer, so the
/// step output is itself a dropped-out activation while the stored per-layer
/// states are not.
pub struct StackedCell {
    pub layers: Vec<RnnCell>,
    dropout: Dropout,
    kind: CellKind,
    hidden_dim: usize,
}

impl StackedCell {
    /// LSTM layers are built without biases, GRU layers with them.
    pub fn new(
        kind: CellKind,
        num_layers: usize,
        input_dim: usize,
        hidden_dim: usize,
        dropout: f32,
    ) -> Self {
        let mut layers = Vec::with_capacity(num_layers);
        let mut in_dim = input_dim;
        for _ in 0..num_layers {
            layers.push(RnnCell::new(kind, in_dim, hidden_dim, kind == CellKind::Gru));
            in_dim = hidden_dim;
        }
        Self {
            layers,
            dropout: Dropout::new(dropout),
            kind,
            hidden_dim,
        }
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, RnnCell::input_dim)
    }

    pub fn set_training(&mut self, training: bool) {
        self.dropout.set_training(training);
    }

    /// Advance one timestep. `input` is `(batch, input_dim)`; returns the
    /// last layer's output `(batch, hidden)` and the updated layered state.
    pub fn step(&mut self, input: &Matrix, state: RnnState) -> Result<(Matrix, RnnState)> {
        let batch = input.rows;
        ensure_shape(input.cols == self.input_dim(), || {
            format!(
                "stacked cell input is {:?}, expected width {}",
                input.shape(),
                self.input_dim()
            )
        })?;
        state.check(self.kind, self.num_layers(), batch, self.hidden_dim)?;

        let mut x = input.clone();
        let mut next = Vec::with_capacity(self.layers.len());
        for (i, layer) in self.layers.iter().enumerate() {
            let st = layer.step(&x, &state.layer(i))?;
            x = self.dropout.forward(st.output());
            next.push(st);
        }
        Ok((x, RnnState::from_layers(next)))
    }

    pub fn parameters(&mut self) -> Vec<&mut LinearT> {
        self.layers.iter_mut().flat_map(RnnCell::parameters).collect()
    }

    pub fn weights(&self) -> Vec<&LinearT> {
        self.layers.iter().flat_map(RnnCell::weights).collect()
    }
}
