use crate::error::{ensure_shape, Result, Seq2SeqError};
use crate::math::Matrix;
use crate::tensor::Tensor;

use super::activation::{one_minus, sigmoid, tanh};
use super::linear::LinearT;

/// Recurrent cell family, chosen once at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    Lstm,
    Gru,
}

impl CellKind {
    /// `"gru"` (any case) selects GRU; every other name selects LSTM.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("gru") {
            CellKind::Gru
        } else {
            if !name.eq_ignore_ascii_case("lstm") {
                log::warn!("unknown rnn_type {name:?}, using lstm");
            }
            CellKind::Lstm
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CellKind::Lstm => "lstm",
            CellKind::Gru => "gru",
        }
    }
}

fn gate(x: &Matrix, h: &Matrix, wx: &LinearT, wh: &LinearT) -> Matrix {
    wx.forward(x).add(&wh.forward(h))
}

/// Long short-term memory cell operating on a batch of row vectors.
#[derive(Clone, Debug)]
pub struct LstmCell {
    pub w_ii: LinearT,
    pub w_if: LinearT,
    pub w_ig: LinearT,
    pub w_io: LinearT,
    pub w_hi: LinearT,
    pub w_hf: LinearT,
    pub w_hg: LinearT,
    pub w_ho: LinearT,
    hidden_dim: usize,
}

impl LstmCell {
    pub fn new(input_dim: usize, hidden_dim: usize, bias: bool) -> Self {
        let lin = |i, o| {
            if bias {
                LinearT::with_bias(i, o)
            } else {
                LinearT::new(i, o)
            }
        };
        Self {
            w_ii: lin(input_dim, hidden_dim),
            w_if: lin(input_dim, hidden_dim),
            w_ig: lin(input_dim, hidden_dim),
            w_io: lin(input_dim, hidden_dim),
            w_hi: lin(hidden_dim, hidden_dim),
            w_hf: lin(hidden_dim, hidden_dim),
            w_hg: lin(hidden_dim, hidden_dim),
            w_ho: lin(hidden_dim, hidden_dim),
            hidden_dim,
        }
    }

    /// One timestep: returns the new `(h, c)`.
    pub fn step(&self, x: &Matrix, h_prev: &Matrix, c_prev: &Matrix) -> (Matrix, Matrix) {
        let i = sigmoid(&gate(x, h_prev, &self.w_ii, &self.w_hi));
        let f = sigmoid(&gate(x, h_prev, &self.w_if, &self.w_hf));
        let g = tanh(&gate(x, h_prev, &self.w_ig, &self.w_hg));
        let o = sigmoid(&gate(x, h_prev, &self.w_io, &self.w_ho));
        let c = f.hadamard(c_prev).add(&i.hadamard(&g));
        let h = o.hadamard(&tanh(&c));
        (h, c)
    }

    pub fn parameters(&mut self) -> Vec<&mut LinearT> {
        vec![
            &mut self.w_ii,
            &mut self.w_if,
            &mut self.w_ig,
            &mut self.w_io,
            &mut self.w_hi,
            &mut self.w_hf,
            &mut self.w_hg,
            &mut self.w_ho,
        ]
    }

    pub fn weights(&self) -> Vec<&LinearT> {
        vec![
            &self.w_ii, &self.w_if, &self.w_ig, &self.w_io, &self.w_hi, &self.w_hf, &self.w_hg,
            &self.w_ho,
        ]
    }
}

/// Gated recurrent unit. The candidate gate applies the reset gate to the
/// projected hidden state: `n = tanh(W_in x + r * (W_hn h))`.
#[derive(Clone, Debug)]
pub struct GruCell {
    pub w_ir: LinearT,
    pub w_iz: LinearT,
    pub w_in: LinearT,
    pub w_hr: LinearT,
    pub w_hz: LinearT,
    pub w_hn: LinearT,
    hidden_dim: usize,
}

impl GruCell {
    pub fn new(input_dim: usize, hidden_dim: usize) -> Self {
        Self {
            w_ir: LinearT::with_bias(input_dim, hidden_dim),
            w_iz: LinearT::with_bias(input_dim, hidden_dim),
            w_in: LinearT::with_bias(input_dim, hidden_dim),
            w_hr: LinearT::with_bias(hidden_dim, hidden_dim),
            w_hz: LinearT::with_bias(hidden_dim, hidden_dim),
            w_hn: LinearT::with_bias(hidden_dim, hidden_dim),
            hidden_dim,
        }
    }

    pub fn step(&self, x: &Matrix, h_prev: &Matrix) -> Matrix {
        let r = sigmoid(&gate(x, h_prev, &self.w_ir, &self.w_hr));
        let z = sigmoid(&gate(x, h_prev, &self.w_iz, &self.w_hz));
        let n = tanh(&self.w_in.forward(x).add(&r.hadamard(&self.w_hn.forward(h_prev))));
        one_minus(&z).hadamard(&n).add(&z.hadamard(h_prev))
    }

    pub fn parameters(&mut self) -> Vec<&mut LinearT> {
        vec![
            &mut self.w_ir,
            &mut self.w_iz,
            &mut self.w_in,
            &mut self.w_hr,
            &mut self.w_hz,
            &mut self.w_hn,
        ]
    }

    pub fn weights(&self) -> Vec<&LinearT> {
        vec![&self.w_ir, &self.w_iz, &self.w_in, &self.w_hr, &self.w_hz, &self.w_hn]
    }
}

/// State of a single recurrent layer for one batch.
#[derive(Clone, Debug, PartialEq)]
pub enum CellState {
    Lstm { h: Matrix, c: Matrix },
    Gru { h: Matrix },
}

impl CellState {
    pub fn output(&self) -> &Matrix {
        match self {
            CellState::Lstm { h, .. } | CellState::Gru { h } => h,
        }
    }
}

/// Either recurrent cell behind the same step contract.
#[derive(Clone, Debug)]
pub enum RnnCell {
    Lstm(LstmCell),
    Gru(GruCell),
}

impl RnnCell {
    pub fn new(kind: CellKind, input_dim: usize, hidden_dim: usize, bias: bool) -> Self {
        match kind {
            CellKind::Lstm => RnnCell::Lstm(LstmCell::new(input_dim, hidden_dim, bias)),
            CellKind::Gru => RnnCell::Gru(GruCell::new(input_dim, hidden_dim)),
        }
    }

    pub fn kind(&self) -> CellKind {
        match self {
            RnnCell::Lstm(_) => CellKind::Lstm,
            RnnCell::Gru(_) => CellKind::Gru,
        }
    }

    pub fn hidden_dim(&self) -> usize {
        match self {
            RnnCell::Lstm(l) => l.hidden_dim,
            RnnCell::Gru(g) => g.hidden_dim,
        }
    }

    pub fn input_dim(&self) -> usize {
        match self {
            RnnCell::Lstm(l) => l.w_ii.in_dim(),
            RnnCell::Gru(g) => g.w_ir.in_dim(),
        }
    }

    /// Advance one timestep. `state` must come from a cell of the same kind.
    pub fn step(&self, x: &Matrix, state: &CellState) -> Result<CellState> {
        match (self, state) {
            (RnnCell::Lstm(cell), CellState::Lstm { h, c }) => {
                let (h, c) = cell.step(x, h, c);
                Ok(CellState::Lstm { h, c })
            }
            (RnnCell::Gru(cell), CellState::Gru { h }) => Ok(CellState::Gru { h: cell.step(x, h) }),
            _ => Err(Seq2SeqError::ShapeMismatch(format!(
                "{} cell given a state of the other kind",
                self.kind().name()
            ))),
        }
    }

    pub fn parameters(&mut self) -> Vec<&mut LinearT> {
        match self {
            RnnCell::Lstm(l) => l.parameters(),
            RnnCell::Gru(g) => g.parameters(),
        }
    }

    pub fn weights(&self) -> Vec<&LinearT> {
        match self {
            RnnCell::Lstm(l) => l.weights(),
            RnnCell::Gru(g) => g.weights(),
        }
    }
}

/// Recurrent state stacked over layers, each tensor `(layers, batch, hidden)`.
#[derive(Clone, Debug, PartialEq)]
pub enum RnnState {
    Lstm { h: Tensor, c: Tensor },
    Gru { h: Tensor },
}

impl RnnState {
    pub fn zeros(kind: CellKind, layers: usize, batch: usize, hidden: usize) -> Self {
        let z = || Tensor::zeros(vec![layers, batch, hidden]);
        match kind {
            CellKind::Lstm => RnnState::Lstm { h: z(), c: z() },
            CellKind::Gru => RnnState::Gru { h: z() },
        }
    }

    pub fn kind(&self) -> CellKind {
        match self {
            RnnState::Lstm { .. } => CellKind::Lstm,
            RnnState::Gru { .. } => CellKind::Gru,
        }
    }

    /// Hidden state for every layer.
    pub fn hidden(&self) -> &Tensor {
        match self {
            RnnState::Lstm { h, .. } | RnnState::Gru { h } => h,
        }
    }

    /// `(layers, batch, hidden)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        let s = &self.hidden().shape;
        (s[0], s[1], s[2])
    }

    pub fn layer(&self, i: usize) -> CellState {
        match self {
            RnnState::Lstm { h, c } => CellState::Lstm {
                h: h.slice(i),
                c: c.slice(i),
            },
            RnnState::Gru { h } => CellState::Gru { h: h.slice(i) },
        }
    }

    pub fn layers(&self) -> Vec<CellState> {
        (0..self.dims().0).map(|i| self.layer(i)).collect()
    }

    /// Stack per-layer states back into a layered state.
    pub fn from_layers(layers: Vec<CellState>) -> Self {
        let mut hs = Vec::with_capacity(layers.len());
        let mut cs = Vec::with_capacity(layers.len());
        for l in layers {
            match l {
                CellState::Lstm { h, c } => {
                    hs.push(h);
                    cs.push(c);
                }
                CellState::Gru { h } => hs.push(h),
            }
        }
        if cs.is_empty() {
            RnnState::Gru { h: Tensor::stack(&hs) }
        } else {
            assert_eq!(cs.len(), hs.len(), "mixed cell states");
            RnnState::Lstm {
                h: Tensor::stack(&hs),
                c: Tensor::stack(&cs),
            }
        }
    }

    /// Check that this state fits `layers` cells of `kind` over `batch` rows.
    pub fn check(&self, kind: CellKind, layers: usize, batch: usize, hidden: usize) -> Result<()> {
        ensure_shape(self.kind() == kind, || {
            format!("{} state given to {} cells", self.kind().name(), kind.name())
        })?;
        let dims = self.dims();
        ensure_shape(dims == (layers, batch, hidden), || {
            format!(
                "recurrent state is {:?}, expected ({}, {}, {})",
                dims, layers, batch, hidden
            )
        })?;
        if let RnnState::Lstm { h, c } = self {
            ensure_shape(h.shape == c.shape, || {
                format!("hidden {:?} and cell {:?} disagree", h.shape, c.shape)
            })?;
        }
        Ok(())
    }
}

/// Multi-layer recurrent network over a whole time-major sequence.
///
/// Cells carry input and hidden biases and there is no dropout between
/// layers, so this is the sequence counterpart of [`super::StackedCell`].
#[derive(Clone, Debug)]
pub struct Rnn {
    pub cells: Vec<RnnCell>,
    kind: CellKind,
    hidden_dim: usize,
}

impl Rnn {
    pub fn new(kind: CellKind, input_dim: usize, hidden_dim: usize, num_layers: usize) -> Self {
        let mut cells = Vec::with_capacity(num_layers);
        let mut in_dim = input_dim;
        for _ in 0..num_layers {
            cells.push(RnnCell::new(kind, in_dim, hidden_dim, true));
            in_dim = hidden_dim;
        }
        Self {
            cells,
            kind,
            hidden_dim,
        }
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn num_layers(&self) -> usize {
        self.cells.len()
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    /// Run `xs` of shape `(time, batch, input)` starting from `init`, or from
    /// zeros when `init` is `None`. Returns the top-layer outputs
    /// `(time, batch, hidden)` and the final state.
    pub fn forward(&self, xs: &Tensor, init: Option<RnnState>) -> Result<(Tensor, RnnState)> {
        ensure_shape(xs.shape.len() == 3, || format!("rnn input must be 3-D, got {:?}", xs.shape))?;
        let (steps, batch, in_dim) = (xs.shape[0], xs.shape[1], xs.shape[2]);
        let expected_in = self.cells.first().map_or(in_dim, RnnCell::input_dim);
        ensure_shape(in_dim == expected_in, || {
            format!("rnn input width {in_dim}, expected {expected_in}")
        })?;
        let state = match init {
            Some(s) => {
                s.check(self.kind, self.num_layers(), batch, self.hidden_dim)?;
                s
            }
            None => RnnState::zeros(self.kind, self.num_layers(), batch, self.hidden_dim),
        };

        let mut layers = state.layers();
        let mut outputs = Vec::with_capacity(steps);
        for t in 0..steps {
            let mut x = xs.slice(t);
            for (cell, st) in self.cells.iter().zip(layers.iter_mut()) {
                *st = cell.step(&x, st)?;
                x = st.output().clone();
            }
            outputs.push(x);
        }
        let out = if outputs.is_empty() {
            Tensor::zeros(vec![0, batch, self.hidden_dim])
        } else {
            Tensor::stack(&outputs)
        };
        Ok((out, RnnState::from_layers(layers)))
    }

    pub fn parameters(&mut self) -> Vec<&mut LinearT> {
        self.cells.iter_mut().flat_map(RnnCell::parameters).collect()
    }

    pub fn weights(&self) -> Vec<&LinearT> {
        self.cells.iter().flat_map(RnnCell::weights).collect()
    }
}
