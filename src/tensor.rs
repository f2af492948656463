use crate::math::Matrix;

/// N-dimensional tensor backed by a flat `Vec<f32>`.
///
/// The recurrent code works on 3-D tensors laid out either time-major
/// `(time, batch, hidden)` or batch-major `(batch, time, hidden)`; a single
/// time slice of a time-major tensor is a 2-D [`Matrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Tensor elements in row-major order.
    pub data: Vec<f32>,
    /// Sizes for each dimension.
    pub shape: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor from raw parts.  The number of elements in `data`
    /// must match the product of the requested `shape`.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        assert_eq!(data.len(), shape.iter().product::<usize>());
        Tensor { data, shape }
    }

    pub fn from_matrix(m: Matrix) -> Self {
        Tensor {
            shape: vec![m.rows, m.cols],
            data: m.data,
        }
    }

    /// Create a tensor of zeros with the given shape.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len: usize = shape.iter().product();
        Tensor {
            data: vec![0.0; len],
            shape,
        }
    }

    /// Compute the flat index for a multi-dimensional coordinate.
    fn offset(&self, idx: &[usize]) -> usize {
        assert_eq!(idx.len(), self.shape.len());
        let mut stride = 1;
        let mut off = 0usize;
        for (i, &dim) in self.shape.iter().rev().enumerate() {
            let id = idx[self.shape.len() - 1 - i];
            assert!(id < dim, "index out of bounds");
            off += id * stride;
            stride *= dim;
        }
        off
    }

    pub fn get(&self, idx: &[usize]) -> f32 {
        self.data[self.offset(idx)]
    }

    pub fn set(&mut self, idx: &[usize], value: f32) {
        let off = self.offset(idx);
        self.data[off] = value;
    }

    /// Change the view of the underlying data without modifying order.
    pub fn reshape(&mut self, new_shape: Vec<usize>) {
        assert_eq!(self.data.len(), new_shape.iter().product::<usize>());
        self.shape = new_shape;
    }

    /// Stack equally shaped matrices along a new leading axis.
    pub fn stack(items: &[Matrix]) -> Tensor {
        if items.is_empty() {
            return Tensor::zeros(vec![0, 0, 0]);
        }
        let (rows, cols) = items[0].shape();
        let mut data = Vec::with_capacity(items.len() * rows * cols);
        for m in items {
            assert_eq!(m.shape(), (rows, cols), "stack: ragged slices");
            data.extend_from_slice(&m.data);
        }
        Tensor::new(data, vec![items.len(), rows, cols])
    }

    /// Slice `i` along the leading axis of a 3-D tensor.
    pub fn slice(&self, i: usize) -> Matrix {
        assert_eq!(self.shape.len(), 3);
        let (rows, cols) = (self.shape[1], self.shape[2]);
        let n = rows * cols;
        Matrix::from_vec(rows, cols, self.data[i * n..(i + 1) * n].to_vec())
    }

    /// All slices along the leading axis of a 3-D tensor.
    pub fn unstack(&self) -> Vec<Matrix> {
        (0..self.shape[0]).map(|i| self.slice(i)).collect()
    }

    /// Swap the first two axes of a 3-D tensor, turning a time-major tensor
    /// into a batch-major one and back.
    pub fn transpose01(&self) -> Tensor {
        assert_eq!(self.shape.len(), 3);
        let (a, b, c) = (self.shape[0], self.shape[1], self.shape[2]);
        let mut out = vec![0.0; self.data.len()];
        for i in 0..a {
            for j in 0..b {
                let src = (i * b + j) * c;
                let dst = (j * a + i) * c;
                out[dst..dst + c].copy_from_slice(&self.data[src..src + c]);
            }
        }
        Tensor::new(out, vec![b, a, c])
    }

    /// Collapse all leading axes into rows, keeping the last axis as columns.
    pub fn to_matrix(&self) -> Matrix {
        let cols = *self.shape.last().unwrap_or(&0);
        let rows = if cols == 0 { 0 } else { self.data.len() / cols };
        Matrix::from_vec(rows, cols, self.data.clone())
    }

    /// Batched matrix multiply of `(b, m, k)` by `(b, k, n)`.
    pub fn bmm(a: &Tensor, b: &Tensor) -> Tensor {
        assert_eq!(a.shape.len(), 3);
        assert_eq!(b.shape.len(), 3);
        assert_eq!(a.shape[0], b.shape[0], "bmm: batch {:?} vs {:?}", a.shape, b.shape);
        let mut out = Vec::with_capacity(a.shape[0] * a.shape[1] * b.shape[2]);
        for i in 0..a.shape[0] {
            out.extend(Matrix::matmul(&a.slice(i), &b.slice(i)).data);
        }
        Tensor::new(out, vec![a.shape[0], a.shape[1], b.shape[2]])
    }
}

/// Integer token-index matrix. Index 0 is the padding sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<usize>,
}

impl TokenMatrix {
    pub fn from_vec(rows: usize, cols: usize, data: Vec<usize>) -> Self {
        assert_eq!(data.len(), rows * cols);
        TokenMatrix { rows, cols, data }
    }

    /// Build from per-sequence rows, right-padding shorter ones with 0.
    pub fn from_sequences(seqs: &[Vec<usize>]) -> Self {
        let cols = seqs.iter().map(Vec::len).max().unwrap_or(0);
        let mut data = vec![0; seqs.len() * cols];
        for (r, seq) in seqs.iter().enumerate() {
            data[r * cols..r * cols + seq.len()].copy_from_slice(seq);
        }
        TokenMatrix::from_vec(seqs.len(), cols, data)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, r: usize, c: usize) -> usize {
        self.data[r * self.cols + c]
    }

    pub fn row(&self, r: usize) -> &[usize] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn transpose(&self) -> TokenMatrix {
        let mut v = vec![0; self.data.len()];
        for i in 0..self.rows {
            for j in 0..self.cols {
                v[j * self.rows + i] = self.get(i, j);
            }
        }
        TokenMatrix::from_vec(self.cols, self.rows, v)
    }
}
