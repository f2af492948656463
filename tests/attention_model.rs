use seq2seq::layers::{LinearT, RnnCell, RnnState};
use seq2seq::{
    EmbeddingSource, EncoderDecoder, Seq2SeqAttnModel, Seq2SeqConfig, Seq2SeqError, TokenMatrix,
};

fn config(rnn_type: &str, batch_first: bool) -> Seq2SeqConfig {
    Seq2SeqConfig {
        hidden_size: 4,
        num_layers: 1,
        rnn_type: rnn_type.to_string(),
        batch_first,
        max_len: 10,
        dropout: 0.5,
        attention: true,
    }
}

fn build(rnn_type: &str, batch_first: bool) -> Seq2SeqAttnModel {
    Seq2SeqAttnModel::new(
        &EmbeddingSource::new(5, 3),
        &EmbeddingSource::new(4, 3),
        &config(rnn_type, batch_first),
    )
    .unwrap()
}

/// Overwrite every parameter with a fixed pattern.
fn fill_fixed(model: &mut Seq2SeqAttnModel) {
    model.update_parameters(|params| {
        for (k, p) in params.iter_mut().enumerate() {
            for (i, v) in p.w.data.iter_mut().enumerate() {
                *v = ((i * 7 + k * 3) % 11) as f32 / 10.0 - 0.5;
            }
            if let Some(b) = p.b.as_mut() {
                for (i, v) in b.iter_mut().enumerate() {
                    *v = ((i * 5 + k) % 7) as f32 / 20.0 - 0.15;
                }
            }
        }
    });
}

// Reference math on plain vectors, one batch element at a time.

fn lin(x: &[f32], l: &LinearT) -> Vec<f32> {
    let mut y = match &l.b {
        Some(b) => b.clone(),
        None => vec![0.0; l.w.cols],
    };
    for (i, &xi) in x.iter().enumerate() {
        for (j, yj) in y.iter_mut().enumerate() {
            *yj += xi * l.w.data[i * l.w.cols + j];
        }
    }
    y
}

fn sig(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

fn lstm_ref(cell: &RnnCell, x: &[f32], h: &[f32], c: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let RnnCell::Lstm(l) = cell else {
        panic!("expected lstm")
    };
    let g = |wx: &LinearT, wh: &LinearT| -> Vec<f32> {
        lin(x, wx).iter().zip(lin(h, wh)).map(|(a, b)| a + b).collect()
    };
    let i: Vec<f32> = g(&l.w_ii, &l.w_hi).into_iter().map(sig).collect();
    let f: Vec<f32> = g(&l.w_if, &l.w_hf).into_iter().map(sig).collect();
    let gg: Vec<f32> = g(&l.w_ig, &l.w_hg).into_iter().map(f32::tanh).collect();
    let o: Vec<f32> = g(&l.w_io, &l.w_ho).into_iter().map(sig).collect();
    let c2: Vec<f32> = (0..h.len()).map(|k| f[k] * c[k] + i[k] * gg[k]).collect();
    let h2 = (0..h.len()).map(|k| o[k] * c2[k].tanh()).collect();
    (h2, c2)
}

fn gru_ref(cell: &RnnCell, x: &[f32], h: &[f32]) -> Vec<f32> {
    let RnnCell::Gru(g) = cell else {
        panic!("expected gru")
    };
    let r: Vec<f32> = lin(x, &g.w_ir).iter().zip(lin(h, &g.w_hr)).map(|(a, b)| sig(a + b)).collect();
    let z: Vec<f32> = lin(x, &g.w_iz).iter().zip(lin(h, &g.w_hz)).map(|(a, b)| sig(a + b)).collect();
    let xn = lin(x, &g.w_in);
    let hn = lin(h, &g.w_hn);
    (0..h.len())
        .map(|k| {
            let n = (xn[k] + r[k] * hn[k]).tanh();
            (1.0 - z[k]) * n + z[k] * h[k]
        })
        .collect()
}

fn cell_ref(cell: &RnnCell, x: &[f32], h: &[f32], c: &[f32]) -> (Vec<f32>, Vec<f32>) {
    match cell {
        RnnCell::Lstm(_) => lstm_ref(cell, x, h, c),
        RnnCell::Gru(_) => (gru_ref(cell, x, h), c.to_vec()),
    }
}

/// Advance every layer once; layer `l + 1` reads layer `l`'s new output.
fn layers_ref(cells: &[RnnCell], input: Vec<f32>, h: &mut [Vec<f32>], c: &mut [Vec<f32>]) -> Vec<f32> {
    let mut x = input;
    for (l, cell) in cells.iter().enumerate() {
        let (h2, c2) = cell_ref(cell, &x, &h[l], &c[l]);
        h[l] = h2;
        c[l] = c2;
        x = h[l].clone();
    }
    x
}

/// Eval-mode decode of one batch element.
fn reference(model: &Seq2SeqAttnModel, src: &[usize], dst: &[usize]) -> Vec<Vec<f32>> {
    let hsz = model.config().hidden_size;
    let layers = model.config().num_layers;
    let emb = |table: &LinearT, t: usize| table.w.row(t).to_vec();
    let mut h = vec![vec![0.0; hsz]; layers];
    let mut c = h.clone();
    let mut context = Vec::new();
    for &tok in src {
        let top = layers_ref(&model.encoder_rnn.cells, emb(&model.embed_in.table, tok), &mut h, &mut c);
        context.push(top);
    }

    let mut prev = vec![0.0; hsz];
    let mut out = Vec::new();
    for &tok in dst {
        let mut x = emb(&model.embed_out.table, tok);
        x.extend_from_slice(&prev);
        let top = layers_ref(&model.decoder_rnn.layers, x, &mut h, &mut c);
        let q = lin(&top, &model.output_to_attn);
        let scores: Vec<f32> = context
            .iter()
            .map(|ctx| ctx.iter().zip(&q).map(|(a, b)| a * b).sum())
            .collect();
        let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        let mut pooled = vec![0.0; hsz];
        for (ctx, e) in context.iter().zip(&exps) {
            for k in 0..hsz {
                pooled[k] += e / sum * ctx[k];
            }
        }
        pooled.extend_from_slice(&top);
        prev = lin(&pooled, &model.attn_out).into_iter().map(f32::tanh).collect();
        let logits = lin(&prev, &model.preds);
        let m = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let lse = logits.iter().map(|v| (v - m).exp()).sum::<f32>().ln() + m;
        out.push(logits.iter().map(|v| v - lse).collect());
    }
    out
}

fn assert_matches_reference(model: &mut Seq2SeqAttnModel, label: &str) {
    let src = TokenMatrix::from_vec(2, 3, vec![1, 2, 3, 4, 5, 0]);
    let dst = TokenMatrix::from_vec(2, 2, vec![1, 2, 3, 0]);
    let pred = model.forward(&src, &dst).unwrap();
    assert_eq!(pred.shape, vec![2, 2, 5]);

    for b in 0..2 {
        let expected = reference(model, src.row(b), dst.row(b));
        for t in 0..2 {
            for v in 0..5 {
                let got = pred.get(&[b, t, v]);
                assert!(
                    (got - expected[t][v]).abs() < 1e-5,
                    "{label} b={b} t={t} v={v}: {got} vs {}",
                    expected[t][v]
                );
            }
        }
    }
}

#[test]
fn end_to_end_matches_reference_computation() {
    let mut model = build("lstm", true);
    fill_fixed(&mut model);
    model.set_training(false);
    assert_matches_reference(&mut model, "lstm");
}

#[test]
fn two_layer_decode_matches_reference_computation() {
    for kind in ["lstm", "gru"] {
        let cfg = Seq2SeqConfig {
            num_layers: 2,
            ..config(kind, true)
        };
        let mut model =
            Seq2SeqAttnModel::new(&EmbeddingSource::new(5, 3), &EmbeddingSource::new(4, 3), &cfg)
                .unwrap();
        fill_fixed(&mut model);
        model.set_training(false);
        assert_eq!(model.decoder_rnn.num_layers(), 2);
        assert_matches_reference(&mut model, kind);
    }
}

#[test]
fn attention_weights_sum_to_one_every_step() {
    for kind in ["lstm", "gru"] {
        let mut model = build(kind, true);
        let src = TokenMatrix::from_vec(3, 4, vec![1, 2, 3, 4, 5, 1, 0, 0, 2, 2, 2, 2]);
        let dst = TokenMatrix::from_vec(3, 5, vec![1, 2, 3, 4, 1, 2, 0, 0, 0, 0, 4, 4, 3, 2, 1]);
        let (context, state) = model.encode(&src).unwrap();
        let (pred, attention) = model.decode_with_attention(&context, state, &dst).unwrap();
        assert_eq!(pred.shape, vec![3, 5, 5]);
        assert_eq!(attention.shape, vec![5, 3, 4]);
        for row in attention.data.chunks(4) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "{kind}: attention sums to {sum}");
            assert!(row.iter().all(|&a| a >= 0.0));
        }
    }
}

#[test]
fn predictions_are_log_distributions() {
    let mut model = build("gru", true);
    let src = TokenMatrix::from_vec(1, 2, vec![3, 1]);
    let dst = TokenMatrix::from_vec(1, 3, vec![2, 2, 0]);
    let pred = model.forward(&src, &dst).unwrap();
    for row in pred.data.chunks(5) {
        let total: f32 = row.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }
}

#[test]
fn time_major_layout_gives_transposed_output() {
    let mut bf = build("lstm", true);
    fill_fixed(&mut bf);
    bf.set_training(false);
    let mut tf = build("lstm", false);
    fill_fixed(&mut tf);
    tf.set_training(false);

    let src = TokenMatrix::from_vec(2, 3, vec![1, 2, 3, 4, 5, 0]);
    let dst = TokenMatrix::from_vec(2, 4, vec![1, 2, 3, 4, 3, 0, 0, 0]);
    let a = bf.forward(&src, &dst).unwrap();
    let b = tf.forward(&src.transpose(), &dst.transpose()).unwrap();
    assert_eq!(a.shape, vec![2, 4, 5]);
    assert_eq!(b.shape, vec![4, 2, 5]);
    assert_eq!(b.transpose01(), a);
}

#[test]
fn eval_mode_is_deterministic() {
    let mut model = build("lstm", true);
    model.set_training(false);
    let src = TokenMatrix::from_vec(2, 3, vec![1, 2, 3, 4, 5, 0]);
    let dst = TokenMatrix::from_vec(2, 2, vec![1, 2, 3, 0]);
    let a = model.forward(&src, &dst).unwrap();
    let b = model.forward(&src, &dst).unwrap();
    assert_eq!(a.data, b.data);
}

#[test]
fn training_mode_applies_dropout() {
    let mut model = build("lstm", true);
    let src = TokenMatrix::from_vec(2, 3, vec![1, 2, 3, 4, 5, 0]);
    let dst = TokenMatrix::from_vec(2, 6, vec![1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]);
    let a = model.forward(&src, &dst).unwrap();
    let b = model.forward(&src, &dst).unwrap();
    assert_ne!(a.data, b.data);
}

#[test]
fn batch_mismatch_is_a_shape_error() {
    let mut model = build("lstm", true);
    let src = TokenMatrix::from_vec(2, 3, vec![1, 2, 3, 4, 5, 0]);
    let dst = TokenMatrix::from_vec(3, 2, vec![1, 2, 3, 4, 1, 1]);
    let err = model.forward(&src, &dst).unwrap_err();
    assert!(matches!(err, Seq2SeqError::ShapeMismatch(_)), "{err}");
}

#[test]
fn state_of_wrong_kind_is_rejected() {
    let mut model = build("lstm", true);
    let src = TokenMatrix::from_vec(1, 2, vec![1, 2]);
    let dst = TokenMatrix::from_vec(1, 2, vec![1, 2]);
    let (context, _) = model.encode(&src).unwrap();
    let gru_state = RnnState::zeros(seq2seq::layers::CellKind::Gru, 1, 1, 4);
    assert!(model.decode(&context, gru_state, &dst).is_err());
}

#[test]
fn empty_target_yields_empty_prediction() {
    let mut model = build("gru", true);
    let src = TokenMatrix::from_vec(2, 2, vec![1, 2, 3, 4]);
    let dst = TokenMatrix::from_vec(2, 0, vec![]);
    let pred = model.forward(&src, &dst).unwrap();
    assert_eq!(pred.shape, vec![2, 0, 5]);
}
