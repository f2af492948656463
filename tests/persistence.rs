use seq2seq::weights::{load_state, model_path, save_state, ModelKind};
use seq2seq::{
    EmbeddingSource, EncoderDecoder, Seq2SeqAttnModel, Seq2SeqConfig, Seq2SeqError, Seq2SeqModel,
    TokenMatrix,
};

fn cfg(attention: bool) -> Seq2SeqConfig {
    Seq2SeqConfig {
        hidden_size: 5,
        num_layers: 2,
        rnn_type: "gru".into(),
        attention,
        ..Default::default()
    }
}

fn batch() -> (TokenMatrix, TokenMatrix) {
    (
        TokenMatrix::from_vec(2, 3, vec![1, 2, 3, 4, 0, 0]),
        TokenMatrix::from_vec(2, 2, vec![1, 2, 3, 0]),
    )
}

#[test]
fn attention_model_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let dir_str = dir.path().to_str().unwrap();
    let mut model =
        Seq2SeqAttnModel::new(&EmbeddingSource::new(6, 3), &EmbeddingSource::new(4, 3), &cfg(true))
            .unwrap();
    model.set_training(false);
    let path = model.save(dir_str, "attn").unwrap();
    assert_eq!(path, model_path(dir_str, "attn"));
    assert!(path.exists());

    let mut loaded = Seq2SeqAttnModel::load(dir_str, "attn").unwrap();
    loaded.set_training(false);
    let (src, dst) = batch();
    assert_eq!(
        model.forward(&src, &dst).unwrap(),
        loaded.forward(&src, &dst).unwrap()
    );
    assert_eq!(loaded.config(), model.config());
}

#[test]
fn plain_model_round_trips_into_nested_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("runs").join("a");
    let nested = nested.to_str().unwrap();
    let mut model =
        Seq2SeqModel::new(&EmbeddingSource::new(6, 3), &EmbeddingSource::new(4, 2), &cfg(false))
            .unwrap();
    model.save(nested, "plain").unwrap();
    let mut loaded = Seq2SeqModel::load(nested, "plain").unwrap();
    let (src, dst) = batch();
    assert_eq!(
        model.forward(&src, &dst).unwrap(),
        loaded.forward(&src, &dst).unwrap()
    );

    let state = load_state(&model_path(nested, "plain")).unwrap();
    assert_eq!(state.kind, ModelKind::Plain);
    assert_eq!(state.embed_out.dim, 2);
}

#[test]
fn loading_the_other_kind_fails() {
    let dir = tempfile::tempdir().unwrap();
    let dir_str = dir.path().to_str().unwrap();
    let model =
        Seq2SeqModel::new(&EmbeddingSource::new(6, 3), &EmbeddingSource::new(4, 3), &cfg(false))
            .unwrap();
    model.save(dir_str, "m").unwrap();
    assert!(matches!(
        Seq2SeqAttnModel::load(dir_str, "m"),
        Err(Seq2SeqError::Format(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Seq2SeqModel::load(dir.path().to_str().unwrap(), "absent"),
        Err(Seq2SeqError::Io(_))
    ));
}

#[test]
fn frozen_flag_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let dir_str = dir.path().to_str().unwrap();
    let mut frozen = EmbeddingSource::new(6, 3);
    frozen.finetune = false;
    let mut model = Seq2SeqAttnModel::new(&frozen, &EmbeddingSource::new(4, 3), &cfg(true)).unwrap();
    let trainable = model.parameters().len();
    model.save(dir_str, "frozen").unwrap();
    let mut loaded = Seq2SeqAttnModel::load(dir_str, "frozen").unwrap();
    assert_eq!(loaded.parameters().len(), trainable);
    assert!(!loaded.embed_in.finetune());
}

#[test]
fn truncated_weight_buffer_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let dir_str = dir.path().to_str().unwrap();
    let model =
        Seq2SeqModel::new(&EmbeddingSource::new(6, 3), &EmbeddingSource::new(4, 3), &cfg(false))
            .unwrap();
    let mut state = model.to_state();
    state.weights.last_mut().unwrap().w.data.truncate(1);
    save_state(&model_path(dir_str, "short"), &state).unwrap();
    assert!(matches!(
        Seq2SeqModel::load(dir_str, "short"),
        Err(Seq2SeqError::Format(_))
    ));
}
