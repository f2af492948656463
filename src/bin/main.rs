use std::env;
use std::process::ExitCode;

use seq2seq::{
    EmbeddingSource, EncoderDecoder, Result, Seq2SeqAttnModel, Seq2SeqConfig, Seq2SeqModel,
    SequenceCriterion, TokenMatrix,
};

mod common;

const SRC_VOCAB: usize = 20;
const DST_VOCAB: usize = 16;
const EMBED_DIM: usize = 8;

fn main() -> ExitCode {
    env_logger::init();
    let cli = common::parse_cli(env::args().skip(1));
    let mode = cli.positional.first().map(String::as_str).unwrap_or("run");

    let res = match mode {
        "run" => run(&cli),
        "inspect" => inspect(&cli),
        other => {
            eprintln!("Unknown mode {other}");
            eprintln!("Usage: seq2seq [run|inspect] [--config PATH] [--out DIR] [--base NAME]");
            return ExitCode::FAILURE;
        }
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &common::CliArgs) -> Result<Seq2SeqConfig> {
    match &cli.config {
        Some(path) => Seq2SeqConfig::from_path(path),
        None => Ok(Seq2SeqConfig {
            hidden_size: 16,
            ..Default::default()
        }),
    }
}

/// Synthetic batch: three batch-major sequences with trailing padding.
fn sample_batch(batch_first: bool) -> (TokenMatrix, TokenMatrix) {
    let src = TokenMatrix::from_sequences(&[vec![3, 7, 2, 9], vec![4, 4, 1], vec![12, 5]]);
    let dst = TokenMatrix::from_sequences(&[vec![2, 6, 1], vec![3, 3], vec![8, 11, 4]]);
    if batch_first {
        (src, dst)
    } else {
        (src.transpose(), dst.transpose())
    }
}

fn run(cli: &common::CliArgs) -> Result<()> {
    let cfg = load_config(cli)?;
    let embed_in = EmbeddingSource::new(SRC_VOCAB, EMBED_DIM);
    let embed_out = EmbeddingSource::new(DST_VOCAB, EMBED_DIM);
    if cfg.attention {
        let model = Seq2SeqAttnModel::new(&embed_in, &embed_out, &cfg)?;
        score(model, &cfg, cli)
    } else {
        let model = Seq2SeqModel::new(&embed_in, &embed_out, &cfg)?;
        score(model, &cfg, cli)
    }
}

fn score<M: EncoderDecoder>(mut model: M, cfg: &Seq2SeqConfig, cli: &common::CliArgs) -> Result<()> {
    let (src, dst) = sample_batch(cfg.batch_first);
    model.set_training(false);
    let pred = model.forward(&src, &dst)?;
    let crit = model.create_loss();
    let targets = if cfg.batch_first { dst.clone() } else { dst.transpose() };
    let pred_bm = if cfg.batch_first { pred.clone() } else { pred.transpose01() };
    let loss = crit.forward(&pred_bm, &targets)?;
    let tokens = SequenceCriterion::count_tokens(&targets);
    log::info!(
        "predictions {:?}, loss {loss:.4} over {tokens} tokens ({:.4} per token)",
        pred.shape,
        loss / tokens.max(1) as f32
    );
    let blocks = model.weights().len();
    let trainable = model.parameters().len();
    log::info!("{blocks} parameter blocks, {trainable} trainable");
    if let Some(dir) = &cli.out_dir {
        let path = model.save(dir, &cli.base)?;
        println!("{}", path.display());
    }
    Ok(())
}

fn inspect(cli: &common::CliArgs) -> Result<()> {
    let dir = cli.out_dir.as_deref().unwrap_or(".");
    let state = seq2seq::weights::load_state(&seq2seq::weights::model_path(dir, &cli.base))?;
    let values: usize = state
        .weights
        .iter()
        .map(|l| l.w.data.len() + l.b.as_ref().map_or(0, Vec::len))
        .sum();
    println!(
        "{:?} model: {} {} layers, hidden {}, vocab {} -> {}, {} parameters",
        state.kind,
        state.config.cell_kind().name(),
        state.config.num_layers,
        state.config.hidden_size,
        state.embed_in.vocab_size,
        state.embed_out.vocab_size,
        values
    );
    Ok(())
}
