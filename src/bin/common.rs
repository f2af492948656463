/// Options shared by the binary's modes.
#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    /// Optional TOML/JSON configuration path.
    pub config: Option<String>,
    /// Directory to save the model into (or load it from).
    pub out_dir: Option<String>,
    /// Model basename, defaults to "seq2seq".
    pub base: String,
    /// Remaining positional arguments in order.
    pub positional: Vec<String>,
}

/// Parses `--config PATH`, `--out DIR` and `--base NAME`; everything else is
/// collected as positional.
pub fn parse_cli<I>(mut args: I) -> CliArgs
where
    I: Iterator<Item = String>,
{
    let mut cli = CliArgs {
        base: "seq2seq".to_string(),
        ..Default::default()
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => cli.config = args.next(),
            "--out" => cli.out_dir = args.next(),
            "--base" => {
                if let Some(b) = args.next() {
                    cli.base = b;
                }
            }
            _ => cli.positional.push(arg),
        }
    }
    cli
}
