use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "portcullis", about = "Token issuing and access gate service")]
pub struct Cli {
    /// Settings file; defaults to `settings/dev.toml` or `settings/release.toml`.
    #[arg(long)]
    pub settings: Option<String>,
}
