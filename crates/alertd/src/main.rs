//! alertd entry point

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "alertd",
    about = "In-memory alert, silence and notification stores",
    version
)]
struct Cli {
    /// Settings file (TOML); `ALERTCORE__*` variables override it
    #[arg(short, long, env = "ALERTD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    alertd::run(cli.config).await
}
