mod cli;
mod engine;
mod model;
mod orchestrator;
mod router;
mod server;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // clap prints usage and exits non-zero on a malformed invocation
    let args = cli::Cli::parse();

    if let Err(e) = cli::run(args).await {
        log::error!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}
