//! CLI entry point for the MiniMax streaming chat proxy.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;

mod accumulator;
mod client;
mod config;
mod logging;
mod models;
mod orchestrator;
mod server;
mod tools;

use crate::config::Config;
use crate::server::ServerOptions;

#[derive(Parser, Debug)]
#[command(
    name = "minimax-proxy",
    author,
    version,
    about = "Streaming chat proxy for the MiniMax API with tool calling"
)]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Path to a TOML config file (default: ./minimax-proxy.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print informational log output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    logging::set_verbose(cli.verbose);

    let config = Config::load(cli.config)?;
    server::run(
        config,
        ServerOptions {
            host: cli.host,
            port: cli.port,
        },
    )
    .await
}
