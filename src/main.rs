// src/main.rs — Regista entry point

use clap::Parser;

use regista::cli::{Cli, Commands};
use regista::infra::config::Config;
use regista::infra::logger;

#[tokio::main]
async fn main() {
    // Respects RUST_LOG / REGISTA_LOG
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    match cli.command {
        Commands::Serve => regista::cli::serve::run_serve(&config).await,
        Commands::Chat { session } => regista::cli::chat::run_chat(&config, session.as_deref()).await,
        Commands::Queue { action } => regista::cli::queue::run_queue(&config, action).await,
    }
}
