// src/main.rs
use anyhow::Result;
use clap::Parser;
use noteflow::cli::args::Args;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables take precedence
    let env_file = noteflow::config::load_env_file(None)?;

    let args = Args::parse();

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("noteflow={}", filter).parse()?),
        )
        .init();
    debug!(?env_file, "Environment loaded");

    noteflow::run(args).await
}
