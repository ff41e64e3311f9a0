use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod batch;
mod cli;
mod config;
mod events;
mod media;
mod progress;
mod utils;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: cli::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::config_path(args.config.as_deref());
    let settings = match &config_path {
        Some(path) => config::Settings::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::Settings::default(),
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if settings.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match args.command {
        cli::Command::Probe(probe_args) => cli::probe(probe_args, &settings).await,
        cli::Command::Download(download_args) => cli::download(download_args, &settings).await,
        cli::Command::Config(config_args) => {
            cli::show_config(config_args, &settings, config_path.as_deref())
        }
    }
}
