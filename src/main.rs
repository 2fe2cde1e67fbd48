mod aggregate;
mod backup;
mod cli;
mod credentials;
mod error;
mod fmt;
mod forecast;
mod loader;
mod metrics;
mod models;
mod parse;
mod pipeline;
mod render;
mod settings;
mod sheets;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ledgerdash=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.config.as_ref();
    let result = match cli.command {
        Commands::Report { command } => cli::report::run(config, command),
        Commands::Summary { granularity } => cli::summary::run(config, granularity),
        Commands::Backup { force, track } => cli::backup::run(config, force, track),
        Commands::Init { force } => cli::init::run(config, force),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
