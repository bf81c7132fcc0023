mod cli;
mod commands;
mod error;
mod progress;
mod settings;
mod utils;

use std::process;

use bvdl_engine::CancellationToken;
use clap::Parser;
use tracing::{Level, debug, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    error::Result,
    settings::Settings,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    let mut settings = Settings::load(args.settings.as_deref())?;
    debug!(path = %settings.path().display(), "Settings loaded");

    match args.command {
        Commands::Download(download) => {
            let token = CancellationToken::new();
            spawn_interrupt_handler(token.clone());
            commands::download::run(download, &settings, args.quiet, token).await
        }
        Commands::Settings { action } => commands::settings::run(action, &mut settings),
    }
}

/// Cancel `token` on the first Ctrl-C.
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling the active download");
            token.cancel();
        }
    });
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
}
