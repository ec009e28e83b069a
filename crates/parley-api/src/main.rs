//! Parley CLI and quota server entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, sets up tracing, loads config from the data
//! directory, then dispatches to a command handler or starts the quota server.

mod cli;
mod client;
mod http;
mod state;

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parley_infra::config::load_global_config;
use parley_infra::filesystem::resolve_data_dir;
use parley_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use parley_types::config::GlobalConfig;

use cli::{Cli, Commands, SessionCommand};
use client::{ClientOptions, open_store};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tracing_options = TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        json: cli.json,
        otel: cli.otel,
    };
    if let Err(e) = init_tracing(&tracing_options) {
        eprintln!("Warning: could not initialize tracing: {e}");
    }

    // Shell completions don't need config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    let config = load_global_config(&data_dir).await;

    let result = run(cli, &data_dir, config).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli, data_dir: &Path, config: GlobalConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            serve(data_dir, config, cli.quiet).await?;
        }

        Commands::Chat(args) => {
            cli::chat::loop_runner::run_chat(data_dir, &config, ClientOptions::from(args)).await?;
        }

        Commands::Session { action } => {
            let mut store = open_store(data_dir, &config, false).await?;
            match action {
                SessionCommand::List => cli::session::list_sessions(&store, cli.json).await?,
                SessionCommand::New => cli::session::new_session(&mut store, cli.json).await?,
                SessionCommand::Switch { target } => {
                    cli::session::switch_session(&mut store, &target, cli.json).await?
                }
                SessionCommand::Delete { target, force } => {
                    cli::session::delete_session(&mut store, &target, force, cli.json).await?
                }
                SessionCommand::Show { target } => {
                    cli::session::show_session(&store, target.as_deref(), cli.json).await?
                }
            }
        }

        Commands::Usage { server } => {
            let url = server.as_deref().unwrap_or(&config.chat.server_url);
            cli::usage::show_usage(url, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Run the quota server until Ctrl+C or SIGTERM.
async fn serve(data_dir: &Path, config: GlobalConfig, quiet: bool) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let sweep_every = config.quota.sweep_interval_secs;
    let state = AppState::init(data_dir.to_path_buf(), config).await?;

    let sweeper_cancel = CancellationToken::new();
    let sweeper = (sweep_every > 0).then(|| {
        state
            .quota
            .spawn_sweeper(Duration::from_secs(sweep_every), sweeper_cancel.clone())
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, limit = state.quota.limit(), "Quota server listening");

    if !quiet {
        println!(
            "  {} Parley quota server listening on {}",
            console::style("*").cyan().bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!(
            "  {}",
            console::style(format!(
                "{} turns per client per day. Press Ctrl+C to stop",
                state.quota.limit()
            ))
            .dim()
        );
    }

    let router = http::router::build_router(state);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper_cancel.cancel();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            warn!(error = %e, "Quota sweeper ended abnormally");
        }
    }

    if !quiet {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
