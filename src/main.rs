use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use nexus_trainer::channels::{AppState, cli, session_routes};
use nexus_trainer::config::TrainerConfig;
use nexus_trainer::llm::{Connector, GeminiConnector};
use nexus_trainer::scenario::{GeneratorConfig, ScenarioGenerator};
use nexus_trainer::session::{SessionDriver, SessionMachine};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Serve,
    Cli,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = match std::env::args().nth(1).as_deref() {
        None | Some("serve") => Mode::Serve,
        Some("cli") => Mode::Cli,
        Some(other) => {
            eprintln!("Usage: nexus-trainer [serve|cli]");
            anyhow::bail!("unknown mode: {other}");
        }
    };

    let config = TrainerConfig::from_env().context("invalid configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let connector = Arc::new(
        GeminiConnector::new(&config.gemini_base_url, config.request_timeout)
            .context("failed to create Gemini client")?,
    );
    let server_provider = match &config.api_key {
        Some(key) => Some(
            connector
                .connect(key.clone())
                .context("failed to bind server API key")?,
        ),
        None => None,
    };

    let generator = ScenarioGenerator::new(GeneratorConfig {
        avatar_base_url: config.avatar_base_url.clone(),
        temperature: config.temperature,
    });
    let state = AppState {
        machine: Arc::new(SessionMachine::new(generator)),
        connector,
        server_provider,
        preferred_model: config.default_model.clone(),
    };

    eprintln!("🧬 NEXUS Trainer v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   API key: {}",
        if config.api_key.is_some() { "server (GEMINI_API_KEY)" } else { "per client" }
    );
    eprintln!("   Model: {}", config.default_model.as_deref().unwrap_or("(first listed)"));

    match mode {
        Mode::Serve => {
            let addr = config.listen_addr();
            eprintln!("   Session WS: ws://{addr}/ws/session");
            eprintln!("   API: http://{addr}/api/campaigns, /api/moods, /api/models\n");

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            tracing::info!(addr = %addr, "Session server started");
            axum::serve(listener, session_routes(state))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
        }
        Mode::Cli => {
            let controls = state.new_controls().await;
            let driver = SessionDriver::new(state.machine, state.connector, controls);
            cli::run(driver).await;
        }
    }

    Ok(())
}

/// Stderr logging, plus daily rolling files when a log directory is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "nexus-trainer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();
    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
