use anyhow::Context;
use clap::Parser;
use missions_core::Catalog;
use side_missions::config::Config;
use side_missions::{app, AppState};
use tracing::info;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,tower_http=info";

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    subscriber(log_filter()).init();

    let cfg = Config::parse();
    let settings = cfg
        .settings(Catalog::builtin())
        .context("invalid configuration")?;

    let state = AppState::with_persistence(settings, cfg.state_file.clone())
        .await
        .with_context(|| format!("loading {}", cfg.state_file.display()))?;

    let addr = cfg.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(
        addr = %addr,
        state_file = %cfg.state_file.display(),
        roster_size = ?cfg.roster_size,
        "side missions listening"
    );
    axum::serve(listener, app(state))
        .await
        .context("server error")?;
    Ok(())
}
