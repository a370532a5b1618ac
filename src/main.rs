use anyhow::{Context, Result};
use clap::Parser;
use livebubbles::{
    AppState,
    client,
    config::{Cli, Command, ServerConfig},
    store::{self, Store},
};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Join {
            url,
            session,
            username,
        }) => client::run_join_client(&url, &session, &username).await,
        Some(Command::Serve) | None => serve(ServerConfig::try_from(cli.server)?).await,
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    info!(
        listen_addr = %config.listen_addr,
        empty_session_ttl_secs = config.empty_session_ttl.as_secs(),
        "starting livebubbles signaling server"
    );

    let store = Store::shared();
    let reaper = store::spawn_reaper(store.clone(), config.reap_interval, config.empty_session_ttl);
    let app = livebubbles::app(AppState {
        store: store.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind listener")?;
    info!("livebubbles listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown with error")?;

    info!(
        grace_seconds = config.shutdown_grace.as_secs(),
        "shutdown signal received; sleeping for graceful period"
    );
    reaper.abort();
    tokio::time::sleep(config.shutdown_grace).await;

    let store = store.lock();
    info!(
        sessions = store.rooms.session_count(),
        members = store.rooms.member_count(),
        "dropping session store"
    );
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}
