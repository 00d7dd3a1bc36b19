use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use pairchat::{AppState, auth::Clients, config::Config, db::SqliteStore, feed::ChangeFeed, presence, routes};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn load_clients(config: &Config) -> anyhow::Result<Clients> {
    let Some(path) = &config.client_secret_path else {
        tracing::warn!("CLIENT_SECRET_PATH not set, sign-in is disabled");
        return Ok(Clients::none());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let json = serde_json::Value::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Clients::from_json(&json, &config.public_url)?)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    let feed = ChangeFeed::new(config.feed_capacity);
    let store = SqliteStore::open(&config.database_url, config.db_max_connections, feed.clone())
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    let store = Arc::new(store);

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.public_url.starts_with("https://"))
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(config.session_idle_minutes)));

    let sweep = presence::spawn_staleness_sweep(store.clone(), config.heartbeat, config.stale_after());
    let clients = load_clients(&config).await?;
    let bind_addr = config.bind_addr.clone();
    let app = routes(&config)
        .with_state(AppState::new(store, feed, clients, config))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    sweep.abort();
    // let in-flight presence writes land
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
