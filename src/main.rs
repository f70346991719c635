use std::sync::Arc;

use anyhow::Context;
use clinicbook::{
    app,
    auth::TokenSigner,
    cache::{Cache, MemoryCache, NoCache},
    config::Config,
    db,
    notify::{HttpMailer, LogNotifier, Notifier},
    AppState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "clinicbook=debug,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;
    db::migrate(&db_pool).await.context("running migrations")?;

    let notifier: Arc<dyn Notifier> = match config.mail.clone() {
        Some(mail) => {
            info!(relay = %mail.api_url, "sending mail through relay");
            Arc::new(HttpMailer::new(mail))
        }
        None => {
            info!("no mail relay configured, notifications are only logged");
            Arc::new(LogNotifier)
        }
    };
    let cache: Arc<dyn Cache> = if config.cache_ttl.is_zero() {
        Arc::new(NoCache)
    } else {
        Arc::new(MemoryCache::new(config.cache_ttl))
    };

    let app_state = AppState::new(
        db_pool.clone(),
        TokenSigner::new(config.jwt_secret.as_bytes()),
        cache,
        notifier,
        config.same_slot,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, same_slot = %config.same_slot, "listening");

    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
