mod auth;
mod error;
mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use axum::Router;
use litecode_common::config::{AppConfig, StoreBackend};
use litecode_common::store::{MemoryStore, ProblemStore, RedisStore, SubmissionStore};
use litecode_judge::{JudgeClient, LanguageRegistry, SubmissionDispatcher};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub struct AppState {
    pub problems: Arc<dyn ProblemStore>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub dispatcher: SubmissionDispatcher,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("LiteCode API booting...");

    let config = AppConfig::from_env().context("Invalid configuration")?;

    let languages = LanguageRegistry::load_or_builtin(&config.languages_path)
        .context("Failed to load language configuration")?;

    let (problems, submissions): (Arc<dyn ProblemStore>, Arc<dyn SubmissionStore>) =
        match config.store_backend {
            StoreBackend::Redis => {
                let client = redis::Client::open(config.redis_url.as_str())
                    .context("Failed to create Redis client")?;
                let conn = ConnectionManager::new(client)
                    .await
                    .context("Failed to connect to Redis")?;
                info!(redis_url = %config.redis_url, "Connected to Redis");

                let store = Arc::new(RedisStore::new(conn));
                (store.clone(), store)
            }
            StoreBackend::Memory => {
                info!("Using in-memory store; data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    let judge = JudgeClient::new(config.judge.clone()).context("Failed to build judge client")?;
    info!(judge_url = %config.judge.base_url, "Judge client ready");

    let dispatcher = SubmissionDispatcher::new(
        Arc::new(judge),
        submissions.clone(),
        Arc::new(languages),
        config.poll,
    );

    let state = Arc::new(AppState {
        problems,
        submissions,
        dispatcher,
    });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("LiteCode API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
