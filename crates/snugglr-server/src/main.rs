use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use snugglr_api::auth::{AppState, AppStateInner};
use snugglr_api::error::expose_error_stacks;
use snugglr_engine::{Engine, Outbox};
use snugglr_gateway::dispatcher::Dispatcher;
use snugglr_server::build_router;
use snugglr_server::config::Config;

const DEFAULT_LOG_FILTER: &str = "snugglr=debug,snugglr_server=debug,snugglr_api=debug,\
    snugglr_gateway=debug,snugglr_engine=debug,snugglr_db=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = Config::load()?;
    expose_error_stacks(config.development);

    // Init database
    let db = Arc::new(snugglr_db::Database::open(&config.db_path)?);

    // Core -> delivery bus
    let (outbox, outbox_rx) = Outbox::new();
    let engine = Engine::new(db, outbox);
    let dispatcher = Dispatcher::new();
    tokio::spawn(dispatcher.clone().run_outbox(outbox_rx));

    let app_state: AppState = Arc::new(AppStateInner {
        engine,
        jwt_secret: config.jwt_secret.clone(),
        token_days: config.token_days,
    });

    let app = build_router(app_state, dispatcher);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        "Snugglr server listening on {} ({})",
        addr,
        if config.development { "development" } else { "production" }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Snugglr server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
