use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use trip_rs::{
    config::{Config, StoreType},
    reactors::{self, TripReactor},
    routes::{self, AppState},
    store::{InMemoryTripStore, PostgresTripStore, TripStore},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting trip service...");

    let config = Config::from_env()?;

    tracing::info!(
        "Configuration loaded: host={}, port={}, bus_type={:?}, store_type={:?}",
        config.host,
        config.port,
        config.bus.kind,
        config.store_type
    );

    let store: Arc<dyn TripStore> = match config.store_type {
        StoreType::Memory => Arc::new(InMemoryTripStore::new()),
        StoreType::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or("DATABASE_URL must be set")?;

            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;

            tracing::info!("Running migrations...");
            sqlx::migrate!("./db/migrations").run(&pool).await?;

            Arc::new(PostgresTripStore::new(pool))
        }
    };

    // The service cannot work without the bus: a failed connect is fatal
    let broker = Arc::new(config.bus.build_broker());
    broker.connect().await?;

    let reactor = Arc::new(TripReactor::new(store.clone()));
    reactors::registry(reactor)?.start(&broker).await?;

    let app = routes::router(AppState::new(store, broker.clone(), config.service_name.clone()));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Trip service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    broker.close().await?;
    tracing::info!("Trip service stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
