use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use notifications_rs::{
    config::Config,
    handlers::{self, NotificationReactor},
    log::NotificationLog,
    routes::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting notification service...");

    let config = Config::from_env()?;

    tracing::info!(
        "Configuration loaded: host={}, port={}, bus_type={:?}",
        config.host,
        config.port,
        config.bus.kind
    );

    let broker = Arc::new(config.bus.build_broker());
    broker.connect().await?;

    let log = Arc::new(NotificationLog::new());
    let reactor = Arc::new(NotificationReactor::new(
        log.clone(),
        broker.clone(),
        config.service_name.clone(),
    ));
    handlers::registry(reactor)?.start(&broker).await?;

    let app = routes::router(AppState::new(log, broker.clone(), config.service_name.clone()));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Notification service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    broker.close().await?;
    tracing::info!("Notification service stopped");
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
