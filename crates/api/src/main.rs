use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beacon_api::config::ServerConfig;
use beacon_api::router::build_app_router;
use beacon_api::{background, state::AppState};
use beacon_delivery::{Dispatcher, ExpoPushProvider};
use beacon_engine::{NotificationEngine, PgStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "beacon_api=debug,beacon_engine=debug,beacon_delivery=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = beacon_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    beacon_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    beacon_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Push delivery ---
    let provider = ExpoPushProvider::new(config.push.clone())
        .expect("Failed to build push provider HTTP client");
    let dispatcher = Dispatcher::new(Arc::new(provider), config.dispatch.clone());
    tracing::info!(
        api_url = %config.push.api_url,
        max_concurrency = config.dispatch.max_concurrency,
        "Push dispatcher ready"
    );

    let engine = NotificationEngine::new(Arc::new(PgStore::new(pool)), dispatcher);

    // --- Quota reset ---
    let quota_cancel = CancellationToken::new();
    let quota_handle = tokio::spawn(background::quota_reset::run(
        engine.quota().clone(),
        Duration::from_secs(config.quota_reset_interval_secs),
        quota_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        engine,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    quota_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), quota_handle).await;
    tracing::info!("Quota reset job stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix). In-flight sends run
/// to completion before the server exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
