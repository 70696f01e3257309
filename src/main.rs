use medrecord_server::{
    AppState, RouteTable,
    bootstrap::Bootstrapper,
    config::{AppConfig, Env},
    create_router,
    repository::{RepositoryState, SqliteRepository},
};
use sqlx::sqlite::SqlitePoolOptions;
use std::{process::ExitCode, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, the storage bootstrap sequence, then the HTTP
/// server. Any failure before the listener is bound exits with status 1.
#[tokio::main]
async fn main() -> ExitCode {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Logging: pretty locally, JSON in production for log aggregation.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "medrecord_server=debug,access=info,tower_http=info".into());
    match config.env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Storage Handle: the pool opens no connection until the bootstrap pings it.
    let pool = match SqlitePoolOptions::new()
        .max_connections(5)
        .connect_lazy(&config.db_url)
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server - invalid DATABASE_URL");
            return ExitCode::FAILURE;
        }
    };
    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;

    // 4. Bootstrap: connect -> schema sync -> seed. Strictly sequential.
    let mut bootstrap = Bootstrapper::new(repo.clone(), config.schema_sync);
    match bootstrap.run().await {
        Ok(report) => tracing::info!(
            created = ?report.created,
            existing = ?report.existing,
            "storage ready"
        ),
        Err(e) => {
            tracing::error!(stage = ?e.stage(), error = %e, "Failed to start server - DB error");
            return ExitCode::FAILURE;
        }
    }

    // 5. Router and Server Startup
    let port = config.port;
    let env_label = config.env.label();
    let app = create_router(AppState { repo, config }, RouteTable::default());

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, port, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = bootstrap.mark_serving() {
        tracing::error!(error = %e, "Refusing to serve");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server running on http://localhost:{port}");
    tracing::info!("Internal Address: http://0.0.0.0:{port}");
    tracing::info!("Database: SQLite ({env_label})");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server shutdown complete");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, starting graceful shutdown"),
        _ = terminate => tracing::info!("SIGTERM received, starting graceful shutdown"),
    }
}
