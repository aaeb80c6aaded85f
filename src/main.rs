use catalog_service::build_router;
use catalog_service::config::{BackendKind, Config};
use catalog_service::models::memory::MemoryBackend;
use catalog_service::models::storage::PostgresBackend;
use catalog_service::services::catalog::Backend;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("catalog_service=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let backend: Backend = match config.backend {
        BackendKind::Postgres => {
            info!("Using PostgreSQL backend");
            match PostgresBackend::new(&config.database_url, config.pool_size).await {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    error!("Failed to connect to PostgreSQL: {}", e);
                    std::process::exit(1);
                }
            }
        }
        BackendKind::Memory => {
            info!("Using in-memory backend from {}", config.fixture_path);
            match MemoryBackend::from_json_file(&config.fixture_path) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    error!("Failed to load catalog fixture: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    if let Err(e) = backend.test_connection().await {
        error!("Failed to connect to storage backend: {}", e);
        std::process::exit(1);
    }
    info!("Storage backend connection successful");

    let app = build_router(backend, config.request_timeout);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Catalog service starting on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
