use crate::models::responses::HealthResponse;
use crate::services::catalog::Backend;
use axum::{extract::State, response::Json};
use chrono::Utc;
use tracing::warn;

pub async fn health_check(State(backend): State<Backend>) -> Json<HealthResponse> {
    let status = match backend.test_connection().await {
        Ok(()) => "running",
        Err(e) => {
            warn!("Storage backend check failed: {}", e);
            "degraded"
        }
    };

    Json(HealthResponse {
        service: "catalog-service".to_string(),
        status: status.to_string(),
        backend: backend.name().to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
