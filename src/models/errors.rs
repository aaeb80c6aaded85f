use crate::models::responses::ErrorResponse;
use crate::models::storage::StorageError;
use crate::services::filters::FilterParam;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Every way a catalog request can fail. All of them are the client's to fix,
/// so they all render as `400 Bad Request`.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid query parameters: {}", .0.join(", "))]
    UnknownParameters(Vec<String>),
    #[error("Invalid value {value:?} for '{param}': {reason}")]
    MalformedValue {
        param: &'static str,
        value: String,
        reason: String,
    },
    #[error("An error occurred while filtering books: {0}")]
    Evaluation(String),
}

impl From<StorageError> for CatalogError {
    fn from(err: StorageError) -> Self {
        CatalogError::Evaluation(err.to_string())
    }
}

impl CatalogError {
    pub fn body(&self) -> ErrorResponse {
        let allowed = match self {
            CatalogError::UnknownParameters(_) => Some(
                FilterParam::ALL
                    .iter()
                    .map(|param| param.name().to_string())
                    .collect(),
            ),
            _ => None,
        };

        ErrorResponse {
            detail: self.to_string(),
            allowed,
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.body())).into_response()
    }
}
