use crate::models::errors::CatalogError;
use crate::models::responses::BookListResponse;
use crate::services::catalog::{materialize, Backend};
use crate::services::filters::compile;
use crate::services::projection::project;
use crate::utils::pagination::PageLinks;
use axum::{
    extract::{OriginalUri, RawQuery, State},
    response::Json,
};
use tracing::{info, warn};
use url::form_urlencoded;

pub async fn list_books(
    State(backend): State<Backend>,
    OriginalUri(uri): OriginalUri,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<BookListResponse>, CatalogError> {
    let pairs: Vec<(String, String)> = raw_query
        .as_deref()
        .map(|raw| form_urlencoded::parse(raw.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    info!("Book listing: {:?}", pairs);

    let query = compile(&pairs).map_err(|e| {
        warn!("Rejected book listing: {}", e);
        e
    })?;

    let page = materialize(&backend, &query).await.map_err(|e| {
        warn!("Book listing failed: {}", e);
        e
    })?;

    let links = PageLinks::build(uri.path(), &pairs, page.page, page.count);

    Ok(Json(BookListResponse {
        count: page.count,
        next: links.next,
        previous: links.previous,
        results: page.records.iter().map(project).collect(),
    }))
}
