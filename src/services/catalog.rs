use crate::models::entities::{Book, BookRecord};
use crate::models::errors::CatalogError;
use crate::models::storage::CatalogStore;
use crate::services::filters::CatalogQuery;
use crate::utils::pagination::PageWindow;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub type Backend = Arc<dyn CatalogStore + Send + Sync>;

#[derive(Debug)]
pub struct BookPage {
    /// Matching books across all pages.
    pub count: u64,
    pub page: u32,
    pub records: Vec<BookRecord>,
}

/// Keeps the first occurrence of each gutenberg id.
pub fn dedupe_by_identity(books: Vec<Book>) -> Vec<Book> {
    let mut seen = HashSet::new();
    books
        .into_iter()
        .filter(|book| seen.insert(book.gutenberg_id))
        .collect()
}

/// Runs `query` against the store and returns one page with every related
/// collection loaded. Relations are fetched in bulk for the page, never per book.
pub async fn materialize(backend: &Backend, query: &CatalogQuery) -> Result<BookPage, CatalogError> {
    debug!(
        "Materializing {} clauses over relations {:?}",
        query.filter.clauses().len(),
        query.filter.relations()
    );

    let count = backend.count_books(&query.filter).await?;
    let window = PageWindow::for_page(query.page);

    let books = if (window.offset as u64) < count {
        dedupe_by_identity(backend.fetch_books(&query.filter, window).await?)
    } else {
        Vec::new()
    };

    let records = backend.load_relations(books).await?;

    info!(
        "Page {} holds {} of {} matching books",
        query.page,
        records.len(),
        count
    );

    Ok(BookPage {
        count,
        page: query.page,
        records,
    })
}
