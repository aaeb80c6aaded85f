use crate::models::entities::{Book, BookRecord};
use crate::models::storage::{CatalogStore, StorageError};
use crate::services::filters::BookFilter;
use crate::utils::pagination::PageWindow;
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

/// Whole catalog held in memory, loaded from a JSON array of [`BookRecord`]s.
pub struct MemoryBackend {
    /// Sorted by download count descending, then gutenberg id ascending.
    records: Vec<BookRecord>,
    by_row_id: HashMap<i32, usize>,
}

impl MemoryBackend {
    pub fn new(mut records: Vec<BookRecord>) -> Self {
        records.sort_by_key(|record| (Reverse(record.book.download_count), record.book.gutenberg_id));

        let mut seen = HashSet::new();
        records.retain(|record| seen.insert(record.book.gutenberg_id));

        let by_row_id = records
            .iter()
            .enumerate()
            .map(|(index, record)| (record.book.id, index))
            .collect();

        Self { records, by_row_id }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let records: Vec<BookRecord> = serde_json::from_str(&raw)?;
        info!(
            "Loaded {} books from {}",
            records.len(),
            path.as_ref().display()
        );
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn matching<'a>(&'a self, filter: &'a BookFilter) -> impl Iterator<Item = &'a BookRecord> {
        self.records.iter().filter(move |record| filter.matches(record))
    }
}

#[async_trait]
impl CatalogStore for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn count_books(&self, filter: &BookFilter) -> Result<u64, StorageError> {
        Ok(self.matching(filter).count() as u64)
    }

    async fn fetch_books(
        &self,
        filter: &BookFilter,
        window: PageWindow,
    ) -> Result<Vec<Book>, StorageError> {
        let books = self
            .matching(filter)
            .skip(window.offset.max(0) as usize)
            .take(window.limit.max(0) as usize)
            .map(|record| record.book.clone())
            .collect();
        Ok(books)
    }

    async fn load_relations(&self, books: Vec<Book>) -> Result<Vec<BookRecord>, StorageError> {
        books
            .into_iter()
            .map(|book| match self.by_row_id.get(&book.id) {
                Some(&index) => Ok(self.records[index].clone()),
                None => Err(StorageError::Connection(format!(
                    "book row {} is not in the loaded catalog",
                    book.id
                ))),
            })
            .collect()
    }

    async fn test_connection(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
