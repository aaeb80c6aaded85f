use crate::models::entities::{Author, Book, BookRecord, Bookshelf, Format, Language, Subject};
use crate::services::filters::{BookFilter, Clause};
use crate::utils::pagination::PageWindow;
use crate::utils::text::like_pattern;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("Fixture error: {0}")]
    Fixture(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Read-only access to the catalog.
///
/// `count_books` and `fetch_books` must treat a book as one row no matter how
/// many related rows satisfy the filter. `fetch_books` orders by download
/// count descending, then gutenberg id ascending.
#[async_trait]
pub trait CatalogStore {
    fn name(&self) -> &'static str;
    async fn count_books(&self, filter: &BookFilter) -> Result<u64, StorageError>;
    async fn fetch_books(
        &self,
        filter: &BookFilter,
        window: PageWindow,
    ) -> Result<Vec<Book>, StorageError>;
    /// Loads every related collection for `books` in bulk, keeping their order.
    async fn load_relations(&self, books: Vec<Book>) -> Result<Vec<BookRecord>, StorageError>;
    async fn test_connection(&self) -> Result<(), StorageError>;
}

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends `WHERE ...` for `filter` to a query selecting from `books_book b`.
///
/// Relation clauses become `EXISTS` subqueries, so the outer query yields each
/// book at most once and needs no `DISTINCT`.
pub fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookFilter) {
    builder.push(" WHERE TRUE");

    for clause in filter.clauses() {
        builder.push(" AND ");
        match clause {
            Clause::BookIdIn(ids) => {
                builder.push("b.gutenberg_id = ANY(");
                builder.push_bind(ids.clone());
                builder.push(")");
            }
            Clause::LanguageIn(codes) => {
                builder.push(
                    "EXISTS (SELECT 1 FROM books_book_languages bl \
                     JOIN books_language l ON l.id = bl.language_id \
                     WHERE bl.book_id = b.id AND l.code = ANY(",
                );
                builder.push_bind(codes.clone());
                builder.push("))");
            }
            Clause::MimeTypeIn(mime_types) => {
                builder.push(
                    "EXISTS (SELECT 1 FROM books_format f \
                     WHERE f.book_id = b.id AND f.mime_type = ANY(",
                );
                builder.push_bind(mime_types.clone());
                builder.push("))");
            }
            Clause::TopicMatches(keywords) => {
                let patterns: Vec<String> = keywords.iter().map(|k| like_pattern(k)).collect();
                builder.push(
                    "(EXISTS (SELECT 1 FROM books_book_subjects bs \
                     JOIN books_subject s ON s.id = bs.subject_id \
                     WHERE bs.book_id = b.id AND s.name ILIKE ANY(",
                );
                builder.push_bind(patterns.clone());
                builder.push(
                    ")) OR EXISTS (SELECT 1 FROM books_book_bookshelves bb \
                     JOIN books_bookshelf sh ON sh.id = bb.bookshelf_id \
                     WHERE bb.book_id = b.id AND sh.name ILIKE ANY(",
                );
                builder.push_bind(patterns);
                builder.push(")))");
            }
            Clause::AuthorContains(name) => {
                builder.push(
                    "EXISTS (SELECT 1 FROM books_book_authors ba \
                     JOIN books_author a ON a.id = ba.author_id \
                     WHERE ba.book_id = b.id AND a.name ILIKE ",
                );
                builder.push_bind(like_pattern(name));
                builder.push(")");
            }
            Clause::TitleContains(title) => {
                builder.push("b.title ILIKE ");
                builder.push_bind(like_pattern(title));
            }
        }
    }
}

/// Selects one ordered page of books. Books without a download count sort
/// first, as PostgreSQL orders NULLs in a descending sort.
pub fn page_query(filter: &BookFilter, window: PageWindow) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT b.id, b.gutenberg_id, COALESCE(b.title, '') AS title, \
         COALESCE(b.download_count, 0) AS download_count FROM books_book b",
    );
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY b.download_count DESC NULLS FIRST, b.gutenberg_id ASC LIMIT ");
    builder.push_bind(window.limit);
    builder.push(" OFFSET ");
    builder.push_bind(window.offset);
    builder
}

fn group_by_book<T>(rows: Vec<PgRow>, map: impl Fn(&PgRow) -> T) -> HashMap<i32, Vec<T>> {
    let mut grouped: HashMap<i32, Vec<T>> = HashMap::new();
    for row in &rows {
        grouped
            .entry(row.get::<i32, _>("book_id"))
            .or_default()
            .push(map(row));
    }
    grouped
}

#[async_trait]
impl CatalogStore for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn count_books(&self, filter: &BookFilter) -> Result<u64, StorageError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) AS count FROM books_book b");
        push_filter(&mut builder, filter);

        let count = builder
            .build()
            .fetch_one(&self.pool)
            .await?
            .get::<i64, _>("count");

        Ok(count.max(0) as u64)
    }

    async fn fetch_books(
        &self,
        filter: &BookFilter,
        window: PageWindow,
    ) -> Result<Vec<Book>, StorageError> {
        let mut builder = page_query(filter, window);

        debug!("Catalog query: {}", builder.sql());

        let rows = builder.build().fetch_all(&self.pool).await?;

        let books = rows
            .into_iter()
            .map(|row| Book {
                id: row.get("id"),
                gutenberg_id: row.get("gutenberg_id"),
                title: row.get("title"),
                download_count: row.get("download_count"),
            })
            .collect();

        Ok(books)
    }

    async fn load_relations(&self, books: Vec<Book>) -> Result<Vec<BookRecord>, StorageError> {
        if books.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = books.iter().map(|book| book.id).collect();

        let author_rows = sqlx::query(
            r#"
            SELECT ba.book_id, COALESCE(a.name, '') AS name, a.birth_year, a.death_year
            FROM books_book_authors ba
            JOIN books_author a ON a.id = ba.author_id
            WHERE ba.book_id = ANY($1)
            ORDER BY ba.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let subject_rows = sqlx::query(
            r#"
            SELECT bs.book_id, s.name
            FROM books_book_subjects bs
            JOIN books_subject s ON s.id = bs.subject_id
            WHERE bs.book_id = ANY($1)
            ORDER BY bs.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let bookshelf_rows = sqlx::query(
            r#"
            SELECT bb.book_id, sh.name
            FROM books_book_bookshelves bb
            JOIN books_bookshelf sh ON sh.id = bb.bookshelf_id
            WHERE bb.book_id = ANY($1)
            ORDER BY bb.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let language_rows = sqlx::query(
            r#"
            SELECT bl.book_id, l.code
            FROM books_book_languages bl
            JOIN books_language l ON l.id = bl.language_id
            WHERE bl.book_id = ANY($1)
            ORDER BY bl.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let format_rows = sqlx::query(
            r#"
            SELECT f.book_id, f.mime_type, f.url
            FROM books_format f
            WHERE f.book_id = ANY($1)
            ORDER BY f.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        info!(
            "Loaded relations for {} books: {} authors, {} subjects, {} bookshelves, {} languages, {} formats",
            books.len(),
            author_rows.len(),
            subject_rows.len(),
            bookshelf_rows.len(),
            language_rows.len(),
            format_rows.len()
        );

        let mut authors = group_by_book(author_rows, |row| Author {
            name: row.get("name"),
            birth_year: row.get("birth_year"),
            death_year: row.get("death_year"),
        });
        let mut subjects = group_by_book(subject_rows, |row| Subject {
            name: row.get("name"),
        });
        let mut bookshelves = group_by_book(bookshelf_rows, |row| Bookshelf {
            name: row.get("name"),
        });
        let mut languages = group_by_book(language_rows, |row| Language {
            code: row.get("code"),
        });
        let mut formats = group_by_book(format_rows, |row| Format {
            mime_type: row.get("mime_type"),
            url: row.get("url"),
        });

        let records = books
            .into_iter()
            .map(|book| {
                let id = book.id;
                BookRecord {
                    book,
                    authors: authors.remove(&id).unwrap_or_default(),
                    subjects: subjects.remove(&id).unwrap_or_default(),
                    bookshelves: bookshelves.remove(&id).unwrap_or_default(),
                    languages: languages.remove(&id).unwrap_or_default(),
                    formats: formats.remove(&id).unwrap_or_default(),
                }
            })
            .collect();

        Ok(records)
    }

    async fn test_connection(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
