//! HTTP-level tests for `GET /books` and `GET /status`, driven through the
//! router with an in-memory catalog.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use catalog_service::build_router;
use catalog_service::models::entities::{
    Author, Book, BookRecord, Bookshelf, Format, Language, Subject,
};
use catalog_service::models::memory::MemoryBackend;
use catalog_service::models::storage::{CatalogStore, StorageError};
use catalog_service::services::catalog::Backend;
use catalog_service::services::filters::{compile, BookFilter};
use catalog_service::utils::pagination::PageWindow;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// Fixture catalog

fn record(
    id: i32,
    gutenberg_id: i32,
    title: &str,
    downloads: i32,
    authors: &[&str],
    subjects: &[&str],
    bookshelves: &[&str],
    languages: &[&str],
    mime_types: &[&str],
) -> BookRecord {
    BookRecord {
        book: Book {
            id,
            gutenberg_id,
            title: title.to_string(),
            download_count: downloads,
        },
        authors: authors
            .iter()
            .map(|name| Author {
                name: name.to_string(),
                birth_year: Some(1800),
                death_year: None,
            })
            .collect(),
        subjects: subjects
            .iter()
            .map(|name| Subject {
                name: name.to_string(),
            })
            .collect(),
        bookshelves: bookshelves
            .iter()
            .map(|name| Bookshelf {
                name: name.to_string(),
            })
            .collect(),
        languages: languages
            .iter()
            .map(|code| Language {
                code: code.to_string(),
            })
            .collect(),
        formats: mime_types
            .iter()
            .map(|mime_type| Format {
                mime_type: mime_type.to_string(),
                url: format!("https://www.gutenberg.org/ebooks/{}/{}", gutenberg_id, mime_type),
            })
            .collect(),
    }
}

fn catalog() -> Vec<BookRecord> {
    let mut records = vec![
        record(
            1,
            11,
            "Alice's Adventures in Wonderland",
            30000,
            &["Carroll, Lewis"],
            &["Fantasy fiction"],
            &["Children's Literature"],
            &["en"],
            &["text/plain", "application/epub+zip"],
        ),
        record(
            2,
            1342,
            "Pride and Prejudice",
            40000,
            &["Austen, Jane"],
            &["Courtship -- Fiction", "Love stories"],
            &["Best Books Ever Listings"],
            &["en"],
            &["text/html", "application/epub+zip"],
        ),
        record(
            3,
            76,
            "Adventures of Huckleberry Finn",
            20000,
            &["Twain, Mark"],
            &["Adventure stories", "Mississippi River -- Fiction"],
            &["Adventure Stories"],
            &["en"],
            &["text/plain"],
        ),
        record(
            4,
            120,
            "Treasure Island",
            15000,
            &["Stevenson, Robert Louis"],
            &["Treasure troves -- Fiction", "Sea Adventures"],
            &["Pirates"],
            &["en"],
            &["text/plain"],
        ),
        record(
            5,
            2000,
            "Don Quijote",
            5000,
            &["Cervantes Saavedra, Miguel de"],
            &["Knights and knighthood -- Spain -- Fiction"],
            &["Adventure Stories"],
            &["es"],
            &["text/plain"],
        ),
        record(
            6,
            74,
            "The Adventures of Tom Sawyer",
            18000,
            &["Twain, Mark"],
            &["Boys -- Fiction"],
            &[],
            &["en"],
            &["application/epub+zip"],
        ),
        record(7, 1, "The Declaration of Independence", 100, &[], &[], &[], &[], &[]),
    ];

    for n in 0..60 {
        records.push(record(
            100 + n,
            5000 + n,
            &format!("Filler Volume {}", n),
            10,
            &["Anonymous"],
            &["Latin language -- Readers"],
            &[],
            &["la"],
            &["text/plain"],
        ));
    }

    records
}

fn app() -> Router {
    let backend: Backend = Arc::new(MemoryBackend::new(catalog()));
    build_router(backend, Duration::from_secs(5))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn titles(body: &Value) -> Vec<String> {
    body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["title"].as_str().unwrap().to_string())
        .collect()
}

const ALLOWED: [&str; 7] = [
    "book_id",
    "language",
    "mime_type",
    "topic",
    "author",
    "title",
    "page",
];

// Parameter validation

#[tokio::test]
async fn unknown_parameters_are_rejected_with_allow_list() {
    let (status, body) = get(app(), "/books?q=alice&author=carroll&sort=title").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid query parameters: q, sort");
    assert_eq!(body["allowed"], json!(ALLOWED));
}

#[tokio::test]
async fn every_unknown_name_set_gets_the_full_allow_list() {
    for query in ["limit=5", "Author=twain", "book_id=11&ids=1", "page=1&offset=0&x="] {
        let (status, body) = get(app(), &format!("/books?{}", query)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {}", query);
        assert_eq!(body["allowed"], json!(ALLOWED), "query {}", query);
    }
}

#[tokio::test]
async fn malformed_book_id_is_a_client_error() {
    let (status, body) = get(app(), "/books?book_id=11&book_id=alice").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("book_id"));
    assert!(detail.contains("alice"));
    assert!(body.get("allowed").is_none());
}

#[tokio::test]
async fn non_numeric_page_is_a_client_error() {
    let (status, body) = get(app(), "/books?page=last").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("page"));
}

// Filters

#[tokio::test]
async fn book_ids_return_each_book_once() {
    let (status, body) = get(app(), "/books?book_id=11&book_id=1342&book_id=11").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(
        titles(&body),
        vec!["Pride and Prejudice", "Alice's Adventures in Wonderland"]
    );
}

#[tokio::test]
async fn topic_matches_subjects_or_bookshelves_without_duplicates() {
    let (status, body) = get(app(), "/books?topic=adventure").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        titles(&body),
        vec![
            "Adventures of Huckleberry Finn",
            "Treasure Island",
            "Don Quijote"
        ]
    );
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn topic_keywords_are_or_combined() {
    let (_, body) = get(app(), "/books?topic=pirates&topic=courtship").await;
    assert_eq!(titles(&body), vec!["Pride and Prejudice", "Treasure Island"]);
}

#[tokio::test]
async fn mime_types_are_or_combined() {
    let (_, body) = get(
        app(),
        "/books?mime_type=text/html&mime_type=application/epub%2Bzip",
    )
    .await;

    assert_eq!(
        titles(&body),
        vec![
            "Pride and Prejudice",
            "Alice's Adventures in Wonderland",
            "The Adventures of Tom Sawyer"
        ]
    );
}

#[tokio::test]
async fn author_match_ignores_case() {
    for author in ["twain", "Twain", "TWAIN"] {
        let (status, body) = get(app(), &format!("/books?author={}", author)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            titles(&body),
            vec!["Adventures of Huckleberry Finn", "The Adventures of Tom Sawyer"],
            "author={}",
            author
        );
    }
}

#[tokio::test]
async fn filters_are_conjunctive() {
    let (_, body) = get(app(), "/books?title=adventures&language=en&mime_type=text/plain").await;
    assert_eq!(
        titles(&body),
        vec!["Alice's Adventures in Wonderland", "Adventures of Huckleberry Finn"]
    );

    let (_, body) = get(app(), "/books?topic=adventure&language=es").await;
    assert_eq!(titles(&body), vec!["Don Quijote"]);
}

#[tokio::test]
async fn title_wildcards_are_literal() {
    let (status, body) = get(app(), "/books?title=%25").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn blank_book_id_is_a_client_error() {
    let (status, body) = get(app(), "/books?book_id=").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("book_id"));
}

#[tokio::test]
async fn blank_page_is_a_client_error() {
    let (status, body) = get(app(), "/books?page=&topic=adventure").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("page"));
}

#[tokio::test]
async fn empty_author_and_title_match_everything() {
    let (status, body) = get(app(), "/books?author=&title=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 67);
}

#[tokio::test]
async fn substring_filters_keep_surrounding_spaces() {
    let (_, body) = get(app(), "/books?title=%20island").await;
    assert_eq!(titles(&body), vec!["Treasure Island"]);

    let (_, body) = get(app(), "/books?title=%20adventures").await;
    assert_eq!(
        titles(&body),
        vec!["Alice's Adventures in Wonderland", "The Adventures of Tom Sawyer"]
    );

    let (_, body) = get(app(), "/books?language=en%20").await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn every_result_satisfies_the_compiled_filter() {
    let queries = [
        "topic=fiction",
        "topic=fiction&language=en",
        "language=la&mime_type=text/plain",
        "author=an&title=e",
        "book_id=1&book_id=76&book_id=5001&topic=stories",
        "mime_type=application/epub%2Bzip&author=austen",
    ];
    let records = catalog();

    for query in queries {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let filter = compile(&pairs).unwrap().filter;

        let (status, body) = get(app(), &format!("/books?{}", query)).await;
        assert_eq!(status, StatusCode::OK, "query {}", query);

        let expected: HashSet<String> = records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.book.title.clone())
            .collect();
        let returned: Vec<String> = titles(&body);
        let unique: HashSet<String> = returned.iter().cloned().collect();

        assert_eq!(unique.len(), returned.len(), "duplicates for {}", query);
        assert!(unique.is_subset(&expected), "query {}", query);
        assert_eq!(body["count"], expected.len() as u64, "query {}", query);
    }
}

// Pagination

#[tokio::test]
async fn pages_are_bounded_and_disjoint() {
    let (_, first) = get(app(), "/books").await;
    let (_, second) = get(app(), "/books?page=2").await;
    let (_, third) = get(app(), "/books?page=3").await;

    assert_eq!(first["count"], 67);
    assert_eq!(titles(&first).len(), 25);
    assert_eq!(titles(&second).len(), 25);
    assert_eq!(titles(&third).len(), 17);

    let mut seen = HashSet::new();
    for page in [&first, &second, &third] {
        for title in titles(page) {
            assert!(seen.insert(title.clone()), "{} repeated across pages", title);
        }
    }
    assert_eq!(seen.len(), 67);

    assert_eq!(titles(&first)[0], "Pride and Prejudice");
    // Ties on download count fall back to gutenberg id.
    assert_eq!(titles(&first)[7], "Filler Volume 0");
}

#[tokio::test]
async fn page_links_follow_the_query() {
    let (_, first) = get(app(), "/books?language=la").await;
    assert_eq!(first["next"], "/books?language=la&page=2");
    assert_eq!(first["previous"], Value::Null);

    let (_, second) = get(app(), "/books?page=2&language=la").await;
    assert_eq!(second["next"], "/books?language=la&page=3");
    assert_eq!(second["previous"], "/books?language=la");

    let (_, last) = get(app(), "/books?language=la&page=3").await;
    assert_eq!(last["next"], Value::Null);
    assert_eq!(last["previous"], "/books?language=la&page=2");
}

#[tokio::test]
async fn page_beyond_the_end_is_empty() {
    let (status, body) = get(app(), "/books?page=40").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 67);
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["next"], Value::Null);
}

#[tokio::test]
async fn identical_requests_give_identical_responses() {
    let (_, a) = get(app(), "/books?topic=fiction&page=1").await;
    let (_, b) = get(app(), "/books?topic=fiction&page=1").await;
    assert_eq!(a, b);
}

// Documents

#[tokio::test]
async fn book_without_relations_serializes_empty_lists() {
    let (_, body) = get(app(), "/books?book_id=1").await;

    assert_eq!(
        body["results"][0],
        json!({
            "title": "The Declaration of Independence",
            "authors": [],
            "languages": [],
            "subjects": [],
            "bookshelves": [],
            "download_links": []
        })
    );
}

#[tokio::test]
async fn document_flattens_relations() {
    let (_, body) = get(app(), "/books?book_id=11").await;
    let doc = &body["results"][0];

    assert_eq!(
        doc["authors"],
        json!([{"name": "Carroll, Lewis", "birth_year": 1800, "death_year": null}])
    );
    assert_eq!(doc["languages"], json!(["en"]));
    assert_eq!(doc["subjects"], json!(["Fantasy fiction"]));
    assert_eq!(doc["bookshelves"], json!(["Children's Literature"]));
    assert_eq!(
        doc["download_links"][1]["mime_type"],
        "application/epub+zip"
    );
}

// Faults

struct BrokenStore {
    panic: bool,
}

#[async_trait]
impl CatalogStore for BrokenStore {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn count_books(&self, _filter: &BookFilter) -> Result<u64, StorageError> {
        if self.panic {
            panic!("index out of bounds");
        }
        Err(StorageError::Connection("connection refused".to_string()))
    }

    async fn fetch_books(
        &self,
        _filter: &BookFilter,
        _window: PageWindow,
    ) -> Result<Vec<Book>, StorageError> {
        Ok(Vec::new())
    }

    async fn load_relations(&self, _books: Vec<Book>) -> Result<Vec<BookRecord>, StorageError> {
        Ok(Vec::new())
    }

    async fn test_connection(&self) -> Result<(), StorageError> {
        Err(StorageError::Connection("connection refused".to_string()))
    }
}

fn broken_app(panic: bool) -> Router {
    let backend: Backend = Arc::new(BrokenStore { panic });
    build_router(backend, Duration::from_secs(5))
}

#[tokio::test]
async fn storage_failures_surface_as_client_errors() {
    let (status, body) = get(broken_app(false), "/books?topic=sea").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "An error occurred while filtering books: Connection error: connection refused"
    );
}

#[tokio::test]
async fn panics_surface_as_client_errors() {
    let (status, body) = get(broken_app(true), "/books").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "An error occurred while filtering books: index out of bounds"
    );
}

// Health

#[tokio::test]
async fn health_reports_backend() {
    let (status, body) = get(app(), "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "catalog-service");
    assert_eq!(body["status"], "running");
    assert_eq!(body["backend"], "memory");

    let (_, body) = get(broken_app(false), "/status").await;
    assert_eq!(body["status"], "degraded");
}
