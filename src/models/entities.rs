use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Row id in `books_book`, the key every join table points at.
    pub id: i32,
    /// Project Gutenberg catalog number. This is the identity exposed by the API.
    pub gutenberg_id: i32,
    pub title: String,
    pub download_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub birth_year: Option<i16>,
    pub death_year: Option<i16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookshelf {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub mime_type: String,
    pub url: String,
}

/// A book together with every related collection, in join-row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub book: Book,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub bookshelves: Vec<Bookshelf>,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub formats: Vec<Format>,
}

impl BookRecord {
    pub fn bare(book: Book) -> Self {
        Self {
            book,
            authors: Vec::new(),
            subjects: Vec::new(),
            bookshelves: Vec::new(),
            languages: Vec::new(),
            formats: Vec::new(),
        }
    }
}
