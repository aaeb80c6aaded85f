//! Query filter compiler.
//!
//! Turns the raw `(name, value)` pairs of a `/books` request into a
//! [`CatalogQuery`]: a [`BookFilter`] that every backend knows how to
//! evaluate, plus the requested page number.
//!
//! The filter is a conjunction of [`Clause`]s. Clauses that look through a
//! one-to-many relation are existential ("the book has at least one ...")
//! so a book matches once no matter how many related rows satisfy it.

use crate::models::entities::BookRecord;
use crate::models::errors::CatalogError;
use crate::utils::text::contains_ignore_case;
use std::collections::BTreeSet;

/// The closed set of query parameters `/books` understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterParam {
    BookId,
    Language,
    MimeType,
    Topic,
    Author,
    Title,
    Page,
}

impl FilterParam {
    pub const ALL: [FilterParam; 7] = [
        FilterParam::BookId,
        FilterParam::Language,
        FilterParam::MimeType,
        FilterParam::Topic,
        FilterParam::Author,
        FilterParam::Title,
        FilterParam::Page,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterParam::BookId => "book_id",
            FilterParam::Language => "language",
            FilterParam::MimeType => "mime_type",
            FilterParam::Topic => "topic",
            FilterParam::Author => "author",
            FilterParam::Title => "title",
            FilterParam::Page => "page",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|param| param.name() == name)
    }
}

/// Relations a clause has to look through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    Authors,
    Subjects,
    Bookshelves,
    Languages,
    Formats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    BookIdIn(Vec<i32>),
    LanguageIn(Vec<String>),
    MimeTypeIn(Vec<String>),
    /// Any subject or bookshelf name contains any of the keywords.
    TopicMatches(Vec<String>),
    AuthorContains(String),
    TitleContains(String),
}

impl Clause {
    pub fn relations(&self) -> &'static [Relation] {
        match self {
            Clause::BookIdIn(_) | Clause::TitleContains(_) => &[],
            Clause::LanguageIn(_) => &[Relation::Languages],
            Clause::MimeTypeIn(_) => &[Relation::Formats],
            Clause::TopicMatches(_) => &[Relation::Subjects, Relation::Bookshelves],
            Clause::AuthorContains(_) => &[Relation::Authors],
        }
    }

    pub fn matches(&self, record: &BookRecord) -> bool {
        match self {
            Clause::BookIdIn(ids) => ids.contains(&record.book.gutenberg_id),
            Clause::LanguageIn(codes) => record
                .languages
                .iter()
                .any(|language| codes.contains(&language.code)),
            Clause::MimeTypeIn(mime_types) => record
                .formats
                .iter()
                .any(|format| mime_types.contains(&format.mime_type)),
            Clause::TopicMatches(keywords) => keywords.iter().any(|keyword| {
                record
                    .subjects
                    .iter()
                    .any(|subject| contains_ignore_case(&subject.name, keyword))
                    || record
                        .bookshelves
                        .iter()
                        .any(|shelf| contains_ignore_case(&shelf.name, keyword))
            }),
            Clause::AuthorContains(needle) => record
                .authors
                .iter()
                .any(|author| contains_ignore_case(&author.name, needle)),
            Clause::TitleContains(needle) => contains_ignore_case(&record.book.title, needle),
        }
    }
}

/// Conjunction of clauses. An empty filter matches every book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    clauses: Vec<Clause>,
}

impl BookFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn relations(&self) -> BTreeSet<Relation> {
        self.clauses
            .iter()
            .flat_map(|clause| clause.relations().iter().copied())
            .collect()
    }

    pub fn matches(&self, record: &BookRecord) -> bool {
        self.clauses.iter().all(|clause| clause.matches(record))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub filter: BookFilter,
    pub page: u32,
}

/// Request parameters grouped by name, names in first-seen order.
#[derive(Debug, Default)]
pub struct RawParams {
    entries: Vec<(String, Vec<String>)>,
}

impl RawParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut params = RawParams::default();
        for (name, value) in pairs {
            match params.entries.iter_mut().find(|(seen, _)| seen == name) {
                Some((_, values)) => values.push(value.clone()),
                None => params.entries.push((name.clone(), vec![value.clone()])),
            }
        }
        params
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Values of `param` exactly as sent, in arrival order.
    pub fn values(&self, param: FilterParam) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(name, _)| name == param.name())
            .flat_map(|(_, values)| values.iter())
            .map(String::as_str)
            .collect()
    }

    /// Last value, which is how a repeated single-valued parameter resolves.
    pub fn single(&self, param: FilterParam) -> Option<&str> {
        self.values(param).pop()
    }
}

pub fn compile(pairs: &[(String, String)]) -> Result<CatalogQuery, CatalogError> {
    let params = RawParams::from_pairs(pairs);
    reject_unknown(&params)?;

    let mut filter = BookFilter::new();
    for param in FilterParam::ALL {
        if let Some(clause) = interpret(param, &params)? {
            filter = filter.and(clause);
        }
    }

    let page = match params.single(FilterParam::Page) {
        Some(raw) => parse_page(raw)?,
        None => 1,
    };

    Ok(CatalogQuery { filter, page })
}

fn reject_unknown(params: &RawParams) -> Result<(), CatalogError> {
    let unknown: Vec<String> = params
        .names()
        .filter(|name| FilterParam::from_name(name).is_none())
        .map(str::to_string)
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::UnknownParameters(unknown))
    }
}

fn interpret(param: FilterParam, params: &RawParams) -> Result<Option<Clause>, CatalogError> {
    let clause = match param {
        FilterParam::BookId => {
            let values = params.values(param);
            if values.is_empty() {
                return Ok(None);
            }
            let mut ids = Vec::with_capacity(values.len());
            for raw in values {
                let id = parse_book_id(raw)?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Clause::BookIdIn(ids)
        }
        FilterParam::Language => match owned_values(params, param) {
            Some(codes) => Clause::LanguageIn(codes),
            None => return Ok(None),
        },
        FilterParam::MimeType => match owned_values(params, param) {
            Some(mime_types) => Clause::MimeTypeIn(mime_types),
            None => return Ok(None),
        },
        FilterParam::Topic => match owned_values(params, param) {
            Some(keywords) => Clause::TopicMatches(keywords),
            None => return Ok(None),
        },
        // An empty author or title means "any".
        FilterParam::Author => match params.single(param) {
            Some(name) if !name.is_empty() => Clause::AuthorContains(name.to_string()),
            _ => return Ok(None),
        },
        FilterParam::Title => match params.single(param) {
            Some(title) if !title.is_empty() => Clause::TitleContains(title.to_string()),
            _ => return Ok(None),
        },
        FilterParam::Page => return Ok(None),
    };

    Ok(Some(clause))
}

fn owned_values(params: &RawParams, param: FilterParam) -> Option<Vec<String>> {
    let mut values: Vec<String> = Vec::new();
    for value in params.values(param) {
        if !values.iter().any(|seen| seen == value) {
            values.push(value.to_string());
        }
    }
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn parse_book_id(raw: &str) -> Result<i32, CatalogError> {
    raw.trim().parse::<i32>().map_err(|e| CatalogError::MalformedValue {
        param: FilterParam::BookId.name(),
        value: raw.to_string(),
        reason: format!("expected an integer book id ({})", e),
    })
}

fn parse_page(raw: &str) -> Result<u32, CatalogError> {
    match raw.trim().parse::<u32>() {
        Ok(page) if page >= 1 => Ok(page),
        Ok(_) => Err(CatalogError::MalformedValue {
            param: FilterParam::Page.name(),
            value: raw.to_string(),
            reason: "page numbers start at 1".to_string(),
        }),
        Err(e) => Err(CatalogError::MalformedValue {
            param: FilterParam::Page.name(),
            value: raw.to_string(),
            reason: format!("expected a positive integer ({})", e),
        }),
    }
}
