use crate::models::entities::BookRecord;
use crate::models::responses::{AuthorDocument, BookDocument, DownloadLink};

pub fn project(record: &BookRecord) -> BookDocument {
    BookDocument {
        title: record.book.title.clone(),
        authors: record
            .authors
            .iter()
            .map(|author| AuthorDocument {
                name: author.name.clone(),
                birth_year: author.birth_year,
                death_year: author.death_year,
            })
            .collect(),
        languages: record
            .languages
            .iter()
            .map(|language| language.code.clone())
            .collect(),
        subjects: record
            .subjects
            .iter()
            .map(|subject| subject.name.clone())
            .collect(),
        bookshelves: record
            .bookshelves
            .iter()
            .map(|shelf| shelf.name.clone())
            .collect(),
        download_links: record
            .formats
            .iter()
            .map(|format| DownloadLink {
                mime_type: format.mime_type.clone(),
                url: format.url.clone(),
            })
            .collect(),
    }
}
