//! Book (catalogue title) model and related types

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// ISBN-10 or ISBN-13, hyphens allowed between digit groups
static ISBN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d[\d-]{8,15}[\dXx])$").expect("valid ISBN regex"));

pub(crate) fn validate_isbn(isbn: &str) -> Result<(), ValidationError> {
    if !ISBN_RE.is_match(isbn) {
        return Err(ValidationError::new("isbn_format"));
    }
    let digits = isbn.chars().filter(|c| *c != '-').count();
    match digits {
        10 => Ok(()),
        13 if !isbn.ends_with(['X', 'x']) => Ok(()),
        _ => Err(ValidationError::new("isbn_length")),
    }
}

/// Book record. `copies_available` always equals `copies_total` minus the
/// number of open borrowings for the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub copies_total: i32,
    pub copies_available: i32,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(custom(function = "validate_isbn", message = "Invalid ISBN"))]
    pub isbn: String,
    #[validate(range(min = 0, message = "Copies total cannot be negative"))]
    pub copies_total: i32,
}

/// Partial book update. `copies_total` is reconciled against open
/// borrowings; `copies_available` is derived and may not be set.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Author cannot be empty"))]
    pub author: Option<String>,
    #[validate(custom(function = "validate_isbn", message = "Invalid ISBN"))]
    pub isbn: Option<String>,
    pub copies_total: Option<i32>,
    pub copies_available: Option<i32>,
}

impl UpdateBook {
    /// Bibliographic part of the patch, the only part the store applies directly
    pub fn details(&self) -> BookDetailsPatch {
        BookDetailsPatch {
            title: self.title.clone(),
            author: self.author.clone(),
            isbn: self.isbn.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDetailsPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
}

impl BookDetailsPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.isbn.is_none()
    }

    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if let Some(ref isbn) = self.isbn {
            book.isbn = isbn.clone();
        }
    }
}

/// Request body for an explicit copies-total adjustment
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustCopies {
    pub copies_total: i32,
}
