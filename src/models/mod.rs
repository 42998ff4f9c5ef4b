//! Data models for Bibliotheca

pub mod book;
pub mod borrowing;
pub mod member;

use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{AppError, AppResult};

// Re-export commonly used types
pub use book::{Book, CreateBook, UpdateBook};
pub use borrowing::{
    Borrowing, BorrowingDetails, BorrowingFilter, BorrowingOutcome, BorrowingStatus, NewBorrowing,
};
pub use member::{CreateMember, Member, UpdateMember};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Page selection for catalogue listings (1-based)
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Rows to skip; a page past the addressable range is a validation error
    pub fn offset(&self) -> AppResult<i64> {
        (self.page() - 1)
            .checked_mul(self.per_page())
            .ok_or_else(|| AppError::Validation(format!("page {} is out of range", self.page())))
    }
}
