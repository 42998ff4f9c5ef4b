//! Borrowing (loan ledger entry) model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Shortest and longest borrowing period, in days
pub const MIN_PERIOD_DAYS: i64 = 1;
pub const MAX_PERIOD_DAYS: i64 = 60;

/// One checkout of one copy. Open while `returned_at` is null; once closed
/// `returned_at` and `fine` are set and never change again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrowing {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub fine: Option<Decimal>,
}

impl Borrowing {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn status(&self) -> BorrowingStatus {
        if self.is_open() {
            BorrowingStatus::Open
        } else {
            BorrowingStatus::Closed
        }
    }
}

/// Values the engine hands to the store when opening a borrowing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBorrowing {
    pub book_id: i32,
    pub member_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowingStatus {
    Open,
    Closed,
}

/// Listing filter; every field narrows the result
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BorrowingFilter {
    pub status: Option<BorrowingStatus>,
    pub book_id: Option<i32>,
    pub member_id: Option<i32>,
}

impl BorrowingFilter {
    pub fn open_for_book(book_id: i32) -> Self {
        Self {
            status: Some(BorrowingStatus::Open),
            book_id: Some(book_id),
            member_id: None,
        }
    }

    pub fn matches(&self, borrowing: &Borrowing) -> bool {
        self.status.map_or(true, |s| borrowing.status() == s)
            && self.book_id.map_or(true, |id| borrowing.book_id == id)
            && self.member_id.map_or(true, |id| borrowing.member_id == id)
    }
}

/// Borrowing as presented to clients, with overdue state at listing time
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowingDetails {
    #[serde(flatten)]
    pub borrowing: Borrowing,
    pub is_overdue: bool,
    /// Stored fine when closed, fine owed if returned now when open
    pub accrued_fine: Decimal,
}

/// Borrowing after a borrow or return, with the book as left by that transaction
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowingOutcome {
    pub borrowing: Borrowing,
    pub book: super::Book,
}
