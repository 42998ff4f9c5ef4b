//! Repository layer: catalogue records, the borrowing ledger, and the
//! atomic transitions that keep copy counts in step with open borrowings.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    error::AppResult,
    models::{
        book::BookDetailsPatch, Book, Borrowing, BorrowingFilter, CreateBook, CreateMember, Member,
        NewBorrowing, UpdateMember,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage backend.
///
/// The `apply_*` methods are guarded compare-and-swap transitions: each one
/// re-checks its precondition inside the same atomic unit that writes, so a
/// failed call leaves every record exactly as it was. Readers never observe
/// a book count that disagrees with the ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // CATALOGUE
    // =========================================================================

    /// Insert a book with `copies_available = copies_total`.
    /// Fails with `Conflict` when the ISBN is taken.
    async fn create_book(&self, data: &CreateBook) -> AppResult<Book>;

    async fn get_book(&self, id: i32) -> AppResult<Option<Book>>;

    /// Books ordered by id, with the total count
    async fn list_books(&self, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)>;


    /// Fails with `BookInUse` while the book has open borrowings
    async fn delete_book(&self, id: i32) -> AppResult<()>;

    async fn create_member(&self, data: &CreateMember) -> AppResult<Member>;

    async fn get_member(&self, id: i32) -> AppResult<Option<Member>>;

    /// Members ordered by id, with the total count
    async fn list_members(&self, offset: i64, limit: i64) -> AppResult<(Vec<Member>, i64)>;

    async fn update_member(&self, id: i32, patch: &UpdateMember) -> AppResult<Member>;

    /// Fails with `MemberInUse` while the member has open borrowings
    async fn delete_member(&self, id: i32) -> AppResult<()>;

    // =========================================================================
    // LEDGER
    // =========================================================================

    async fn get_borrowing(&self, id: i32) -> AppResult<Option<Borrowing>>;

    /// Matching borrowings ordered by `borrowed_at`, ties in insertion order
    async fn list_borrowings(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>>;

    async fn count_open_borrowings(&self, book_id: i32) -> AppResult<i64>;

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Take one copy and open a borrowing.
    /// Guards: book and member exist, `copies_available > 0`.
    async fn apply_borrow(&self, new: &NewBorrowing) -> AppResult<(Borrowing, Book)>;

    /// Close a borrowing and give its copy back.
    /// Guard: the borrowing is still open.
    async fn apply_return(
        &self,
        borrowing_id: i32,
        returned_at: DateTime<Utc>,
        fine: Decimal,
    ) -> AppResult<(Borrowing, Book)>;

    /// Set `copies_total` and recompute `copies_available` from the open count.
    /// Guard: the result is not negative.
    async fn apply_adjustment(&self, book_id: i32, new_total: i32) -> AppResult<Book>;

    /// Write bibliographic fields and, when given, a new `copies_total` as one
    /// unit. Guards: the ISBN is free, the adjustment would pass
    /// [`Store::apply_adjustment`].
    async fn apply_book_edit(
        &self,
        book_id: i32,
        details: &BookDetailsPatch,
        new_total: Option<i32>,
    ) -> AppResult<Book>;

    /// Backend liveness, used by the readiness probe
    async fn ping(&self) -> AppResult<()>;
}

/// Shared handle to the configured backend
pub type Repository = Arc<dyn Store>;
