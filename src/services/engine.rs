//! Inventory consistency engine: borrow, return and copies adjustment.
//!
//! Every transition runs under the exclusive lock of the book it touches
//! (and, for returns, of the borrowing first), re-reads current state,
//! validates it, then hands one guarded write to the store. A failure at
//! any step leaves the catalogue and the ledger untouched.

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use super::{fines, locks::ResourceLocks};
use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        borrowing::{MAX_PERIOD_DAYS, MIN_PERIOD_DAYS},
        Book, BorrowingOutcome, NewBorrowing, UpdateBook,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct InventoryEngine {
    repository: Repository,
    locks: Arc<ResourceLocks>,
    clock: Arc<dyn Clock>,
}

impl InventoryEngine {
    pub fn new(repository: Repository, locks: Arc<ResourceLocks>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            locks,
            clock,
        }
    }

    async fn load_book(&self, book_id: i32) -> AppResult<Book> {
        self.repository
            .get_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }

    /// Check out one copy of `book_id` to `member_id` for `period_days`
    pub async fn borrow(
        &self,
        book_id: i32,
        member_id: i32,
        period_days: i64,
    ) -> AppResult<BorrowingOutcome> {
        if !(MIN_PERIOD_DAYS..=MAX_PERIOD_DAYS).contains(&period_days) {
            return Err(AppError::InvalidPeriod(period_days));
        }

        let _book_guard = self.locks.books.acquire(book_id).await?;

        let book = self.load_book(book_id).await?;
        self.repository
            .get_member(member_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member_id)))?;
        if book.copies_available <= 0 {
            return Err(AppError::OutOfStock(book_id));
        }

        let now = self.clock.now();
        let new = NewBorrowing {
            book_id,
            member_id,
            borrowed_at: now,
            due_at: now + Duration::days(period_days),
        };
        let (borrowing, book) = self.repository.apply_borrow(&new).await?;

        tracing::info!(
            borrowing_id = borrowing.id,
            book_id,
            member_id,
            due_at = %borrowing.due_at,
            copies_available = book.copies_available,
            "Book borrowed"
        );
        Ok(BorrowingOutcome { borrowing, book })
    }

    /// Close an open borrowing, charging `fine_per_day` for each day late
    pub async fn return_borrowing(
        &self,
        borrowing_id: i32,
        fine_per_day: Decimal,
    ) -> AppResult<BorrowingOutcome> {
        if fine_per_day.is_sign_negative() {
            return Err(AppError::Validation(format!(
                "fine_per_day must not be negative, got {}",
                fine_per_day
            )));
        }

        // borrowing before book; borrows never hold a borrowing lock, so no cycle
        let _borrowing_guard = self.locks.borrowings.acquire(borrowing_id).await?;

        let borrowing = self
            .repository
            .get_borrowing(borrowing_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", borrowing_id)))?;
        if !borrowing.is_open() {
            return Err(AppError::AlreadyReturned(borrowing_id));
        }

        let _book_guard = self.locks.books.acquire(borrowing.book_id).await?;

        let now = self.clock.now();
        let fine = fines::fine(borrowing.due_at, now, fine_per_day)?;
        let (borrowing, book) = self.repository.apply_return(borrowing_id, now, fine).await?;

        tracing::info!(
            borrowing_id,
            book_id = book.id,
            member_id = borrowing.member_id,
            fine = %fine,
            copies_available = book.copies_available,
            "Book returned"
        );
        Ok(BorrowingOutcome { borrowing, book })
    }

    /// Set a book's total copies, recomputing the available count from its
    /// open borrowings
    pub async fn adjust_total_copies(&self, book_id: i32, new_total: i32) -> AppResult<Book> {
        let _book_guard = self.locks.books.acquire(book_id).await?;
        self.load_book(book_id).await?;
        self.check_adjustment(book_id, new_total).await?;
        self.apply_adjustment(book_id, new_total).await
    }

    /// Catalogue edit of a book. Bibliographic fields are written as given;
    /// `copies_total` goes through the same reconciliation as
    /// [`InventoryEngine::adjust_total_copies`]. Both land in one store write,
    /// so a rejected total leaves the title untouched too.
    pub async fn edit_book(&self, book_id: i32, patch: &UpdateBook) -> AppResult<Book> {
        if patch.copies_available.is_some() {
            return Err(AppError::Validation(
                "copies_available is derived from open borrowings and cannot be set".to_string(),
            ));
        }

        let _book_guard = self.locks.books.acquire(book_id).await?;
        let book = self.load_book(book_id).await?;

        let new_total = patch.copies_total.filter(|total| *total != book.copies_total);
        let details = patch.details();
        if details.is_empty() && new_total.is_none() {
            return Ok(book);
        }

        let book = self
            .repository
            .apply_book_edit(book_id, &details, new_total)
            .await?;
        tracing::info!(
            book_id,
            copies_total = book.copies_total,
            copies_available = book.copies_available,
            "Book edited"
        );
        Ok(book)
    }

    async fn check_adjustment(&self, book_id: i32, new_total: i32) -> AppResult<()> {
        let open = self.repository.count_open_borrowings(book_id).await?;
        if new_total < 0 || i64::from(new_total) < open {
            return Err(AppError::InvalidAdjustment(format!(
                "book {} has {} open borrowings, cannot set total to {}",
                book_id, open, new_total
            )));
        }
        Ok(())
    }

    async fn apply_adjustment(&self, book_id: i32, new_total: i32) -> AppResult<Book> {
        let book = self.repository.apply_adjustment(book_id, new_total).await?;
        tracing::info!(
            book_id,
            copies_total = book.copies_total,
            copies_available = book.copies_available,
            "Copies adjusted"
        );
        Ok(book)
    }
}
