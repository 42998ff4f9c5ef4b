//! Read side of the borrowing ledger

use std::sync::Arc;

use rust_decimal::Decimal;

use super::fines;
use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{Borrowing, BorrowingDetails, BorrowingFilter},
    repository::Repository,
};

#[derive(Clone)]
pub struct LedgerService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl LedgerService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn get(&self, id: i32) -> AppResult<Borrowing> {
        self.repository
            .get_borrowing(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))
    }

    pub async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>> {
        let rows = self.repository.list_borrowings(filter).await?;
        tracing::debug!(count = rows.len(), ?filter, "Listed borrowings");
        Ok(rows)
    }

    /// Listing with overdue state. Open borrowings show the fine they would
    /// incur at `fine_per_day` if returned now.
    pub async fn list_details(
        &self,
        filter: &BorrowingFilter,
        fine_per_day: Decimal,
    ) -> AppResult<Vec<BorrowingDetails>> {
        let now = self.clock.now();
        let rows = self.list(filter).await?;
        rows.into_iter()
            .map(|borrowing| {
                let is_overdue = borrowing.is_open() && now > borrowing.due_at;
                let accrued_fine = match borrowing.fine {
                    Some(fine) => fine,
                    None => fines::fine(borrowing.due_at, now, fine_per_day)?,
                };
                Ok(BorrowingDetails {
                    borrowing,
                    is_overdue,
                    accrued_fine,
                })
            })
            .collect()
    }
}
