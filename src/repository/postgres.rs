//! Postgres store. Transitions run in one transaction each, with guarded
//! `UPDATE ... WHERE` statements acting as compare-and-swap on the book
//! row, so the copy invariants also hold across several server instances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, Transaction};

use super::Store;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookDetailsPatch, Book, Borrowing, BorrowingFilter, BorrowingStatus, CreateBook,
        CreateMember, Member, NewBorrowing, UpdateMember,
    },
};

fn map_unique_isbn(err: sqlx::Error, isbn: &str) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict(format!("ISBN {} already exists", isbn))
        }
        other => AppError::Database(other),
    }
}

async fn lock_book(tx: &mut Transaction<'_, Postgres>, book_id: i32) -> AppResult<()> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
        .bind(book_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
    Ok(())
}

/// Locks the book row and returns the available count `new_total` leaves
async fn reconciled_available(
    tx: &mut Transaction<'_, Postgres>,
    book_id: i32,
    new_total: i32,
) -> AppResult<i32> {
    lock_book(tx, book_id).await?;

    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM borrowings WHERE book_id = $1 AND returned_at IS NULL",
    )
    .bind(book_id)
    .fetch_one(&mut **tx)
    .await?;

    let available = i64::from(new_total) - open;
    if new_total < 0 || available < 0 {
        return Err(AppError::InvalidAdjustment(format!(
            "book {} has {} open borrowings, cannot set total to {}",
            book_id, open, new_total
        )));
    }
    Ok(available as i32)
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_book(&self, data: &CreateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, copies_total, copies_available)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.isbn)
        .bind(data.copies_total)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_isbn(e, &data.isbn))
    }

    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn list_books(&self, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY id LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok((books, total))
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_book(&mut tx, id).await?;

        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrowings WHERE book_id = $1 AND returned_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if in_use {
            return Err(AppError::BookInUse(id));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_member(&self, data: &CreateMember) -> AppResult<Member> {
        let member = sqlx::query_as::<_, Member>(
            "INSERT INTO members (name, email, phone) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    async fn get_member(&self, id: i32) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }

    async fn list_members(&self, offset: i64, limit: i64) -> AppResult<(Vec<Member>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
            .fetch_one(&self.pool)
            .await?;
        let members =
            sqlx::query_as::<_, Member>("SELECT * FROM members ORDER BY id LIMIT $1 OFFSET $2")
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
        Ok((members, total))
    }

    async fn update_member(&self, id: i32, patch: &UpdateMember) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            r#"
            UPDATE members SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(&patch.phone)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    async fn delete_member(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // blocks concurrent borrows, which take FOR SHARE on the member row
        sqlx::query_scalar::<_, i32>("SELECT id FROM members WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))?;

        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrowings WHERE member_id = $1 AND returned_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if in_use {
            return Err(AppError::MemberInUse(id));
        }

        sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_borrowing(&self, id: i32) -> AppResult<Option<Borrowing>> {
        let borrowing = sqlx::query_as::<_, Borrowing>("SELECT * FROM borrowings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(borrowing)
    }

    async fn list_borrowings(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>> {
        let open = filter.status.map(|s| s == BorrowingStatus::Open);
        let rows = sqlx::query_as::<_, Borrowing>(
            r#"
            SELECT * FROM borrowings
            WHERE ($1::boolean IS NULL OR (returned_at IS NULL) = $1)
              AND ($2::integer IS NULL OR book_id = $2)
              AND ($3::integer IS NULL OR member_id = $3)
            ORDER BY borrowed_at, id
            "#,
        )
        .bind(open)
        .bind(filter.book_id)
        .bind(filter.member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_open_borrowings(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrowings WHERE book_id = $1 AND returned_at IS NULL",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn apply_borrow(&self, new: &NewBorrowing) -> AppResult<(Borrowing, Book)> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, i32>("SELECT id FROM members WHERE id = $1 FOR SHARE")
            .bind(new.member_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", new.member_id)))?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET copies_available = copies_available - 1
            WHERE id = $1 AND copies_available > 0
            RETURNING *
            "#,
        )
        .bind(new.book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let book = match book {
            Some(book) => book,
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                        .bind(new.book_id)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(if exists {
                    AppError::OutOfStock(new.book_id)
                } else {
                    AppError::NotFound(format!("Book with id {} not found", new.book_id))
                });
            }
        };

        let borrowing = sqlx::query_as::<_, Borrowing>(
            r#"
            INSERT INTO borrowings (book_id, member_id, borrowed_at, due_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new.book_id)
        .bind(new.member_id)
        .bind(new.borrowed_at)
        .bind(new.due_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((borrowing, book))
    }

    async fn apply_return(
        &self,
        borrowing_id: i32,
        returned_at: DateTime<Utc>,
        fine: Decimal,
    ) -> AppResult<(Borrowing, Book)> {
        let mut tx = self.pool.begin().await?;

        let borrowing = sqlx::query_as::<_, Borrowing>(
            r#"
            UPDATE borrowings SET returned_at = $2, fine = $3
            WHERE id = $1 AND returned_at IS NULL
            RETURNING *
            "#,
        )
        .bind(borrowing_id)
        .bind(returned_at)
        .bind(fine)
        .fetch_optional(&mut *tx)
        .await?;

        let borrowing = match borrowing {
            Some(borrowing) => borrowing,
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM borrowings WHERE id = $1)")
                        .bind(borrowing_id)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(if exists {
                    AppError::AlreadyReturned(borrowing_id)
                } else {
                    AppError::NotFound(format!("Borrowing with id {} not found", borrowing_id))
                });
            }
        };

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET copies_available = copies_available + 1
            WHERE id = $1 AND copies_available < copies_total
            RETURNING *
            "#,
        )
        .bind(borrowing.book_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!(
                "Book {} cannot take back a copy for borrowing {}",
                borrowing.book_id, borrowing_id
            ))
        })?;

        tx.commit().await?;
        Ok((borrowing, book))
    }

    async fn apply_adjustment(&self, book_id: i32, new_total: i32) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let available = reconciled_available(&mut tx, book_id, new_total).await?;

        let book = sqlx::query_as::<_, Book>(
            "UPDATE books SET copies_total = $2, copies_available = $3 WHERE id = $1 RETURNING *",
        )
        .bind(book_id)
        .bind(new_total)
        .bind(available)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(book)
    }

    async fn apply_book_edit(
        &self,
        book_id: i32,
        details: &BookDetailsPatch,
        new_total: Option<i32>,
    ) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let available = match new_total {
            Some(total) => Some(reconciled_available(&mut tx, book_id, total).await?),
            None => {
                lock_book(&mut tx, book_id).await?;
                None
            }
        };

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                copies_total = COALESCE($5, copies_total),
                copies_available = COALESCE($6, copies_available)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(&details.title)
        .bind(&details.author)
        .bind(&details.isbn)
        .bind(new_total)
        .bind(available)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_isbn(e, details.isbn.as_deref().unwrap_or_default()))?;

        tx.commit().await?;
        Ok(book)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
