//! In-process store. All tables sit behind one `RwLock`, so every
//! transition is a single write critical section and every read sees a
//! consistent snapshot.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::Store;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookDetailsPatch, Book, Borrowing, BorrowingFilter, CreateBook, CreateMember, Member,
        NewBorrowing, UpdateMember,
    },
};

#[derive(Debug, Default)]
struct Tables {
    books: BTreeMap<i32, Book>,
    members: BTreeMap<i32, Member>,
    /// Append-only; a borrowing's id is its position + 1
    borrowings: Vec<Borrowing>,
    next_book_id: i32,
    next_member_id: i32,
}

impl Tables {
    fn book(&self, id: i32) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn book_mut(&mut self, id: i32) -> AppResult<&mut Book> {
        self.books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Available count for `new_total` given the book's open borrowings
    fn reconciled_available(&self, book_id: i32, new_total: i32) -> AppResult<i32> {
        self.book(book_id)?;
        let open = self.open_count(book_id);
        let available = i64::from(new_total) - open;
        if new_total < 0 || available < 0 {
            return Err(AppError::InvalidAdjustment(format!(
                "book {} has {} open borrowings, cannot set total to {}",
                book_id, open, new_total
            )));
        }
        Ok(available as i32)
    }

    fn borrowing_index(&self, id: i32) -> AppResult<usize> {
        usize::try_from(id - 1)
            .ok()
            .filter(|idx| *idx < self.borrowings.len())
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))
    }

    fn open_count(&self, book_id: i32) -> i64 {
        self.borrowings
            .iter()
            .filter(|b| b.book_id == book_id && b.is_open())
            .count() as i64
    }

    fn isbn_taken(&self, isbn: &str, except: Option<i32>) -> bool {
        self.books
            .values()
            .any(|b| b.isbn == isbn && Some(b.id) != except)
    }
}

fn page<T: Clone>(rows: &BTreeMap<i32, T>, offset: i64, limit: i64) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let items = rows
        .values()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect();
    (items, total)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_book(&self, data: &CreateBook) -> AppResult<Book> {
        let mut t = self.tables.write().await;
        if t.isbn_taken(&data.isbn, None) {
            return Err(AppError::Conflict(format!("ISBN {} already exists", data.isbn)));
        }
        t.next_book_id += 1;
        let book = Book {
            id: t.next_book_id,
            title: data.title.clone(),
            author: data.author.clone(),
            isbn: data.isbn.clone(),
            copies_total: data.copies_total,
            copies_available: data.copies_total,
        };
        t.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn get_book(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.tables.read().await.books.get(&id).cloned())
    }

    async fn list_books(&self, offset: i64, limit: i64) -> AppResult<(Vec<Book>, i64)> {
        Ok(page(&self.tables.read().await.books, offset, limit))
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut t = self.tables.write().await;
        t.book(id)?;
        if t.open_count(id) > 0 {
            return Err(AppError::BookInUse(id));
        }
        t.books.remove(&id);
        Ok(())
    }

    async fn create_member(&self, data: &CreateMember) -> AppResult<Member> {
        let mut t = self.tables.write().await;
        t.next_member_id += 1;
        let member = Member {
            id: t.next_member_id,
            name: data.name.clone(),
            email: data.email.clone(),
            phone: data.phone.clone(),
        };
        t.members.insert(member.id, member.clone());
        Ok(member)
    }

    async fn get_member(&self, id: i32) -> AppResult<Option<Member>> {
        Ok(self.tables.read().await.members.get(&id).cloned())
    }

    async fn list_members(&self, offset: i64, limit: i64) -> AppResult<(Vec<Member>, i64)> {
        Ok(page(&self.tables.read().await.members, offset, limit))
    }

    async fn update_member(&self, id: i32, patch: &UpdateMember) -> AppResult<Member> {
        let mut t = self.tables.write().await;
        let member = t
            .members
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))?;
        patch.apply_to(member);
        Ok(member.clone())
    }

    async fn delete_member(&self, id: i32) -> AppResult<()> {
        let mut t = self.tables.write().await;
        if !t.members.contains_key(&id) {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }
        if t.borrowings.iter().any(|b| b.member_id == id && b.is_open()) {
            return Err(AppError::MemberInUse(id));
        }
        t.members.remove(&id);
        Ok(())
    }

    async fn get_borrowing(&self, id: i32) -> AppResult<Option<Borrowing>> {
        let t = self.tables.read().await;
        Ok(t.borrowing_index(id).ok().map(|idx| t.borrowings[idx].clone()))
    }

    async fn list_borrowings(&self, filter: &BorrowingFilter) -> AppResult<Vec<Borrowing>> {
        let t = self.tables.read().await;
        let mut rows: Vec<Borrowing> = t
            .borrowings
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        rows.sort_by_key(|b| b.borrowed_at);
        Ok(rows)
    }

    async fn count_open_borrowings(&self, book_id: i32) -> AppResult<i64> {
        Ok(self.tables.read().await.open_count(book_id))
    }

    async fn apply_borrow(&self, new: &NewBorrowing) -> AppResult<(Borrowing, Book)> {
        let mut t = self.tables.write().await;
        if !t.members.contains_key(&new.member_id) {
            return Err(AppError::NotFound(format!(
                "Member with id {} not found",
                new.member_id
            )));
        }
        if t.book(new.book_id)?.copies_available <= 0 {
            return Err(AppError::OutOfStock(new.book_id));
        }

        let borrowing = Borrowing {
            id: t.borrowings.len() as i32 + 1,
            book_id: new.book_id,
            member_id: new.member_id,
            borrowed_at: new.borrowed_at,
            due_at: new.due_at,
            returned_at: None,
            fine: None,
        };
        let book = t.book_mut(new.book_id)?;
        book.copies_available -= 1;
        let book = book.clone();
        t.borrowings.push(borrowing.clone());
        Ok((borrowing, book))
    }

    async fn apply_return(
        &self,
        borrowing_id: i32,
        returned_at: DateTime<Utc>,
        fine: Decimal,
    ) -> AppResult<(Borrowing, Book)> {
        let mut t = self.tables.write().await;
        let idx = t.borrowing_index(borrowing_id)?;
        if !t.borrowings[idx].is_open() {
            return Err(AppError::AlreadyReturned(borrowing_id));
        }

        let book_id = t.borrowings[idx].book_id;
        let book = t.book(book_id)?;
        if book.copies_available >= book.copies_total {
            return Err(AppError::Internal(format!(
                "Book {} already has all {} copies on the shelf",
                book_id, book.copies_total
            )));
        }

        let book = t.book_mut(book_id)?;
        book.copies_available += 1;
        let book = book.clone();
        let borrowing = &mut t.borrowings[idx];
        borrowing.returned_at = Some(returned_at);
        borrowing.fine = Some(fine);
        Ok((borrowing.clone(), book))
    }

    async fn apply_adjustment(&self, book_id: i32, new_total: i32) -> AppResult<Book> {
        let mut t = self.tables.write().await;
        let available = t.reconciled_available(book_id, new_total)?;
        let book = t.book_mut(book_id)?;
        book.copies_total = new_total;
        book.copies_available = available;
        Ok(book.clone())
    }

    async fn apply_book_edit(
        &self,
        book_id: i32,
        details: &BookDetailsPatch,
        new_total: Option<i32>,
    ) -> AppResult<Book> {
        let mut t = self.tables.write().await;
        t.book(book_id)?;
        if let Some(ref isbn) = details.isbn {
            if t.isbn_taken(isbn, Some(book_id)) {
                return Err(AppError::Conflict(format!("ISBN {} already exists", isbn)));
            }
        }
        let available = new_total
            .map(|total| t.reconciled_available(book_id, total).map(|a| (total, a)))
            .transpose()?;

        let book = t.book_mut(book_id)?;
        details.apply_to(book);
        if let Some((total, available)) = available {
            book.copies_total = total;
            book.copies_available = available;
        }
        Ok(book.clone())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
