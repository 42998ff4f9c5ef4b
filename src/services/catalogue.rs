//! Catalogue management service (books and members)

use validator::Validate;

use super::engine::InventoryEngine;
use crate::{
    error::{AppError, AppResult},
    models::{Book, CreateBook, CreateMember, Member, PageQuery, UpdateBook, UpdateMember},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogueService {
    repository: Repository,
    engine: InventoryEngine,
}

impl CatalogueService {
    pub fn new(repository: Repository, engine: InventoryEngine) -> Self {
        Self { repository, engine }
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    pub async fn create_book(&self, data: CreateBook) -> AppResult<Book> {
        data.validate()?;
        let book = self.repository.create_book(&data).await?;
        tracing::info!(book_id = book.id, isbn = %book.isbn, "Book created");
        Ok(book)
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository
            .get_book(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    pub async fn list_books(&self, page: &PageQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.list_books(page.offset()?, page.per_page()).await
    }

    /// Copy-count changes are delegated to the engine
    pub async fn update_book(&self, id: i32, patch: UpdateBook) -> AppResult<Book> {
        patch.validate()?;
        self.engine.edit_book(id, &patch).await
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.delete_book(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    // =========================================================================
    // MEMBERS
    // =========================================================================

    pub async fn create_member(&self, data: CreateMember) -> AppResult<Member> {
        data.validate()?;
        let member = self.repository.create_member(&data).await?;
        tracing::info!(member_id = member.id, "Member created");
        Ok(member)
    }

    pub async fn get_member(&self, id: i32) -> AppResult<Member> {
        self.repository
            .get_member(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    pub async fn list_members(&self, page: &PageQuery) -> AppResult<(Vec<Member>, i64)> {
        self.repository.list_members(page.offset()?, page.per_page()).await
    }

    pub async fn update_member(&self, id: i32, patch: UpdateMember) -> AppResult<Member> {
        patch.validate()?;
        self.repository.update_member(id, &patch).await
    }

    pub async fn delete_member(&self, id: i32) -> AppResult<()> {
        self.repository.delete_member(id).await?;
        tracing::info!(member_id = id, "Member deleted");
        Ok(())
    }

    /// Storage liveness for the readiness probe
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
