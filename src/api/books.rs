//! Book (catalogue) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{book::AdjustCopies, Book, CreateBook, PageQuery, UpdateBook},
};

use super::{BookPage, PaginatedResponse};

/// List books ordered by id
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of books", body = BookPage)
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let (books, total) = state.services.catalogue.list_books(&page).await?;

    Ok(Json(PaginatedResponse {
        items: books,
        total,
        page: page.page(),
        per_page: page.per_page(),
    }))
}

/// Get a book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalogue.get_book(id).await?;
    Ok(Json(book))
}

/// Create a book; all copies start on the shelf
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    Json(data): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalogue.create_book(data).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Partially update a book
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input or copies_available given", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Total below open borrowings", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(patch): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalogue.update_book(id, patch).await?;
    Ok(Json(book))
}

/// Set the total number of copies owned
#[utoipa::path(
    put,
    path = "/books/{id}/copies",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = AdjustCopies,
    responses(
        (status = 200, description = "Copies adjusted", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Total below open borrowings", body = crate::error::ErrorResponse),
        (status = 503, description = "Book busy", body = crate::error::ErrorResponse)
    )
)]
pub async fn adjust_copies(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
    Json(data): Json<AdjustCopies>,
) -> AppResult<Json<Book>> {
    let book = state.services.engine.adjust_total_copies(id, data.copies_total).await?;
    Ok(Json(book))
}

/// Delete a book with no open borrowings
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book has open borrowings", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalogue.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
