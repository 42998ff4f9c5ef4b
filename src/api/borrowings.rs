//! Borrowing endpoints: borrow, return and ledger listing

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{Borrowing, BorrowingDetails, BorrowingFilter, BorrowingOutcome},
};

/// Borrow request
#[derive(Debug, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub member_id: i32,
    /// Borrowing period in days (1 to 60), server default when absent
    pub due_days: Option<i64>,
}

/// Return request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReturnRequest {
    /// Fine per day late, server default when absent
    pub fine_per_day: Option<Decimal>,
}

#[derive(Serialize, ToSchema)]
pub struct BorrowingListResponse {
    pub borrowings: Vec<BorrowingDetails>,
}

/// Borrow one copy of a book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "borrowings",
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowingOutcome),
        (status = 400, description = "Invalid period", body = crate::error::ErrorResponse),
        (status = 404, description = "Book or member not found", body = crate::error::ErrorResponse),
        (status = 409, description = "No copies available", body = crate::error::ErrorResponse),
        (status = 503, description = "Book busy", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    Path(book_id): Path<i32>,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowingOutcome>)> {
    let period_days = request
        .due_days
        .unwrap_or(state.config.loans.default_period_days);

    let outcome = state
        .services
        .engine
        .borrow(book_id, request.member_id, period_days)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrowings/{id}/return",
    tag = "borrowings",
    params(("id" = i32, Path, description = "Borrowing ID")),
    request_body(content = ReturnRequest, description = "Optional body"),
    responses(
        (status = 200, description = "Book returned", body = BorrowingOutcome),
        (status = 400, description = "Malformed body or fine out of range", body = crate::error::ErrorResponse),
        (status = 404, description = "Borrowing not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already returned", body = crate::error::ErrorResponse),
        (status = 503, description = "Borrowing or book busy", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_borrowing(
    State(state): State<crate::AppState>,
    Path(borrowing_id): Path<i32>,
    request: Result<Json<ReturnRequest>, JsonRejection>,
) -> AppResult<Json<BorrowingOutcome>> {
    // no JSON body at all means defaults; a body that fails to parse is refused
    let request = match request {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => ReturnRequest::default(),
        Err(rejection) => return Err(AppError::BadRequest(rejection.body_text())),
    };
    let fine_per_day = request
        .fine_per_day
        .unwrap_or(state.config.loans.default_fine_per_day);

    let outcome = state
        .services
        .engine
        .return_borrowing(borrowing_id, fine_per_day)
        .await?;
    Ok(Json(outcome))
}

/// List borrowings ordered by borrow time
#[utoipa::path(
    get,
    path = "/borrowings",
    tag = "borrowings",
    params(BorrowingFilter),
    responses(
        (status = 200, description = "Borrowings", body = BorrowingListResponse)
    )
)]
pub async fn list_borrowings(
    State(state): State<crate::AppState>,
    Query(filter): Query<BorrowingFilter>,
) -> AppResult<Json<BorrowingListResponse>> {
    let borrowings = state
        .services
        .ledger
        .list_details(&filter, state.config.loans.default_fine_per_day)
        .await?;
    Ok(Json(BorrowingListResponse { borrowings }))
}

/// Get a borrowing by ID
#[utoipa::path(
    get,
    path = "/borrowings/{id}",
    tag = "borrowings",
    params(("id" = i32, Path, description = "Borrowing ID")),
    responses(
        (status = 200, description = "Borrowing", body = Borrowing),
        (status = 404, description = "Borrowing not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_borrowing(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Borrowing>> {
    let borrowing = state.services.ledger.get(id).await?;
    Ok(Json(borrowing))
}
