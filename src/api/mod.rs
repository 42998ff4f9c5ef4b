//! HTTP gateway: REST endpoints over the catalogue, ledger and engine

pub mod books;
pub mod borrowings;
pub mod health;
pub mod members;
pub mod openapi;

use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{
    models::{Book, Member},
    AppState,
};

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
#[aliases(BookPage = PaginatedResponse<Book>, MemberPage = PaginatedResponse<Member>)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Page content
    pub items: Vec<T>,
    /// Total number of records
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Records per page
    pub per_page: i64,
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .patch(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/copies", put(books::adjust_copies))
        .route("/books/:id/borrow", post(borrowings::borrow_book))
        // Members
        .route("/members", get(members::list_members).post(members::create_member))
        .route(
            "/members/:id",
            get(members::get_member)
                .patch(members::update_member)
                .delete(members::delete_member),
        )
        // Borrowings
        .route("/borrowings", get(borrowings::list_borrowings))
        .route("/borrowings/:id", get(borrowings::get_borrowing))
        .route("/borrowings/:id/return", post(borrowings::return_borrowing))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
