//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrowings, health, members};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bibliotheca API",
        version = "0.3.0",
        description = "Library catalogue and borrowing REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::adjust_copies,
        books::delete_book,
        // Members
        members::list_members,
        members::get_member,
        members::create_member,
        members::update_member,
        members::delete_member,
        // Borrowings
        borrowings::borrow_book,
        borrowings::return_borrowing,
        borrowings::list_borrowings,
        borrowings::get_borrowing,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::AdjustCopies,
            crate::api::BookPage,
            // Members
            crate::models::member::Member,
            crate::models::member::CreateMember,
            crate::models::member::UpdateMember,
            crate::api::MemberPage,
            // Borrowings
            crate::models::borrowing::Borrowing,
            crate::models::borrowing::BorrowingStatus,
            crate::models::borrowing::BorrowingDetails,
            crate::models::borrowing::BorrowingOutcome,
            borrowings::BorrowRequest,
            borrowings::ReturnRequest,
            borrowings::BorrowingListResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalogue"),
        (name = "members", description = "Library members"),
        (name = "borrowings", description = "Borrowing and returning books")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
