use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, borrow_book, create_book, create_category, create_member, delete_book,
    delete_category, delete_member, get_book, get_member_loans, list_books, list_categories,
    list_loans, list_members, list_overdue_loans, return_loan, update_book,
};

/// Creates the API router with all catalog and loan endpoints
///
/// - /categories, /books, /members - catalog CRUD
/// - /loans - borrow (POST) and loan history (GET)
/// - /loans/:id/return - return a loan
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/:id", axum::routing::delete(delete_category))
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/:id",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/members", get(list_members).post(create_member))
        .route("/members/:id", axum::routing::delete(delete_member))
        .route("/members/:id/loans", get(get_member_loans))
        .route("/loans", get(list_loans).post(borrow_book))
        .route("/loans/overdue", get(list_overdue_loans))
        .route("/loans/:id/return", post(return_loan))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
