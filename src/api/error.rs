use crate::application::library::LibraryApplicationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub struct ApiError(LibraryApplicationError);

impl From<LibraryApplicationError> for ApiError {
    fn from(err: LibraryApplicationError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self.0 {
            // 400 Bad Request - 入力値の不正
            LibraryApplicationError::Validation(ref msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }

            // 404 Not Found - リクエストされたリソースが存在しない
            LibraryApplicationError::CategoryNotFound => (
                StatusCode::NOT_FOUND,
                "CATEGORY_NOT_FOUND",
                "Category not found".to_string(),
            ),
            LibraryApplicationError::BookNotFound => (
                StatusCode::NOT_FOUND,
                "BOOK_NOT_FOUND",
                "Book not found".to_string(),
            ),
            LibraryApplicationError::MemberNotFound => (
                StatusCode::NOT_FOUND,
                "MEMBER_NOT_FOUND",
                "Member not found".to_string(),
            ),
            LibraryApplicationError::LoanNotFound => (
                StatusCode::NOT_FOUND,
                "LOAN_NOT_FOUND",
                "Loan not found".to_string(),
            ),

            // 422 Unprocessable Entity - ビジネスルール違反
            LibraryApplicationError::BookNotAvailable => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "BOOK_NOT_AVAILABLE",
                "Book is not available for loan".to_string(),
            ),
            LibraryApplicationError::LoanAlreadyReturned => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "LOAN_ALREADY_RETURNED",
                "Loan has already been returned".to_string(),
            ),
            LibraryApplicationError::BookHasOpenLoan => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "BOOK_HAS_OPEN_LOAN",
                "Book cannot be deleted while it is on loan".to_string(),
            ),
            LibraryApplicationError::MemberHasOpenLoans => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "MEMBER_HAS_OPEN_LOANS",
                "Member cannot be deleted while they have open loans".to_string(),
            ),

            // 500 Internal Server Error - システム障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            LibraryApplicationError::Storage(ref e) => {
                tracing::error!(error.message = %e, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "Failed to access library storage".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
