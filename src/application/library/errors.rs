use crate::domain::{BorrowBookError, DueDaysError, ReturnLoanError, ValidationError};
use thiserror::Error;

/// 蔵書・貸出管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum LibraryApplicationError {
    /// 入力値が不正
    #[error("Validation error: {0}")]
    Validation(String),

    /// カテゴリが存在しない
    #[error("Category not found")]
    CategoryNotFound,

    /// 書籍が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 会員が存在しない
    #[error("Member not found")]
    MemberNotFound,

    /// 貸出が見つからない
    #[error("Loan not found")]
    LoanNotFound,

    /// 書籍が貸出中
    #[error("Book is not available for loan")]
    BookNotAvailable,

    /// 既に返却済み
    #[error("Loan has already been returned")]
    LoanAlreadyReturned,

    /// 未返却の貸出がある書籍は削除できない
    #[error("Book has an open loan")]
    BookHasOpenLoan,

    /// 未返却の貸出がある会員は削除できない
    #[error("Member has open loans")]
    MemberHasOpenLoans,

    /// ストアのエラー
    #[error("Storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ValidationError> for LibraryApplicationError {
    fn from(err: ValidationError) -> Self {
        LibraryApplicationError::Validation(err.to_string())
    }
}

impl From<DueDaysError> for LibraryApplicationError {
    fn from(err: DueDaysError) -> Self {
        LibraryApplicationError::Validation(err.to_string())
    }
}

impl From<BorrowBookError> for LibraryApplicationError {
    fn from(err: BorrowBookError) -> Self {
        match err {
            BorrowBookError::BookNotAvailable => LibraryApplicationError::BookNotAvailable,
        }
    }
}

impl From<ReturnLoanError> for LibraryApplicationError {
    fn from(err: ReturnLoanError) -> Self {
        match err {
            ReturnLoanError::AlreadyReturned => LibraryApplicationError::LoanAlreadyReturned,
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LibraryApplicationError>;
