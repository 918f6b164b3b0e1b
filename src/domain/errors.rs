use thiserror::Error;

/// 入力値のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 必須項目が空
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// 貸出日数のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DueDaysError {
    #[error("due days must be at least 1")]
    Zero,
    #[error("due days must be at most 365 (got {0})")]
    TooLong(u32),
}

/// 貸出のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowBookError {
    /// 書籍が貸出中
    BookNotAvailable,
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnLoanError {
    /// 既に返却済み
    AlreadyReturned,
}
