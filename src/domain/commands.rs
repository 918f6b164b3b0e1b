use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, CategoryId, DueDays, LoanId, MemberId};

/// コマンド：カテゴリを作成する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub name: String,
}

/// コマンド：カテゴリを削除する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCategory {
    pub category_id: CategoryId,
}

/// コマンド：書籍を登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBook {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category_id: Option<CategoryId>,
    pub added_at: DateTime<Utc>,
}

/// コマンド：書籍情報を更新する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBook {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category_id: Option<CategoryId>,
}

/// コマンド：書籍を削除する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBook {
    pub book_id: BookId,
}

/// コマンド：会員を登録する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMember {
    pub name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

/// コマンド：会員を削除する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMember {
    pub member_id: MemberId,
}

/// コマンド：書籍を貸し出す
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowBook {
    pub member_id: MemberId,
    pub book_id: BookId,
    pub borrowed_at: DateTime<Utc>,
    pub due_days: DueDays,
}

/// コマンド：貸出を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLoan {
    pub loan_id: LoanId,
    pub returned_at: DateTime<Utc>,
}
