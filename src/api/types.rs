use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::library::{BookFilter, LoanView, MemberLoans};
use crate::domain::{Book, Category, CategoryId, Loan, LoanState, Member};

// ============================================================================
// Requests
// ============================================================================

/// カテゴリ作成リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// 書籍登録・更新リクエスト
#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

/// 会員登録リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateMemberRequest {
    pub name: String,
    pub email: String,
}

/// 貸出リクエスト
#[derive(Debug, Deserialize)]
pub struct BorrowBookRequest {
    pub member_id: Uuid,
    pub book_id: Uuid,
    /// 省略時は設定の既定日数
    #[serde(default)]
    pub due_days: Option<u32>,
}

/// 書籍一覧のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ListBooksQuery {
    /// タイトル・著者の部分一致
    pub search: Option<String>,
    /// カテゴリIDでフィルタリング
    pub category_id: Option<Uuid>,
    /// trueの場合は貸出可能な書籍のみ
    pub available: Option<bool>,
}

impl From<ListBooksQuery> for BookFilter {
    fn from(query: ListBooksQuery) -> Self {
        Self {
            search: query.search.filter(|s| !s.trim().is_empty()),
            category_id: query.category_id.map(CategoryId::from_uuid),
            available_only: query.available.unwrap_or(false),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub category_id: Uuid,
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            category_id: category.category_id.value(),
            name: category.name.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub book_id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub added_at: DateTime<Utc>,
    pub is_available: bool,
    pub category_id: Option<Uuid>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            book_id: book.book_id.value(),
            title: book.title.into(),
            author: book.author.into(),
            isbn: book.isbn,
            added_at: book.added_at,
            is_available: book.is_available,
            category_id: book.category_id.map(|id| id.value()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberResponse {
    pub member_id: Uuid,
    pub name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            member_id: member.member_id.value(),
            name: member.name.into(),
            email: member.email.into(),
            joined_at: member.joined_at,
        }
    }
}

/// 貸出レスポンス（POST /loans と POST /loans/:id/return）
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanResponse {
    pub loan_id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        Self {
            loan_id: loan.loan_id.value(),
            book_id: loan.book_id.value(),
            member_id: loan.member_id.value(),
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            returned_at: loan.returned_at,
            status: loan.status.as_str().to_string(),
        }
    }
}

/// 貸出一覧の1行（GET /loans, GET /loans/overdue, GET /members/:id/loans）
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanViewResponse {
    #[serde(flatten)]
    pub loan: LoanResponse,
    pub book_title: Option<String>,
    pub member_name: Option<String>,
    pub state: LoanState,
    pub is_overdue: bool,
}

impl From<LoanView> for LoanViewResponse {
    fn from(view: LoanView) -> Self {
        Self {
            loan: LoanResponse::from(view.loan),
            book_title: view.book_title,
            member_name: view.member_name,
            state: view.state,
            is_overdue: view.is_overdue,
        }
    }
}

/// 会員の貸出一覧レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct MemberLoansResponse {
    pub member: MemberResponse,
    pub active: Vec<LoanViewResponse>,
    pub past: Vec<LoanViewResponse>,
}

impl From<MemberLoans> for MemberLoansResponse {
    fn from(loans: MemberLoans) -> Self {
        Self {
            member: MemberResponse::from(loans.member),
            active: loans.active.into_iter().map(LoanViewResponse::from).collect(),
            past: loans.past.into_iter().map(LoanViewResponse::from).collect(),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
