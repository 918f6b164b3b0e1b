use crate::application::library::{self, LibraryApplicationError, ServiceDependencies};
use crate::domain::{BookId, CategoryId, DueDays, LoanId, MemberId, commands::*};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    types::{
        BookRequest, BookResponse, BorrowBookRequest, CategoryResponse, CreateCategoryRequest,
        CreateMemberRequest, ListBooksQuery, LoanResponse, LoanViewResponse, MemberLoansResponse,
        MemberResponse,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
    /// 貸出リクエストで日数が省略された場合の貸出日数
    pub default_due_days: DueDays,
}

// ============================================================================
// Categories
// ============================================================================

/// GET /categories - カテゴリ一覧（名前の昇順）
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = library::list_categories(&state.service_deps).await?;
    Ok(Json(categories.into_iter().map(CategoryResponse::from).collect()))
}

/// POST /categories - カテゴリを作成
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let category =
        library::create_category(&state.service_deps, CreateCategory { name: req.name }).await?;
    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}

/// DELETE /categories/:id - カテゴリを削除
///
/// 参照している書籍はカテゴリ未設定になる。
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let cmd = DeleteCategory {
        category_id: CategoryId::from_uuid(category_id),
    };
    library::delete_category(&state.service_deps, cmd).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Books
// ============================================================================

/// GET /books - 書籍一覧（タイトルの昇順）
///
/// クエリパラメータ:
/// - search: タイトル・著者の部分一致（大文字小文字を区別しない）
/// - category_id: カテゴリでフィルタリング
/// - available: trueの場合は貸出可能な書籍のみ
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBooksQuery>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books = library::list_books(&state.service_deps, &query.into()).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// POST /books - 書籍を登録
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let cmd = CreateBook {
        title: req.title,
        author: req.author,
        isbn: req.isbn,
        category_id: req.category_id.map(CategoryId::from_uuid),
        added_at: chrono::Utc::now(),
    };

    let book = library::create_book(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// GET /books/:id - 書籍詳細
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = library::get_book(&state.service_deps, BookId::from_uuid(book_id)).await?;
    Ok(Json(BookResponse::from(book)))
}

/// PUT /books/:id - 書籍情報を更新
///
/// 貸出可否は変更されない。
pub async fn update_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<BookRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    let cmd = UpdateBook {
        book_id: BookId::from_uuid(book_id),
        title: req.title,
        author: req.author,
        isbn: req.isbn,
        category_id: req.category_id.map(CategoryId::from_uuid),
    };

    let book = library::update_book(&state.service_deps, cmd).await?;
    Ok(Json(BookResponse::from(book)))
}

/// DELETE /books/:id - 書籍を削除
///
/// 貸出中の書籍は削除できない（422）。
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let cmd = DeleteBook {
        book_id: BookId::from_uuid(book_id),
    };
    library::delete_book(&state.service_deps, cmd).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Members
// ============================================================================

/// GET /members - 会員一覧（名前の昇順）
pub async fn list_members(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    let members = library::list_members(&state.service_deps).await?;
    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// POST /members - 会員を登録
pub async fn create_member(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    let cmd = RegisterMember {
        name: req.name,
        email: req.email,
        joined_at: chrono::Utc::now(),
    };

    let member = library::create_member(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(MemberResponse::from(member))))
}

/// DELETE /members/:id - 会員を削除
///
/// 貸出中の書籍がある会員は削除できない（422）。
pub async fn delete_member(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let cmd = DeleteMember {
        member_id: MemberId::from_uuid(member_id),
    };
    library::delete_member(&state.service_deps, cmd).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /members/:id/loans - 会員の貸出中・返却済みの貸出
pub async fn get_member_loans(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<MemberLoansResponse>, ApiError> {
    let loans = library::member_loans(
        &state.service_deps,
        MemberId::from_uuid(member_id),
        chrono::Utc::now(),
    )
    .await?;
    Ok(Json(MemberLoansResponse::from(loans)))
}

// ============================================================================
// Loans
// ============================================================================

/// GET /loans - 貸出履歴（貸出日時の降順）
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LoanViewResponse>>, ApiError> {
    let loans = library::list_loans(&state.service_deps, chrono::Utc::now()).await?;
    Ok(Json(loans.into_iter().map(LoanViewResponse::from).collect()))
}

/// GET /loans/overdue - 延滞中の貸出（返却期限の昇順）
pub async fn list_overdue_loans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LoanViewResponse>>, ApiError> {
    let loans = library::list_overdue_loans(&state.service_deps, chrono::Utc::now()).await?;
    Ok(Json(loans.into_iter().map(LoanViewResponse::from).collect()))
}

/// POST /loans - 書籍を貸し出す
///
/// 強制されるビジネスルール:
/// - 会員と書籍が存在すること
/// - 書籍が貸出可能であること
/// - 貸出日数は1〜365日（省略時は既定値）
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BorrowBookRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let due_days = match req.due_days {
        Some(days) => DueDays::new(days).map_err(LibraryApplicationError::from)?,
        None => state.default_due_days,
    };

    let cmd = BorrowBook {
        member_id: MemberId::from_uuid(req.member_id),
        book_id: BookId::from_uuid(req.book_id),
        borrowed_at: chrono::Utc::now(),
        due_days,
    };

    let loan = library::borrow_book(&state.service_deps, cmd).await?;
    Ok((StatusCode::CREATED, Json(LoanResponse::from(loan))))
}

/// POST /loans/:id/return - 貸出を返却
///
/// 強制されるビジネスルール:
/// - 貸出が存在すること
/// - 既に返却済みでないこと
pub async fn return_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = ReturnLoan {
        loan_id: LoanId::from_uuid(loan_id),
        returned_at: chrono::Utc::now(),
    };

    let loan = library::return_loan(&state.service_deps, cmd).await?;
    Ok(Json(LoanResponse::from(loan)))
}
