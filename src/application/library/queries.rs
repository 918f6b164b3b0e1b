use crate::domain::{self, Book, BookId, Category, CategoryId, Loan, LoanState, Member, MemberId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::dependencies::ServiceDependencies;
use super::errors::{LibraryApplicationError, Result};

/// 書籍一覧の絞り込み条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// タイトルまたは著者名の部分一致（大文字小文字を区別しない）
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    /// 貸出可能な書籍のみ
    pub available_only: bool,
}

impl BookFilter {
    fn matches(&self, book: &Book) -> bool {
        let matches_category = self
            .category_id
            .is_none_or(|id| book.category_id == Some(id));
        let matches_search = self
            .search
            .as_deref()
            .is_none_or(|text| book.matches_search(text));
        let matches_availability = !self.available_only || book.is_available;

        matches_category && matches_search && matches_availability
    }
}

/// 貸出ビュー
///
/// 書籍タイトルと会員名を解決し、現在時刻から導出した状態を持つ。
/// 参照先が削除されている場合、名前はNoneになる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanView {
    pub loan: Loan,
    pub book_title: Option<String>,
    pub member_name: Option<String>,
    pub state: LoanState,
    pub is_overdue: bool,
}

/// 会員詳細の貸出一覧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLoans {
    pub member: Member,
    /// 貸出中（貸出日時の降順）
    pub active: Vec<LoanView>,
    /// 返却済み（返却日時の降順）
    pub past: Vec<LoanView>,
}

fn build_loan_view(
    loan: Loan,
    titles: &HashMap<BookId, String>,
    names: &HashMap<MemberId, String>,
    now: DateTime<Utc>,
) -> LoanView {
    LoanView {
        book_title: titles.get(&loan.book_id).cloned(),
        member_name: names.get(&loan.member_id).cloned(),
        state: domain::loan_state(&loan, now),
        is_overdue: domain::is_overdue(&loan, now),
        loan,
    }
}

async fn book_titles(deps: &ServiceDependencies) -> Result<HashMap<BookId, String>> {
    let books = deps
        .store
        .list_books()
        .await
        .map_err(LibraryApplicationError::Storage)?;
    Ok(books
        .into_iter()
        .map(|b| (b.book_id, b.title.to_string()))
        .collect())
}

async fn member_names(deps: &ServiceDependencies) -> Result<HashMap<MemberId, String>> {
    let members = deps
        .store
        .list_members()
        .await
        .map_err(LibraryApplicationError::Storage)?;
    Ok(members
        .into_iter()
        .map(|m| (m.member_id, m.name.to_string()))
        .collect())
}

/// カテゴリ一覧（名前の昇順）
pub async fn list_categories(deps: &ServiceDependencies) -> Result<Vec<Category>> {
    deps.store
        .list_categories()
        .await
        .map_err(LibraryApplicationError::Storage)
}

/// 書籍一覧（タイトルの昇順）
pub async fn list_books(deps: &ServiceDependencies, filter: &BookFilter) -> Result<Vec<Book>> {
    let books = deps
        .store
        .list_books()
        .await
        .map_err(LibraryApplicationError::Storage)?;

    Ok(books.into_iter().filter(|b| filter.matches(b)).collect())
}

/// IDで書籍を取得
pub async fn get_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    deps.store
        .get_book(book_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::BookNotFound)
}

/// 会員一覧（名前の昇順）
pub async fn list_members(deps: &ServiceDependencies) -> Result<Vec<Member>> {
    deps.store
        .list_members()
        .await
        .map_err(LibraryApplicationError::Storage)
}

/// 貸出履歴（貸出日時の降順）
pub async fn list_loans(deps: &ServiceDependencies, now: DateTime<Utc>) -> Result<Vec<LoanView>> {
    let loans = deps
        .store
        .list_loans()
        .await
        .map_err(LibraryApplicationError::Storage)?;
    let titles = book_titles(deps).await?;
    let names = member_names(deps).await?;

    Ok(loans
        .into_iter()
        .map(|loan| build_loan_view(loan, &titles, &names, now))
        .collect())
}

/// 会員の貸出中・返却済みの貸出
pub async fn member_loans(
    deps: &ServiceDependencies,
    member_id: MemberId,
    now: DateTime<Utc>,
) -> Result<MemberLoans> {
    let member = deps
        .store
        .get_member(member_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::MemberNotFound)?;

    let loans = deps
        .store
        .find_loans_by_member(member_id)
        .await
        .map_err(LibraryApplicationError::Storage)?;
    let titles = book_titles(deps).await?;
    let names = HashMap::from([(member.member_id, member.name.to_string())]);

    let (active, mut past): (Vec<_>, Vec<_>) = loans
        .into_iter()
        .map(|loan| build_loan_view(loan, &titles, &names, now))
        .partition(|view| view.loan.is_open());

    past.sort_by_key(|view| std::cmp::Reverse(view.loan.returned_at));

    Ok(MemberLoans {
        member,
        active,
        past,
    })
}

/// 延滞中の貸出（返却期限の昇順）
pub async fn list_overdue_loans(
    deps: &ServiceDependencies,
    now: DateTime<Utc>,
) -> Result<Vec<LoanView>> {
    let mut overdue: Vec<LoanView> = list_loans(deps, now)
        .await?
        .into_iter()
        .filter(|view| view.is_overdue)
        .collect();

    overdue.sort_by_key(|view| view.loan.due_at);
    Ok(overdue)
}
