use crate::domain::{Book, BookId, Category, CategoryId, Loan, LoanId, Member, MemberId};
use async_trait::async_trait;

use super::change_set::ChangeSet;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 蔵書ストアポート
///
/// カテゴリ・書籍・会員・貸出の永続化を抽象化する。
/// 読み取りは常に最新の状態を返し、一覧は固定の順序で返す。
/// 名前・タイトルの順序はバイト順（大文字が小文字より前）。
/// サービス層は状態をキャッシュせず、すべての読み取りをこのポート経由で行う。
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// 変更を原子的に確定する
    ///
    /// 失敗した場合、ストアの状態は変更されない。次の変更は拒否する:
    /// - 同一書籍に未返却の貸出が2件以上できる
    /// - 変更に関わる書籍で `is_available` と未返却貸出の有無が一致しない
    /// - 存在しない書籍・会員を参照する未返却の貸出
    /// - 存在しない書籍の情報更新・貸出可否変更
    /// - 存在しないカテゴリを参照する書籍
    /// - 未返却の貸出がある書籍・会員の削除
    ///
    /// カテゴリの削除では、参照している書籍のカテゴリを未設定に戻す。
    async fn commit(&self, changes: ChangeSet) -> Result<()>;

    /// 全カテゴリ（名前の昇順）
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// 全書籍（タイトルの昇順）
    async fn list_books(&self) -> Result<Vec<Book>>;

    /// 全会員（名前の昇順）
    async fn list_members(&self) -> Result<Vec<Member>>;

    /// 全貸出（貸出日時の降順）
    async fn list_loans(&self) -> Result<Vec<Loan>>;

    async fn get_category(&self, category_id: CategoryId) -> Result<Option<Category>>;

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;

    async fn get_member(&self, member_id: MemberId) -> Result<Option<Member>>;

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>>;

    /// 書籍を参照している未返却の貸出を取得する
    async fn find_open_loan_for_book(&self, book_id: BookId) -> Result<Option<Loan>>;

    /// 会員の全貸出（貸出日時の降順）
    async fn find_loans_by_member(&self, member_id: MemberId) -> Result<Vec<Loan>>;
}
