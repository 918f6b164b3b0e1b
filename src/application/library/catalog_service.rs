use crate::domain::{self, Book, Category, CategoryId, commands::*};
use crate::ports::{ChangeSet, EntityKey};

use super::dependencies::ServiceDependencies;
use super::errors::{LibraryApplicationError, Result};

/// 参照されるカテゴリの存在確認
async fn ensure_category_exists(
    deps: &ServiceDependencies,
    category_id: Option<CategoryId>,
) -> Result<()> {
    let Some(category_id) = category_id else {
        return Ok(());
    };

    deps.store
        .get_category(category_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::CategoryNotFound)?;

    Ok(())
}

/// カテゴリを作成する
///
/// 名前の重複はチェックしない。
pub async fn create_category(deps: &ServiceDependencies, cmd: CreateCategory) -> Result<Category> {
    let category = domain::create_category(&cmd.name)?;

    deps.store
        .commit(ChangeSet::new().save_category(category.clone()))
        .await
        .map_err(LibraryApplicationError::Storage)?;

    tracing::info!(
        category_id = %category.category_id.value(),
        name = %category.name,
        "category created"
    );
    Ok(category)
}

/// カテゴリを削除する
///
/// このカテゴリを参照している書籍は、同じcommitの中でストアがカテゴリ未設定に戻す。
pub async fn delete_category(deps: &ServiceDependencies, cmd: DeleteCategory) -> Result<()> {
    deps.store
        .get_category(cmd.category_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::CategoryNotFound)?;

    deps.store
        .commit(ChangeSet::new().delete(EntityKey::Category(cmd.category_id)))
        .await
        .map_err(LibraryApplicationError::Storage)?;

    tracing::info!(category_id = %cmd.category_id.value(), "category deleted");
    Ok(())
}

/// 書籍を登録する
///
/// ビジネスルール：
/// - タイトルと著者は必須
/// - カテゴリを指定する場合は存在すること
/// - 登録直後は貸出可能
pub async fn create_book(deps: &ServiceDependencies, cmd: CreateBook) -> Result<Book> {
    let book = domain::create_book(
        &cmd.title,
        &cmd.author,
        cmd.isbn,
        cmd.category_id,
        cmd.added_at,
    )?;
    ensure_category_exists(deps, book.category_id).await?;

    deps.store
        .commit(ChangeSet::new().insert_book(book.clone()))
        .await
        .map_err(LibraryApplicationError::Storage)?;

    tracing::info!(book_id = %book.book_id.value(), title = %book.title, "book created");
    Ok(book)
}

/// 書籍情報を更新する
///
/// 貸出可否と貸出履歴は変更しない。
pub async fn update_book(deps: &ServiceDependencies, cmd: UpdateBook) -> Result<Book> {
    let book = deps
        .store
        .get_book(cmd.book_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::BookNotFound)?;

    let updated = domain::update_book(&book, &cmd.title, &cmd.author, cmd.isbn, cmd.category_id)?;
    ensure_category_exists(deps, updated.category_id).await?;

    deps.store
        .commit(ChangeSet::new().update_book_details(updated))
        .await
        .map_err(LibraryApplicationError::Storage)?;

    // 貸出可否は保存済みの値を返す
    let stored = deps
        .store
        .get_book(cmd.book_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::BookNotFound)?;

    tracing::info!(book_id = %stored.book_id.value(), "book updated");
    Ok(stored)
}

/// 書籍を削除する
///
/// ビジネスルール：
/// - 未返却の貸出がある書籍は削除できない
/// - 返却済みの貸出は書籍IDを保持したまま残る
///
/// 確認の後に貸出が確定した場合は、ストアのcommitが削除を拒否する。
pub async fn delete_book(deps: &ServiceDependencies, cmd: DeleteBook) -> Result<()> {
    deps.store
        .get_book(cmd.book_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::BookNotFound)?;

    let open_loan = deps
        .store
        .find_open_loan_for_book(cmd.book_id)
        .await
        .map_err(LibraryApplicationError::Storage)?;

    if open_loan.is_some() {
        tracing::warn!(book_id = %cmd.book_id.value(), "refusing to delete book with open loan");
        return Err(LibraryApplicationError::BookHasOpenLoan);
    }

    deps.store
        .commit(ChangeSet::new().delete(EntityKey::Book(cmd.book_id)))
        .await
        .map_err(LibraryApplicationError::Storage)?;

    tracing::info!(book_id = %cmd.book_id.value(), "book deleted");
    Ok(())
}
