use crate::domain::{self, Loan, commands::*};
use crate::ports::ChangeSet;

use super::dependencies::ServiceDependencies;
use super::errors::{LibraryApplicationError, Result};

/// 書籍を貸し出す
///
/// ビジネスルール：
/// - 会員が存在すること
/// - 書籍が存在すること
/// - 書籍が貸出可能であること（未返却の貸出がないこと）
///
/// 貸出不可の場合は何も変更せず`BookNotAvailable`を返す。
/// 貸出の作成と書籍の貸出不可への変更は1回のcommitで確定する。
///
/// # 戻り値
/// 作成された貸出
pub async fn borrow_book(deps: &ServiceDependencies, cmd: BorrowBook) -> Result<Loan> {
    // 1. 会員の存在確認
    let member = deps
        .store
        .get_member(cmd.member_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::MemberNotFound)?;

    // 2. 書籍の存在確認
    let book = deps
        .store
        .get_book(cmd.book_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::BookNotFound)?;

    // 3. 未返却の貸出がないことを確認（保存済みフラグとの二重確認）
    let open_loan = deps
        .store
        .find_open_loan_for_book(cmd.book_id)
        .await
        .map_err(LibraryApplicationError::Storage)?;

    if open_loan.is_some() {
        tracing::warn!(book_id = %cmd.book_id.value(), "book already has an open loan");
        return Err(LibraryApplicationError::BookNotAvailable);
    }

    // 4. ドメイン層の純粋関数を呼び出し
    let (loan, borrowed_book) =
        domain::borrow_book(&book, &member, cmd.borrowed_at, cmd.due_days).inspect_err(|_| {
            tracing::warn!(book_id = %cmd.book_id.value(), "book is not available for loan");
        })?;

    // 5. 貸出と書籍を1回で保存
    deps.store
        .commit(
            ChangeSet::new()
                .save_loan(loan.clone())
                .set_book_availability(borrowed_book.book_id, borrowed_book.is_available),
        )
        .await
        .map_err(LibraryApplicationError::Storage)?;

    tracing::info!(
        loan_id = %loan.loan_id.value(),
        book_id = %loan.book_id.value(),
        member_id = %loan.member_id.value(),
        due_at = %loan.due_at,
        "book borrowed"
    );
    Ok(loan)
}

/// 貸出を返却する
///
/// ビジネスルール：
/// - 貸出が存在すること
/// - 返却済みの貸出は再返却できない
/// - 書籍が既に削除されている場合は貸出のみ更新する
///
/// # 戻り値
/// 返却済みの貸出
pub async fn return_loan(deps: &ServiceDependencies, cmd: ReturnLoan) -> Result<Loan> {
    // 1. 貸出を取得
    let loan = deps
        .store
        .get_loan(cmd.loan_id)
        .await
        .map_err(LibraryApplicationError::Storage)?
        .ok_or(LibraryApplicationError::LoanNotFound)?;

    // 2. 参照先の書籍（削除済みならNone）
    let book = deps
        .store
        .get_book(loan.book_id)
        .await
        .map_err(LibraryApplicationError::Storage)?;

    // 3. ドメイン層の純粋関数を呼び出し
    let (returned_loan, freed_book) = domain::return_loan(&loan, book.as_ref(), cmd.returned_at)
        .inspect_err(|_| {
            tracing::warn!(loan_id = %cmd.loan_id.value(), "loan has already been returned");
        })?;

    // 4. 貸出と書籍を1回で保存
    let mut changes = ChangeSet::new().save_loan(returned_loan.clone());
    if let Some(book) = freed_book {
        changes = changes.set_book_availability(book.book_id, book.is_available);
    }

    deps.store
        .commit(changes)
        .await
        .map_err(LibraryApplicationError::Storage)?;

    tracing::info!(
        loan_id = %returned_loan.loan_id.value(),
        book_id = %returned_loan.book_id.value(),
        "loan returned"
    );
    Ok(returned_loan)
}
