use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Book, BookId, BorrowBookError, DueDays, LoanId, Member, MemberId, ReturnLoanError};

/// 返却時に設定されるステータス文字列
pub const RETURNED_STATUS: &str = "Returned";

/// 貸出ステータス（保存される値）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// 貸出中
    Open,
    /// 返却済み（終端状態）
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Open => "Open",
            LoanStatus::Returned => RETURNED_STATUS,
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(LoanStatus::Open),
            RETURNED_STATUS => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

/// 表示用の貸出状態（現在時刻から導出）
///
/// JSONでは `active` / `overdue` / `returned` になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanState {
    Active,
    Overdue,
    Returned,
}

/// Loan集約 - 1冊の書籍の1回の貸出
///
/// 状態遷移は Open → Returned の一度きり。
/// 書籍と会員への参照はIDのみで、作成後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,

    // 他の集約への参照（IDのみ）
    pub book_id: BookId,
    pub member_id: MemberId,

    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

impl Loan {
    /// 未返却か
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// 純粋関数：書籍を貸し出す
///
/// ビジネスルール：
/// - 貸出可能な書籍のみ貸し出せる
/// - 返却期限は borrowed_at + due_days 日
/// - 貸し出した書籍は貸出不可になる
///
/// 副作用なし。新しいLoanと更新後のBookを返す。
pub fn borrow_book(
    book: &Book,
    member: &Member,
    borrowed_at: DateTime<Utc>,
    due_days: DueDays,
) -> Result<(Loan, Book), BorrowBookError> {
    if !book.is_available {
        return Err(BorrowBookError::BookNotAvailable);
    }

    let loan = Loan {
        loan_id: LoanId::new(),
        book_id: book.book_id,
        member_id: member.member_id,
        borrowed_at,
        due_at: borrowed_at + due_days.as_duration(),
        returned_at: None,
        status: LoanStatus::Open,
    };

    let book = Book {
        is_available: false,
        ..book.clone()
    };

    Ok((loan, book))
}

/// 純粋関数：貸出を返却する
///
/// ビジネスルール：
/// - 返却済みの貸出は再返却できない
/// - returned_at は borrowed_at 以上（それより前の時刻は borrowed_at に丸める）
/// - 書籍が既に削除されている場合は書籍の更新を行わない
///
/// 副作用なし。返却済みLoanと貸出可能に戻したBookを返す。
pub fn return_loan(
    loan: &Loan,
    book: Option<&Book>,
    returned_at: DateTime<Utc>,
) -> Result<(Loan, Option<Book>), ReturnLoanError> {
    if !loan.is_open() {
        return Err(ReturnLoanError::AlreadyReturned);
    }

    let returned_at = returned_at.max(loan.borrowed_at);

    let returned_loan = Loan {
        returned_at: Some(returned_at),
        status: LoanStatus::Returned,
        ..loan.clone()
    };

    let book = book.map(|b| Book {
        is_available: true,
        ..b.clone()
    });

    Ok((returned_loan, book))
}

/// 純粋関数：延滞判定
pub fn is_overdue(loan: &Loan, now: DateTime<Utc>) -> bool {
    loan.is_open() && loan.due_at < now
}

/// 純粋関数：表示用の状態を導出する
pub fn loan_state(loan: &Loan, now: DateTime<Utc>) -> LoanState {
    if !loan.is_open() {
        LoanState::Returned
    } else if is_overdue(loan, now) {
        LoanState::Overdue
    } else {
        LoanState::Active
    }
}
