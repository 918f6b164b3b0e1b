use crate::domain::{Book, BookId, Category, CategoryId, Loan, Member, MemberId};

/// 削除対象エンティティのキー
///
/// 貸出は履歴として残すため削除対象にならない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Category(CategoryId),
    Book(BookId),
    Member(MemberId),
}

/// 書籍の貸出可否の変更
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityChange {
    pub book_id: BookId,
    pub is_available: bool,
}

/// 1回の操作で確定する変更の集合
///
/// 保存（upsert）と削除をまとめ、`LibraryStore::commit`で原子的に適用する。
/// 1つの論理操作につき1回のcommitとする。
///
/// 書籍の書き込みは3種類に分かれる:
/// - `insert_book`: 新規登録
/// - `update_book_details`: タイトル・著者・ISBN・カテゴリのみ（貸出可否は書き換えない）
/// - `set_book_availability`: 貸出可否のみ（貸出・返却でだけ使う）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub categories: Vec<Category>,
    pub new_books: Vec<Book>,
    pub book_details: Vec<Book>,
    pub availability: Vec<AvailabilityChange>,
    pub members: Vec<Member>,
    pub loans: Vec<Loan>,
    pub deletions: Vec<EntityKey>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }

    pub fn insert_book(mut self, book: Book) -> Self {
        self.new_books.push(book);
        self
    }

    pub fn update_book_details(mut self, book: Book) -> Self {
        self.book_details.push(book);
        self
    }

    pub fn set_book_availability(mut self, book_id: BookId, is_available: bool) -> Self {
        self.availability.push(AvailabilityChange {
            book_id,
            is_available,
        });
        self
    }

    pub fn save_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn save_loan(mut self, loan: Loan) -> Self {
        self.loans.push(loan);
        self
    }

    pub fn delete(mut self, key: EntityKey) -> Self {
        self.deletions.push(key);
        self
    }

    /// このcommitで書き込まれる、または貸出で参照される書籍
    pub fn touched_books(&self) -> Vec<BookId> {
        let mut ids: Vec<BookId> = self
            .new_books
            .iter()
            .chain(&self.book_details)
            .map(|b| b.book_id)
            .chain(self.availability.iter().map(|c| c.book_id))
            .chain(self.loans.iter().map(|l| l.book_id))
            .collect();
        ids.sort_by_key(|id| id.value());
        ids.dedup();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.new_books.is_empty()
            && self.book_details.is_empty()
            && self.availability.is_empty()
            && self.members.is_empty()
            && self.loans.is_empty()
            && self.deletions.is_empty()
    }
}
