use crate::domain::{Book, BookId, Category, CategoryId, Loan, LoanId, Member, MemberId};
use crate::ports::change_set::{ChangeSet, EntityKey};
use crate::ports::library_store::{LibraryStore as LibraryStoreTrait, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct State {
    categories: HashMap<CategoryId, Category>,
    books: HashMap<BookId, Book>,
    members: HashMap<MemberId, Member>,
    loans: HashMap<LoanId, Loan>,
}

impl State {
    fn book_mut(&mut self, book_id: BookId) -> Result<&mut Book> {
        self.books
            .get_mut(&book_id)
            .ok_or_else(|| format!("book {} does not exist", book_id.value()).into())
    }

    fn has_open_loan_for_book(&self, book_id: BookId) -> bool {
        self.loans
            .values()
            .any(|l| l.book_id == book_id && l.is_open())
    }

    /// 変更を適用する。PostgreSQL版と同じ順序（保存 → 削除）。
    fn apply(&mut self, changes: &ChangeSet) -> Result<()> {
        for category in &changes.categories {
            self.categories
                .insert(category.category_id, category.clone());
        }
        for member in &changes.members {
            self.members.insert(member.member_id, member.clone());
        }
        for book in &changes.new_books {
            if self.books.contains_key(&book.book_id) {
                return Err(format!("book {} already exists", book.book_id.value()).into());
            }
            self.books.insert(book.book_id, book.clone());
        }
        for details in &changes.book_details {
            let book = self.book_mut(details.book_id)?;
            book.title = details.title.clone();
            book.author = details.author.clone();
            book.isbn = details.isbn.clone();
            book.category_id = details.category_id;
        }
        for change in &changes.availability {
            self.book_mut(change.book_id)?.is_available = change.is_available;
        }
        for loan in &changes.loans {
            if loan.is_open()
                && !(self.books.contains_key(&loan.book_id)
                    && self.members.contains_key(&loan.member_id))
            {
                return Err(format!(
                    "open loan {} references a missing book or member",
                    loan.loan_id.value()
                )
                .into());
            }
            self.loans.insert(loan.loan_id, loan.clone());
        }
        for key in &changes.deletions {
            self.delete(*key)?;
        }
        Ok(())
    }

    fn delete(&mut self, key: EntityKey) -> Result<()> {
        match key {
            EntityKey::Category(id) => {
                self.categories.remove(&id);
                for book in self.books.values_mut() {
                    if book.category_id == Some(id) {
                        book.category_id = None;
                    }
                }
            }
            EntityKey::Book(id) => {
                if self.has_open_loan_for_book(id) {
                    return Err(format!("book {} has an open loan", id.value()).into());
                }
                self.books.remove(&id);
            }
            EntityKey::Member(id) => {
                if self.loans.values().any(|l| l.member_id == id && l.is_open()) {
                    return Err(format!("member {} has open loans", id.value()).into());
                }
                self.members.remove(&id);
            }
        }
        Ok(())
    }

    /// 適用後の状態を検証する
    fn check(&self, changes: &ChangeSet) -> Result<()> {
        let mut seen = HashSet::new();
        for loan in self.loans.values().filter(|l| l.is_open()) {
            if !seen.insert(loan.book_id) {
                return Err(format!(
                    "book {} already has an open loan",
                    loan.book_id.value()
                )
                .into());
            }
        }

        for book_id in changes.touched_books() {
            let Some(book) = self.books.get(&book_id) else {
                continue;
            };
            if book.is_available == seen.contains(&book_id) {
                return Err(format!(
                    "book {} availability does not match its open loans",
                    book_id.value()
                )
                .into());
            }
            if let Some(category_id) = book.category_id {
                if !self.categories.contains_key(&category_id) {
                    return Err(format!(
                        "book {} references missing category {}",
                        book_id.value(),
                        category_id.value()
                    )
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// LibraryStoreのインメモリ実装
///
/// テストおよびデータベースなしでの起動に使用する。
/// commitは変更を複製した状態に適用して検証し、成功時のみ差し替える。
#[derive(Default)]
pub struct LibraryStore {
    state: Mutex<State>,
}

impl LibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| "in-memory store lock poisoned".into())
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl LibraryStoreTrait for LibraryStore {
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        next.apply(&changes)?;
        next.check(&changes)?;
        *state = next;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.lock()?;
        Ok(sorted_by(
            state.categories.values().cloned().collect(),
            |c: &Category| c.name.as_str().to_string(),
        ))
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        let state = self.lock()?;
        Ok(sorted_by(
            state.books.values().cloned().collect(),
            |b: &Book| b.title.as_str().to_string(),
        ))
    }

    async fn list_members(&self) -> Result<Vec<Member>> {
        let state = self.lock()?;
        Ok(sorted_by(
            state.members.values().cloned().collect(),
            |m: &Member| m.name.as_str().to_string(),
        ))
    }

    async fn list_loans(&self) -> Result<Vec<Loan>> {
        let state = self.lock()?;
        Ok(sorted_by(state.loans.values().cloned().collect(), |l: &Loan| {
            std::cmp::Reverse(l.borrowed_at)
        }))
    }

    async fn get_category(&self, category_id: CategoryId) -> Result<Option<Category>> {
        Ok(self.lock()?.categories.get(&category_id).cloned())
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.lock()?.books.get(&book_id).cloned())
    }

    async fn get_member(&self, member_id: MemberId) -> Result<Option<Member>> {
        Ok(self.lock()?.members.get(&member_id).cloned())
    }

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        Ok(self.lock()?.loans.get(&loan_id).cloned())
    }

    async fn find_open_loan_for_book(&self, book_id: BookId) -> Result<Option<Loan>> {
        let state = self.lock()?;
        Ok(state
            .loans
            .values()
            .find(|l| l.book_id == book_id && l.is_open())
            .cloned())
    }

    async fn find_loans_by_member(&self, member_id: MemberId) -> Result<Vec<Loan>> {
        let state = self.lock()?;
        Ok(sorted_by(
            state
                .loans
                .values()
                .filter(|l| l.member_id == member_id)
                .cloned()
                .collect(),
            |l: &Loan| std::cmp::Reverse(l.borrowed_at),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DueDays, borrow_book, create_book, create_category, register_member};
    use chrono::{Duration, Utc};

    /// 会員1人と書籍1冊を登録済みのストア
    async fn store_with_member_and_book() -> (LibraryStore, Member, Book) {
        let store = LibraryStore::new();
        let now = Utc::now();
        let member = register_member("Alice", "a@x.com", now).unwrap();
        let book = create_book("Go", "Donovan", None, None, now).unwrap();
        store
            .commit(
                ChangeSet::new()
                    .save_member(member.clone())
                    .insert_book(book.clone()),
            )
            .await
            .unwrap();
        (store, member, book)
    }

    fn borrow_changes(book: &Book, member: &Member) -> (Loan, ChangeSet) {
        let (loan, borrowed) = borrow_book(book, member, Utc::now(), DueDays::default()).unwrap();
        let changes = ChangeSet::new()
            .save_loan(loan.clone())
            .set_book_availability(borrowed.book_id, borrowed.is_available);
        (loan, changes)
    }

    #[tokio::test]
    async fn test_lists_are_sorted() {
        let store = LibraryStore::new();
        let now = Utc::now();
        let b = create_book("Rust in Action", "McNamara", None, None, now).unwrap();
        let a = create_book("Go Programming", "Donovan", None, None, now).unwrap();
        let lower = create_book("algorithms", "Sedgewick", None, None, now).unwrap();
        let cat_z = create_category("Zoology").unwrap();
        let cat_a = create_category("Algorithms").unwrap();

        store
            .commit(
                ChangeSet::new()
                    .insert_book(b)
                    .insert_book(a)
                    .insert_book(lower)
                    .save_category(cat_z)
                    .save_category(cat_a),
            )
            .await
            .unwrap();

        // バイト順：大文字は小文字より前
        let titles: Vec<_> = store
            .list_books()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title.to_string())
            .collect();
        assert_eq!(titles, vec!["Go Programming", "Rust in Action", "algorithms"]);

        let names: Vec<_> = store
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name.to_string())
            .collect();
        assert_eq!(names, vec!["Algorithms", "Zoology"]);
    }

    #[tokio::test]
    async fn test_loans_sorted_by_borrowed_at_desc() {
        let store = LibraryStore::new();
        let now = Utc::now();
        let member = register_member("Alice", "a@x.com", now).unwrap();
        let first = create_book("A", "X", None, None, now).unwrap();
        let second = create_book("B", "Y", None, None, now).unwrap();
        let (older, _) = borrow_book(&first, &member, now, DueDays::default()).unwrap();
        let (newer, _) = borrow_book(
            &second,
            &member,
            now + Duration::minutes(1),
            DueDays::default(),
        )
        .unwrap();

        store
            .commit(
                ChangeSet::new()
                    .save_member(member.clone())
                    .insert_book(first.clone())
                    .insert_book(second.clone())
                    .save_loan(older.clone())
                    .save_loan(newer.clone())
                    .set_book_availability(first.book_id, false)
                    .set_book_availability(second.book_id, false),
            )
            .await
            .unwrap();

        let loans = store.list_loans().await.unwrap();
        assert_eq!(loans[0].loan_id, newer.loan_id);
        assert_eq!(loans[1].loan_id, older.loan_id);

        let by_member = store.find_loans_by_member(member.member_id).await.unwrap();
        assert_eq!(by_member.len(), 2);
        assert_eq!(by_member[0].loan_id, newer.loan_id);
    }

    #[tokio::test]
    async fn test_commit_rejects_second_open_loan_for_book() {
        let (store, member, book) = store_with_member_and_book().await;
        let (_, first) = borrow_changes(&book, &member);
        let (_, second) = borrow_changes(&book, &member);

        store.commit(first).await.unwrap();
        let result = store.commit(second).await;

        assert!(result.is_err());
        assert_eq!(store.list_loans().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_rejects_open_loan_without_availability_change() {
        let (store, member, book) = store_with_member_and_book().await;
        let (loan, _) = borrow_book(&book, &member, Utc::now(), DueDays::default()).unwrap();

        let result = store.commit(ChangeSet::new().save_loan(loan)).await;

        assert!(result.is_err());
        assert!(store.list_loans().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_rejects_open_loan_for_missing_book() {
        let (store, member, _) = store_with_member_and_book().await;
        let ghost = create_book("Ghost", "Nobody", None, None, Utc::now()).unwrap();
        let (loan, _) = borrow_book(&ghost, &member, Utc::now(), DueDays::default()).unwrap();

        let result = store.commit(ChangeSet::new().save_loan(loan)).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_book_details_update_keeps_availability() {
        let (store, member, book) = store_with_member_and_book().await;
        let (_, borrow) = borrow_changes(&book, &member);
        store.commit(borrow).await.unwrap();

        // 貸出前に読んだ書籍（is_available = true）で情報だけを更新する
        let stale = crate::domain::update_book(&book, "Go, 2nd ed.", "Donovan", None, None).unwrap();
        assert!(stale.is_available);
        store
            .commit(ChangeSet::new().update_book_details(stale))
            .await
            .unwrap();

        let stored = store.get_book(book.book_id).await.unwrap().unwrap();
        assert_eq!(stored.title.as_str(), "Go, 2nd ed.");
        assert!(!stored.is_available);
    }

    #[tokio::test]
    async fn test_book_details_update_of_missing_book_is_rejected() {
        let store = LibraryStore::new();
        let book = create_book("Go", "Donovan", None, None, Utc::now()).unwrap();

        let result = store
            .commit(ChangeSet::new().update_book_details(book.clone()))
            .await;

        assert!(result.is_err());
        assert!(store.get_book(book.book_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_rejects_book_with_missing_category() {
        let store = LibraryStore::new();
        let category = create_category("Fiction").unwrap();
        let book =
            create_book("Dune", "Herbert", None, Some(category.category_id), Utc::now()).unwrap();

        let result = store.commit(ChangeSet::new().insert_book(book)).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_commit_applies_deletions() {
        let (store, member, book) = store_with_member_and_book().await;

        store
            .commit(
                ChangeSet::new()
                    .delete(EntityKey::Book(book.book_id))
                    .delete(EntityKey::Member(member.member_id)),
            )
            .await
            .unwrap();

        assert!(store.get_book(book.book_id).await.unwrap().is_none());
        assert!(store.get_member(member.member_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_rejects_deleting_book_or_member_on_loan() {
        let (store, member, book) = store_with_member_and_book().await;
        let (_, borrow) = borrow_changes(&book, &member);
        store.commit(borrow).await.unwrap();

        let result = store
            .commit(ChangeSet::new().delete(EntityKey::Book(book.book_id)))
            .await;
        assert!(result.is_err());

        let result = store
            .commit(ChangeSet::new().delete(EntityKey::Member(member.member_id)))
            .await;
        assert!(result.is_err());

        assert!(store.get_book(book.book_id).await.unwrap().is_some());
        assert!(store.get_member(member.member_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deleting_category_clears_book_references() {
        let store = LibraryStore::new();
        let category = create_category("Fiction").unwrap();
        let book =
            create_book("Dune", "Herbert", None, Some(category.category_id), Utc::now()).unwrap();
        store
            .commit(
                ChangeSet::new()
                    .save_category(category.clone())
                    .insert_book(book.clone()),
            )
            .await
            .unwrap();

        store
            .commit(ChangeSet::new().delete(EntityKey::Category(category.category_id)))
            .await
            .unwrap();

        let stored = store.get_book(book.book_id).await.unwrap().unwrap();
        assert_eq!(stored.category_id, None);
        assert!(store.list_categories().await.unwrap().is_empty());
    }
}
