use async_trait::async_trait;
use campus_library::adapters::memory::InMemoryLibraryStore;
use campus_library::application::library::{self, LibraryApplicationError, ServiceDependencies};
use campus_library::domain::commands::*;
use campus_library::domain::*;
use campus_library::ports::library_store::Result as StoreResult;
use campus_library::ports::{ChangeSet, LibraryStore};
use chrono::Utc;
use std::sync::{Arc, Mutex};

// ============================================================================
// テスト用ストア
// ============================================================================

/// 次のcommitの直前に、別の操作の変更を割り込ませるストア
///
/// サービスが読み取りを終えてから自分の変更を確定するまでの間に、
/// 他のリクエストの貸出が確定した状況を再現する。
struct InterleavingStore {
    inner: Arc<InMemoryLibraryStore>,
    pending: Mutex<Option<ChangeSet>>,
}

impl InterleavingStore {
    fn new(inner: Arc<InMemoryLibraryStore>) -> Self {
        Self {
            inner,
            pending: Mutex::new(None),
        }
    }

    fn interleave(&self, changes: ChangeSet) {
        *self.pending.lock().unwrap() = Some(changes);
    }
}

#[async_trait]
impl LibraryStore for InterleavingStore {
    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        let pending = self.pending.lock().unwrap().take();
        if let Some(other) = pending {
            self.inner.commit(other).await?;
        }
        self.inner.commit(changes).await
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        self.inner.list_categories().await
    }

    async fn list_books(&self) -> StoreResult<Vec<Book>> {
        self.inner.list_books().await
    }

    async fn list_members(&self) -> StoreResult<Vec<Member>> {
        self.inner.list_members().await
    }

    async fn list_loans(&self) -> StoreResult<Vec<Loan>> {
        self.inner.list_loans().await
    }

    async fn get_category(&self, category_id: CategoryId) -> StoreResult<Option<Category>> {
        self.inner.get_category(category_id).await
    }

    async fn get_book(&self, book_id: BookId) -> StoreResult<Option<Book>> {
        self.inner.get_book(book_id).await
    }

    async fn get_member(&self, member_id: MemberId) -> StoreResult<Option<Member>> {
        self.inner.get_member(member_id).await
    }

    async fn get_loan(&self, loan_id: LoanId) -> StoreResult<Option<Loan>> {
        self.inner.get_loan(loan_id).await
    }

    async fn find_open_loan_for_book(&self, book_id: BookId) -> StoreResult<Option<Loan>> {
        self.inner.find_open_loan_for_book(book_id).await
    }

    async fn find_loans_by_member(&self, member_id: MemberId) -> StoreResult<Vec<Loan>> {
        self.inner.find_loans_by_member(member_id).await
    }
}

// ============================================================================
// テスト用ヘルパー
// ============================================================================

struct Fixture {
    inner: Arc<InMemoryLibraryStore>,
    store: Arc<InterleavingStore>,
    deps: ServiceDependencies,
    category: Category,
    book: Book,
    member: Member,
}

async fn setup() -> Fixture {
    let inner = Arc::new(InMemoryLibraryStore::new());
    let store = Arc::new(InterleavingStore::new(inner.clone()));
    let deps = ServiceDependencies {
        store: store.clone(),
    };

    let category = create_category("Programming").unwrap();
    let book = create_book(
        "Go Programming",
        "Donovan",
        None,
        Some(category.category_id),
        Utc::now(),
    )
    .unwrap();
    let member = register_member("Alice", "alice@campus.edu", Utc::now()).unwrap();
    inner
        .commit(
            ChangeSet::new()
                .save_category(category.clone())
                .insert_book(book.clone())
                .save_member(member.clone()),
        )
        .await
        .unwrap();

    Fixture {
        inner,
        store,
        deps,
        category,
        book,
        member,
    }
}

/// 貸出サービスと同じ形の変更を組み立てる
fn borrow_changes(book: &Book, member: &Member) -> (Loan, ChangeSet) {
    let (loan, borrowed) = borrow_book(book, member, Utc::now(), DueDays::default()).unwrap();
    let changes = ChangeSet::new()
        .save_loan(loan.clone())
        .set_book_availability(borrowed.book_id, borrowed.is_available);
    (loan, changes)
}

/// すべての書籍で、貸出可否と未返却貸出の有無が一致していること
async fn assert_availability_consistent(store: &InMemoryLibraryStore) {
    let loans = store.list_loans().await.unwrap();
    for book in store.list_books().await.unwrap() {
        let on_loan = loans.iter().any(|l| l.book_id == book.book_id && l.is_open());
        assert_eq!(book.is_available, !on_loan, "book {}", book.title.as_str());
    }
}

// ============================================================================
// 読み取りと確定の間に貸出が割り込むケース
// ============================================================================

#[tokio::test]
async fn test_update_book_keeps_availability_of_interleaved_borrow() {
    let f = setup().await;
    let (loan, borrow) = borrow_changes(&f.book, &f.member);
    f.store.interleave(borrow);

    let updated = library::update_book(
        &f.deps,
        UpdateBook {
            book_id: f.book.book_id,
            title: "Go Programming, 2nd ed.".to_string(),
            author: "Donovan".to_string(),
            isbn: None,
            category_id: Some(f.category.category_id),
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.title.as_str(), "Go Programming, 2nd ed.");
    assert!(!updated.is_available);
    assert_eq!(
        f.inner.find_open_loan_for_book(f.book.book_id).await.unwrap(),
        Some(loan)
    );
    assert_availability_consistent(&f.inner).await;
}

#[tokio::test]
async fn test_delete_category_keeps_availability_of_interleaved_borrow() {
    let f = setup().await;
    let (_, borrow) = borrow_changes(&f.book, &f.member);
    f.store.interleave(borrow);

    library::delete_category(
        &f.deps,
        DeleteCategory {
            category_id: f.category.category_id,
        },
    )
    .await
    .unwrap();

    let stored = f.inner.get_book(f.book.book_id).await.unwrap().unwrap();
    assert_eq!(stored.category_id, None);
    assert!(!stored.is_available);
    assert!(f.inner.list_categories().await.unwrap().is_empty());
    assert_availability_consistent(&f.inner).await;
}

#[tokio::test]
async fn test_delete_book_is_rejected_after_interleaved_borrow() {
    let f = setup().await;
    let (loan, borrow) = borrow_changes(&f.book, &f.member);
    f.store.interleave(borrow);

    let result = library::delete_book(
        &f.deps,
        DeleteBook {
            book_id: f.book.book_id,
        },
    )
    .await;

    assert!(matches!(result, Err(LibraryApplicationError::Storage(_))));
    assert!(f.inner.get_book(f.book.book_id).await.unwrap().is_some());
    assert_eq!(
        f.inner.find_open_loan_for_book(f.book.book_id).await.unwrap(),
        Some(loan)
    );
    assert_availability_consistent(&f.inner).await;
}

#[tokio::test]
async fn test_delete_member_is_rejected_after_interleaved_borrow() {
    let f = setup().await;
    let (loan, borrow) = borrow_changes(&f.book, &f.member);
    f.store.interleave(borrow);

    let result = library::delete_member(
        &f.deps,
        DeleteMember {
            member_id: f.member.member_id,
        },
    )
    .await;

    assert!(matches!(result, Err(LibraryApplicationError::Storage(_))));
    assert!(f.inner.get_member(f.member.member_id).await.unwrap().is_some());
    assert_eq!(
        f.inner.find_loans_by_member(f.member.member_id).await.unwrap(),
        vec![loan]
    );
    assert_availability_consistent(&f.inner).await;
}

#[tokio::test]
async fn test_stale_borrow_after_delete_book_is_rejected() {
    let f = setup().await;
    // 削除前に組み立てた貸出が、削除の後に確定しようとする
    let (_, borrow) = borrow_changes(&f.book, &f.member);

    library::delete_book(
        &f.deps,
        DeleteBook {
            book_id: f.book.book_id,
        },
    )
    .await
    .unwrap();

    let result = f.inner.commit(borrow).await;

    assert!(result.is_err());
    assert!(f.inner.list_loans().await.unwrap().is_empty());
}
