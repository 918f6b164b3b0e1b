use crate::domain::{
    Book, BookId, Category, CategoryId, Loan, LoanId, LoanStatus, Member, MemberId, RequiredText,
};
use crate::ports::change_set::{AvailabilityChange, ChangeSet, EntityKey};
use crate::ports::library_store::{LibraryStore as LibraryStoreTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::str::FromStr;

const CATEGORY_COLUMNS: &str = "category_id, name";
const BOOK_COLUMNS: &str = "book_id, title, author, isbn, added_at, is_available, category_id";
const MEMBER_COLUMNS: &str = "member_id, name, email, joined_at";
const LOAN_COLUMNS: &str =
    "loan_id, book_id, member_id, borrowed_at, due_at, returned_at, status";

fn map_row_to_category(row: &PgRow) -> Result<Category> {
    Ok(Category {
        category_id: CategoryId::from_uuid(row.try_get("category_id")?),
        name: RequiredText::parse("name", row.try_get::<String, _>("name")?)?,
    })
}

fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let category_id: Option<uuid::Uuid> = row.try_get("category_id")?;
    Ok(Book {
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        title: RequiredText::parse("title", row.try_get::<String, _>("title")?)?,
        author: RequiredText::parse("author", row.try_get::<String, _>("author")?)?,
        isbn: row.try_get("isbn")?,
        added_at: row.try_get("added_at")?,
        is_available: row.try_get("is_available")?,
        category_id: category_id.map(CategoryId::from_uuid),
    })
}

fn map_row_to_member(row: &PgRow) -> Result<Member> {
    Ok(Member {
        member_id: MemberId::from_uuid(row.try_get("member_id")?),
        name: RequiredText::parse("name", row.try_get::<String, _>("name")?)?,
        email: RequiredText::parse("email", row.try_get::<String, _>("email")?)?,
        joined_at: row.try_get("joined_at")?,
    })
}

/// PostgreSQLの行データをLoanに変換する
///
/// statusは文字列からの変換でエラーハンドリングを行う。
fn map_row_to_loan(row: &PgRow) -> Result<Loan> {
    let status_str: &str = row.try_get("status")?;
    let status = LoanStatus::from_str(status_str).map_err(|e| {
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            as Box<dyn std::error::Error + Send + Sync>
    })?;

    Ok(Loan {
        loan_id: LoanId::from_uuid(row.try_get("loan_id")?),
        book_id: BookId::from_uuid(row.try_get("book_id")?),
        member_id: MemberId::from_uuid(row.try_get("member_id")?),
        borrowed_at: row.try_get("borrowed_at")?,
        due_at: row.try_get("due_at")?,
        returned_at: row.try_get("returned_at")?,
        status,
    })
}

/// LibraryStoreのPostgreSQL実装
///
/// ChangeSetを1トランザクションで適用する。
/// 1冊につき未返却の貸出は1件までという不変条件は部分ユニークインデックスでも保証する。
/// 名前・タイトルはインメモリ実装と同じバイト順（COLLATE "C"）で並べる。
pub struct LibraryStore {
    pool: PgPool,
}

impl LibraryStore {
    /// PostgreSQLコネクションプールから新しいLibraryStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert_category(tx: &mut Transaction<'_, Postgres>, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (category_id, name)
            VALUES ($1, $2)
            ON CONFLICT (category_id)
            DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(category.category_id.value())
        .bind(category.name.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_book(tx: &mut Transaction<'_, Postgres>, book: &Book) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (book_id, title, author, isbn, added_at, is_available, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(book.book_id.value())
        .bind(book.title.as_str())
        .bind(book.author.as_str())
        .bind(book.isbn.as_deref())
        .bind(book.added_at)
        .bind(book.is_available)
        .bind(book.category_id.map(|id| id.value()))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// 書籍情報のみを更新する（is_availableには触れない）
    async fn update_book_details(tx: &mut Transaction<'_, Postgres>, book: &Book) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = $2, author = $3, isbn = $4, category_id = $5
            WHERE book_id = $1
            "#,
        )
        .bind(book.book_id.value())
        .bind(book.title.as_str())
        .bind(book.author.as_str())
        .bind(book.isbn.as_deref())
        .bind(book.category_id.map(|id| id.value()))
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(format!("book {} does not exist", book.book_id.value()).into());
        }
        Ok(())
    }

    async fn set_book_availability(
        tx: &mut Transaction<'_, Postgres>,
        change: &AvailabilityChange,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE books SET is_available = $2 WHERE book_id = $1")
            .bind(change.book_id.value())
            .bind(change.is_available)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(format!("book {} does not exist", change.book_id.value()).into());
        }
        Ok(())
    }

    async fn upsert_member(tx: &mut Transaction<'_, Postgres>, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members (member_id, name, email, joined_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (member_id)
            DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email
            "#,
        )
        .bind(member.member_id.value())
        .bind(member.name.as_str())
        .bind(member.email.as_str())
        .bind(member.joined_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// 貸出を保存する
    ///
    /// book_id / member_id / borrowed_at / due_at は作成後に変更しない。
    async fn upsert_loan(tx: &mut Transaction<'_, Postgres>, loan: &Loan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loans (loan_id, book_id, member_id, borrowed_at, due_at, returned_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (loan_id)
            DO UPDATE SET
                returned_at = EXCLUDED.returned_at,
                status = EXCLUDED.status
            "#,
        )
        .bind(loan.loan_id.value())
        .bind(loan.book_id.value())
        .bind(loan.member_id.value())
        .bind(loan.borrowed_at)
        .bind(loan.due_at)
        .bind(loan.returned_at)
        .bind(loan.status.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// 未返却の貸出が参照する書籍・会員を共有ロックする
    ///
    /// 同時に走る削除はこのロックで待たされ、削除済みならここで失敗する。
    async fn lock_loan_references(tx: &mut Transaction<'_, Postgres>, loan: &Loan) -> Result<()> {
        let book = sqlx::query("SELECT 1 FROM books WHERE book_id = $1 FOR SHARE")
            .bind(loan.book_id.value())
            .fetch_optional(&mut **tx)
            .await?;
        let member = sqlx::query("SELECT 1 FROM members WHERE member_id = $1 FOR SHARE")
            .bind(loan.member_id.value())
            .fetch_optional(&mut **tx)
            .await?;

        if book.is_none() || member.is_none() {
            return Err(format!(
                "open loan {} references a missing book or member",
                loan.loan_id.value()
            )
            .into());
        }
        Ok(())
    }

    /// 未返却の貸出がないことを確認してから削除する
    ///
    /// 先に行ロックを取り、貸出との競合が終わってから別の文で未返却の貸出を確認する。
    async fn delete_guarded(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
        id_column: &str,
        id: uuid::Uuid,
    ) -> Result<()> {
        sqlx::query(&format!(
            "SELECT 1 FROM {table} WHERE {id_column} = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        let open: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT 1 FROM loans WHERE {id_column} = $1 AND returned_at IS NULL)"
        ))
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

        if open {
            return Err(format!("{table} row {id} has an open loan").into());
        }

        sqlx::query(&format!("DELETE FROM {table} WHERE {id_column} = $1"))
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn delete_entity(tx: &mut Transaction<'_, Postgres>, key: EntityKey) -> Result<()> {
        match key {
            EntityKey::Category(id) => {
                // 参照している書籍は ON DELETE SET NULL でカテゴリ未設定になる
                sqlx::query("DELETE FROM categories WHERE category_id = $1")
                    .bind(id.value())
                    .execute(&mut **tx)
                    .await?;
                Ok(())
            }
            EntityKey::Book(id) => Self::delete_guarded(tx, "books", "book_id", id.value()).await,
            EntityKey::Member(id) => {
                Self::delete_guarded(tx, "members", "member_id", id.value()).await
            }
        }
    }

    /// 変更に関わった書籍について is_available と未返却貸出の有無が一致することを確認する
    async fn check_availability(tx: &mut Transaction<'_, Postgres>, book_ids: &[BookId]) -> Result<()> {
        if book_ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<uuid::Uuid> = book_ids.iter().map(|id| id.value()).collect();

        let mismatch: Option<uuid::Uuid> = sqlx::query_scalar(
            r#"
            SELECT b.book_id
            FROM books b
            WHERE b.book_id = ANY($1)
              AND b.is_available = EXISTS (
                  SELECT 1 FROM loans l
                  WHERE l.book_id = b.book_id AND l.returned_at IS NULL
              )
            LIMIT 1
            "#,
        )
        .bind(ids)
        .fetch_optional(&mut **tx)
        .await?;

        match mismatch {
            Some(book_id) => {
                Err(format!("book {book_id} availability does not match its open loans").into())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LibraryStoreTrait for LibraryStore {
    /// 変更を1トランザクションで適用する
    ///
    /// 保存は カテゴリ → 会員 → 書籍 → 貸出 の順、
    /// 削除はその後にまとめて行い、最後に貸出可否を検証する。
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for category in &changes.categories {
            Self::upsert_category(&mut tx, category).await?;
        }
        for member in &changes.members {
            Self::upsert_member(&mut tx, member).await?;
        }
        for book in &changes.new_books {
            Self::insert_book(&mut tx, book).await?;
        }
        for book in &changes.book_details {
            Self::update_book_details(&mut tx, book).await?;
        }
        for change in &changes.availability {
            Self::set_book_availability(&mut tx, change).await?;
        }
        for loan in &changes.loans {
            if loan.is_open() {
                Self::lock_loan_references(&mut tx, loan).await?;
            }
            Self::upsert_loan(&mut tx, loan).await?;
        }
        for key in &changes.deletions {
            Self::delete_entity(&mut tx, *key).await?;
        }
        Self::check_availability(&mut tx, &changes.touched_books()).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name COLLATE "C" ASC"#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_category).collect()
    }

    async fn list_books(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {BOOK_COLUMNS} FROM books ORDER BY title COLLATE "C" ASC"#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_book).collect()
    }

    async fn list_members(&self) -> Result<Vec<Member>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {MEMBER_COLUMNS} FROM members ORDER BY name COLLATE "C" ASC"#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_member).collect()
    }

    async fn list_loans(&self) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans ORDER BY borrowed_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }

    async fn get_category(&self, category_id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE category_id = $1"
        ))
        .bind(category_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_category).transpose()
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE book_id = $1"
        ))
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn get_member(&self, member_id: MemberId) -> Result<Option<Member>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE member_id = $1"
        ))
        .bind(member_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_member).transpose()
    }

    async fn get_loan(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let row = sqlx::query(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE loan_id = $1"
        ))
        .bind(loan_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    /// 部分ユニークインデックス(ux_loans_open_book)を使用する
    async fn find_open_loan_for_book(&self, book_id: BookId) -> Result<Option<Loan>> {
        let row = sqlx::query(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE book_id = $1 AND returned_at IS NULL"
        ))
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn find_loans_by_member(&self, member_id: MemberId) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE member_id = $1 ORDER BY borrowed_at DESC"
        ))
        .bind(member_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }
}
