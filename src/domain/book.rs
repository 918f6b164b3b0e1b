use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, CategoryId, RequiredText, ValidationError};

/// Book集約 - 蔵書1冊
///
/// `is_available`は保存される派生フラグ。
/// 未返却の貸出がこの書籍を参照している間だけfalseになる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: RequiredText,
    pub author: RequiredText,
    pub isbn: Option<String>,
    pub added_at: DateTime<Utc>,
    pub is_available: bool,

    // 他の集約への参照（IDのみ）
    pub category_id: Option<CategoryId>,
}

impl Book {
    /// タイトルまたは著者名に検索語を含むか（大文字小文字を区別しない）
    pub fn matches_search(&self, text: &str) -> bool {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.as_str().to_lowercase().contains(&needle)
            || self.author.as_str().to_lowercase().contains(&needle)
    }
}

/// 空のISBNは未設定として扱う
fn normalize_isbn(isbn: Option<String>) -> Option<String> {
    isbn.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// 純粋関数：書籍を登録する
///
/// ビジネスルール：
/// - タイトルと著者は必須
/// - 登録直後は貸出可能
pub fn create_book(
    title: &str,
    author: &str,
    isbn: Option<String>,
    category_id: Option<CategoryId>,
    added_at: DateTime<Utc>,
) -> Result<Book, ValidationError> {
    Ok(Book {
        book_id: BookId::new(),
        title: RequiredText::parse("title", title)?,
        author: RequiredText::parse("author", author)?,
        isbn: normalize_isbn(isbn),
        added_at,
        is_available: true,
        category_id,
    })
}

/// 純粋関数：書籍情報を更新する
///
/// タイトル・著者・ISBN・カテゴリのみを上書きする。
/// 貸出可否と貸出履歴には触れない。
pub fn update_book(
    book: &Book,
    title: &str,
    author: &str,
    isbn: Option<String>,
    category_id: Option<CategoryId>,
) -> Result<Book, ValidationError> {
    Ok(Book {
        title: RequiredText::parse("title", title)?,
        author: RequiredText::parse("author", author)?,
        isbn: normalize_isbn(isbn),
        category_id,
        ..book.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Book {
        create_book("Go Programming", "Donovan", None, None, Utc::now()).unwrap()
    }

    #[test]
    fn test_create_book_is_available() {
        let book = sample_book();
        assert!(book.is_available);
        assert_eq!(book.title.as_str(), "Go Programming");
        assert_eq!(book.author.as_str(), "Donovan");
        assert_eq!(book.isbn, None);
    }

    #[test]
    fn test_create_book_requires_title_and_author() {
        assert_eq!(
            create_book("", "Donovan", None, None, Utc::now()).unwrap_err(),
            ValidationError::Empty("title")
        );
        assert_eq!(
            create_book("Go", " ", None, None, Utc::now()).unwrap_err(),
            ValidationError::Empty("author")
        );
    }

    #[test]
    fn test_empty_isbn_is_none() {
        let book =
            create_book("Go", "Donovan", Some("  ".to_string()), None, Utc::now()).unwrap();
        assert_eq!(book.isbn, None);
    }

    #[test]
    fn test_update_book_keeps_availability() {
        let mut book = sample_book();
        book.is_available = false;
        let category_id = CategoryId::new();

        let updated = update_book(
            &book,
            "The Go Programming Language",
            "Donovan & Kernighan",
            Some("978-0134190440".to_string()),
            Some(category_id),
        )
        .unwrap();

        assert_eq!(updated.book_id, book.book_id);
        assert_eq!(updated.added_at, book.added_at);
        assert!(!updated.is_available);
        assert_eq!(updated.title.as_str(), "The Go Programming Language");
        assert_eq!(updated.isbn.as_deref(), Some("978-0134190440"));
        assert_eq!(updated.category_id, Some(category_id));
    }

    #[test]
    fn test_matches_search_is_case_insensitive() {
        let book = sample_book();
        assert!(book.matches_search("go prog"));
        assert!(book.matches_search("DONOVAN"));
        assert!(book.matches_search(""));
        assert!(!book.matches_search("rust"));
    }
}
