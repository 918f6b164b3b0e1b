use serde::{Deserialize, Serialize};

use super::{CategoryId, RequiredText, ValidationError};

/// カテゴリ - 書籍の分類
///
/// 名前の重複はチェックしない（運用上の慣習として一意）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category_id: CategoryId,
    pub name: RequiredText,
}

/// 純粋関数：カテゴリを作成する
pub fn create_category(name: &str) -> Result<Category, ValidationError> {
    Ok(Category {
        category_id: CategoryId::new(),
        name: RequiredText::parse("name", name)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_category_assigns_fresh_id() {
        let a = create_category("Fiction").unwrap();
        let b = create_category("Fiction").unwrap();
        assert_ne!(a.category_id, b.category_id);
        assert_eq!(a.name.as_str(), "Fiction");
    }

    #[test]
    fn test_create_category_rejects_empty_name() {
        assert_eq!(
            create_category("").unwrap_err(),
            ValidationError::Empty("name")
        );
    }
}
