use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MemberId, RequiredText, ValidationError};

/// 会員
///
/// 貸出との関連は貸出側が`MemberId`で保持する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    pub name: RequiredText,
    pub email: RequiredText,
    pub joined_at: DateTime<Utc>,
}

/// 純粋関数：会員を登録する
pub fn register_member(
    name: &str,
    email: &str,
    joined_at: DateTime<Utc>,
) -> Result<Member, ValidationError> {
    Ok(Member {
        member_id: MemberId::new(),
        name: RequiredText::parse("name", name)?,
        email: RequiredText::parse("email", email)?,
        joined_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_member() {
        let joined_at = Utc::now();
        let member = register_member("Alice", "a@x.com", joined_at).unwrap();
        assert_eq!(member.name.as_str(), "Alice");
        assert_eq!(member.email.as_str(), "a@x.com");
        assert_eq!(member.joined_at, joined_at);
    }

    #[test]
    fn test_register_member_requires_email() {
        let result = register_member("Alice", "", Utc::now());
        assert_eq!(result.unwrap_err(), ValidationError::Empty("email"));
    }
}
