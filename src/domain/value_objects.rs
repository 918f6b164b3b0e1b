use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DueDaysError, ValidationError};

/// カテゴリID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(Uuid);

impl CategoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for CategoryId {
    fn default() -> Self {
        Self::new()
    }
}

/// 書籍ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

/// 会員ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(Uuid);

impl MemberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

/// 貸出ID - 貸出集約のID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanId(Uuid);

impl LoanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

/// 必須テキスト
///
/// 不変条件：前後の空白を除いて空でないこと。
/// 書籍タイトル・著者名・会員名・メールアドレス・カテゴリ名に使用する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequiredText(String);

impl RequiredText {
    /// フィールド名付きで検証する
    ///
    /// # エラー
    /// 空文字（空白のみを含む）の場合は`ValidationError::Empty`を返す
    pub fn parse(field: &'static str, value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty(field));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RequiredText {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse("value", value)
    }
}

impl From<RequiredText> for String {
    fn from(text: RequiredText) -> Self {
        text.0
    }
}

impl std::fmt::Display for RequiredText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 貸出日数
///
/// 不変条件：1日以上365日以下。
/// 型システムでこの制約を強制し、0日や極端な貸出期間を作成できないようにする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DueDays(u32);

impl DueDays {
    /// 既定の貸出日数
    pub const DEFAULT: u32 = 7;
    /// 貸出日数の上限
    pub const MAX: u32 = 365;

    pub fn new(days: u32) -> Result<Self, DueDaysError> {
        if days == 0 {
            return Err(DueDaysError::Zero);
        }
        if days > Self::MAX {
            return Err(DueDaysError::TooLong(days));
        }
        Ok(Self(days))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// 貸出期間（days × 86400秒）
    pub fn as_duration(&self) -> Duration {
        Duration::days(i64::from(self.0))
    }
}

impl Default for DueDays {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<u32> for DueDays {
    type Error = DueDaysError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DueDays> for u32 {
    fn from(days: DueDays) -> Self {
        days.0
    }
}
