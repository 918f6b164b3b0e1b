use crate::ports::LibraryStore;
use std::sync::Arc;

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、各サービス関数に明示的に渡す。
/// サービス自体は状態をキャッシュせず、読み取りは常にストア経由で行う。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub store: Arc<dyn LibraryStore>,
}
