#![allow(dead_code)]

use campus_library::adapters::memory::InMemoryLibraryStore;
use campus_library::adapters::postgres::run_migrations;
use campus_library::application::library::ServiceDependencies;
use sqlx::PgPool;
use std::sync::Arc;

/// インメモリストアを使ったサービス依存関係
pub fn memory_deps() -> ServiceDependencies {
    ServiceDependencies {
        store: Arc::new(InMemoryLibraryStore::new()),
    }
}

/// テスト用データベースプールを作成し、マイグレーションを実行
///
/// DATABASE_URL環境変数が設定されていない場合はNoneを返し、
/// 呼び出し側のテストは何もせずに終了する。
/// 本番環境と同じマイグレーションファイルを使用する。
pub async fn try_create_test_pool() -> Option<PgPool> {
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// テーブルを空にする
///
/// テストの独立性を保つため、各テスト前にすべてのデータを削除する。
pub async fn cleanup_database(pool: &PgPool) {
    sqlx::query("TRUNCATE TABLE loans, books, members, categories CASCADE")
        .execute(pool)
        .await
        .expect("Failed to truncate tables");
}
