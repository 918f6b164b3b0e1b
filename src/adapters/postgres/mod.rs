pub mod library_store;

// パブリックに型を再エクスポート
pub use library_store::LibraryStore as PostgresLibraryStore;

/// マイグレーションを適用する
///
/// 本番とテストで同じマイグレーションファイルを使用する。
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
