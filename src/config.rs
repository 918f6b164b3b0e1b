//! 設定の読み込み
//!
//! 既定値 → `config/default` ファイル（任意）→ `CAMPUS_LIBRARY__*` 環境変数 の順に重ねる。
//! `DATABASE_URL` と `PORT` は最後に上書きする。

use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;
use std::env;

use crate::domain::DueDays;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// ストアの種類
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoanConfig {
    pub default_due_days: DueDays,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub loans: LoanConfig,
}

impl AppConfig {
    /// ファイルと環境変数から設定を読み込む
    pub fn load() -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("CAMPUS_LIBRARY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("server.port", env::var("PORT").ok())?
            .build()?
            .try_deserialize()
    }

    /// 待ち受けアドレス
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn defaults() -> Result<config::ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000_i64)?
        .set_default("database.url", "postgres://localhost/library")?
        .set_default("database.max_connections", 5_i64)?
        .set_default("store.backend", "postgres")?
        .set_default("logging.level", "debug")?
        .set_default("loans.default_due_days", i64::from(DueDays::DEFAULT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: AppConfig = defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.loans.default_due_days.value(), 7);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_override_backend_and_due_days() {
        let config: AppConfig = defaults()
            .unwrap()
            .set_override("store.backend", "memory")
            .unwrap()
            .set_override("loans.default_due_days", 14_i64)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.loans.default_due_days.value(), 14);
    }

    #[test]
    fn test_zero_due_days_is_rejected() {
        let result = defaults()
            .unwrap()
            .set_override("loans.default_due_days", 0_i64)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>();

        assert!(result.is_err());
    }
}
