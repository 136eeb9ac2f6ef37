//! Database primitives: connection settings and the SeaORM record store.

mod store;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use serde::Deserialize;
use thiserror::Error;

pub use store::SeaOrmRecordStore;

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (set {0})")]
    MissingUrl(String),
    #[error("failed to connect to database: {0}")]
    Connect(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            env_key: default_url_key(),
        }
    }
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
        }
    }

    pub fn database_url(&self) -> DbResult<String> {
        std::env::var(&self.env_key)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| DbError::MissingUrl(self.env_key.clone()))
    }

    pub async fn connect(&self) -> DbResult<DbPool> {
        connect(&self.database_url()?).await
    }
}

pub async fn connect(url: &str) -> DbResult<DbPool> {
    let db = Database::connect(url).await?;
    tracing::info!(backend = ?db.get_database_backend(), "database connected");
    Ok(db)
}
