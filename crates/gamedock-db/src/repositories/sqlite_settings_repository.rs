//! `SQLite` implementation of the `SettingsRepository` trait.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use gamedock_core::{RepositoryError, Settings, SettingsRepository};

/// Stores settings as a JSON blob in a key-value table.
pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    /// Create a new `SQLite` settings repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SETTINGS_KEY: &str = "app_settings";

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn load(&self) -> Result<Settings, RepositoryError> {
        let row = sqlx::query("SELECT value FROM settings_kv WHERE key = ?")
            .bind(SETTINGS_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        match row {
            Some(r) => {
                let json: String = r.get("value");
                serde_json::from_str(&json)
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))
            }
            None => Ok(Settings::with_defaults()),
        }
    }

    async fn save(&self, settings: &Settings) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(settings)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        sqlx::query("INSERT OR REPLACE INTO settings_kv (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(SETTINGS_KEY)
            .bind(&json)
            .bind(&updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        tracing::debug!("settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;
    use gamedock_core::CompressionFormat;

    #[tokio::test]
    async fn test_load_returns_defaults_when_empty() {
        let repo = SqliteSettingsRepository::new(setup_test_database().await.unwrap());
        let settings = repo.load().await.unwrap();
        assert_eq!(settings, Settings::with_defaults());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let repo = SqliteSettingsRepository::new(setup_test_database().await.unwrap());

        let settings = Settings {
            max_concurrent_downloads: Some(3),
            compression_format: Some(CompressionFormat::TarGz),
            auto_compress: Some(true),
            ..Settings::with_defaults()
        };

        repo.save(&settings).await.unwrap();
        let loaded = repo.load().await.unwrap();

        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let repo = SqliteSettingsRepository::new(setup_test_database().await.unwrap());
        repo.save(&Settings::with_defaults()).await.unwrap();
        let changed = Settings {
            max_concurrent_downloads: Some(5),
            ..Settings::with_defaults()
        };
        repo.save(&changed).await.unwrap();
        assert_eq!(repo.load().await.unwrap().max_concurrent_downloads, Some(5));
    }
}
