//! Storage - Backend Trait and Implementations
//!
//! TigerStyle: One contract, backends chosen once at start-up.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageBackend Trait                      │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//!          │                              │
//! ┌────────┴────────┐           ┌────────┴────────┐
//! │   FileStorage   │           │ PostgresStorage │
//! │  (JSON file)    │           │ (session+commit)│
//! └─────────────────┘           └─────────────────┘
//! ```
//!
//! There is no process-wide instance. [`open`] builds the configured backend,
//! reloads it, and hands it to the caller, who passes it wherever storage is
//! needed.

mod backend;
mod error;
mod file;
mod postgres;

pub use backend::{ObjectTable, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::{FileStorage, FILE_PATH_DEFAULT};
pub use postgres::{create_schema_statements, drop_schema_statement, PostgresStorage};

use crate::config::{StorageConfig, StorageKind};
use crate::models::Entity;

/// Construct the configured backend and run its initial `reload`.
///
/// # Errors
/// Returns error if the database settings are missing, the connection fails,
/// or the storage file exists but cannot be parsed.
pub async fn open(config: &StorageConfig) -> StorageResult<Box<dyn StorageBackend>> {
    let mut storage: Box<dyn StorageBackend> = match &config.kind {
        StorageKind::File => Box::new(FileStorage::new(config.file_path.clone())),
        StorageKind::Database => {
            let database = config
                .database
                .as_ref()
                .ok_or_else(|| StorageError::config("database storage selected without settings"))?;
            Box::new(PostgresStorage::new(
                database.connect_options(),
                database.is_test_mode(),
            ))
        }
    };

    storage.reload().await?;
    tracing::info!(backend = storage.name(), "Storage ready");
    Ok(storage)
}

/// Persist one entity: refresh `updated_at`, register it, then commit.
pub async fn save_entity<E: Entity>(
    storage: &mut dyn StorageBackend,
    entity: &mut E,
) -> StorageResult<()> {
    entity.base_mut().touch();
    storage.new(entity.clone().into());
    storage.save().await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::models::{Model, ModelKind, State};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_file_backend() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::file(dir.path().join("file.json"));

        let storage = open(&config).await.unwrap();
        assert_eq!(storage.name(), "file");
        assert!(storage.all(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_database_without_settings() {
        let config = StorageConfig {
            kind: StorageKind::Database,
            file_path: FILE_PATH_DEFAULT.into(),
            database: None,
        };
        assert!(matches!(open(&config).await, Err(StorageError::Config(_))));
    }

    #[tokio::test]
    async fn test_open_database_bad_host_fails() {
        let config = StorageConfig {
            kind: StorageKind::Database,
            file_path: FILE_PATH_DEFAULT.into(),
            database: Some(DatabaseConfig {
                host: "127.0.0.1".to_string(),
                port: Some(1),
                user: "hbnb".to_string(),
                password: "hbnb".to_string(),
                database: "hbnb".to_string(),
                env: None,
            }),
        };
        assert!(matches!(
            open(&config).await,
            Err(StorageError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_save_entity_touches_and_persists() {
        let dir = tempdir().unwrap();
        let mut storage = open(&StorageConfig::file(dir.path().join("file.json")))
            .await
            .unwrap();

        let mut state = State::new("California");
        let created = state.base.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        save_entity(storage.as_mut(), &mut state).await.unwrap();

        assert!(state.base.updated_at > created);
        storage.reload().await.unwrap();
        let stored = storage.get(ModelKind::State, &state.base.id).await.unwrap();
        assert_eq!(stored, Some(Model::from(state)));
    }

    #[tokio::test]
    async fn test_isolated_handles() {
        let dir = tempdir().unwrap();
        let mut first = open(&StorageConfig::file(dir.path().join("a.json"))).await.unwrap();
        let second = open(&StorageConfig::file(dir.path().join("b.json"))).await.unwrap();

        first.new(State::new("Vermont").into());
        first.save().await.unwrap();

        assert_eq!(first.count(None).await.unwrap(), 1);
        assert_eq!(second.count(None).await.unwrap(), 0);
    }
}
