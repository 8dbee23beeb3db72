//! HBnB Storage - Object persistence for the HBnB console
//!
//! TigerStyle: One storage contract, two interchangeable backends.
//!
//! Features:
//! - File backend: the whole object table as one JSON document
//! - Postgres backend: one table per entity type, staged session + single commit
//! - Identity-keyed object table (`"<Type>.<id>"`)
//! - Derived relationships computed from foreign keys on every read
//!
//! # Usage
//!
//! ```ignore
//! use hbnb::config::StorageConfig;
//! use hbnb::models::{Model, State};
//! use hbnb::storage;
//!
//! let config = StorageConfig::from_env()?;
//! let mut storage = storage::open(&config).await?;
//!
//! let california = State::new("California");
//! storage.new(Model::from(california.clone()));
//! storage.save().await?;
//!
//! let states = storage.all(Some(State::KIND)).await?;
//! assert!(states.contains_key(&california.key()));
//! ```

pub mod config;
pub mod console;
pub mod models;
pub mod relations;
pub mod storage;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Application name
pub const APP_NAME: &str = "hbnb";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{DatabaseConfig, StorageConfig, StorageKind};
pub use models::{
    Amenity, BaseModel, City, Entity, Model, ModelKind, Place, Review, State, User,
};
pub use storage::{
    FileStorage, ObjectTable, PostgresStorage, StorageBackend, StorageError, StorageResult,
};
