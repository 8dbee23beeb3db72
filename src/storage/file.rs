//! FileStorage - The object table as one JSON document
//!
//! TigerStyle: Whole-table writes, no dirty set.
//!
//! # Format
//!
//! ```json
//! {
//!   "State.4f1c...": {
//!     "__class__": "State",
//!     "id": "4f1c...",
//!     "created_at": "2026-10-16T14:11:00.123456Z",
//!     "updated_at": "2026-10-16T14:11:00.123456Z",
//!     "name": "California"
//!   }
//! }
//! ```
//!
//! `new` and `delete` act on the in-memory table directly; `save` writes the
//! entire table to a temp file and renames it over the target.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;

use super::backend::{ObjectTable, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::models::{Model, ModelKind};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Default storage file, relative to the working directory
pub const FILE_PATH_DEFAULT: &str = "file.json";

/// Suffix of the temp file written before the atomic rename
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

// =============================================================================
// FileStorage
// =============================================================================

/// File-backed object store.
#[derive(Debug)]
pub struct FileStorage {
    /// Durable file
    path: PathBuf,
    /// Live object table
    objects: ObjectTable,
}

impl FileStorage {
    /// Create an empty store bound to `path`. Nothing is read until `reload`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            objects: ObjectTable::new(),
        }
    }

    /// The durable file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the current table exactly as `save` would write it.
    pub fn to_json(&self) -> StorageResult<String> {
        let mut document = BTreeMap::new();
        for (key, model) in &self.objects {
            document.insert(key.as_str(), model.to_dict()?);
        }
        Ok(serde_json::to_string_pretty(&document)?)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(TEMP_FILE_SUFFIX);
        self.path.with_file_name(name)
    }
}

/// Parse a storage document into a table without touching any live state.
fn parse_table(path: &Path, bytes: &[u8]) -> StorageResult<ObjectTable> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ObjectTable::new());
    }

    let document: BTreeMap<String, Map<String, Value>> = serde_json::from_slice(bytes)
        .map_err(|e| StorageError::malformed(path.display(), e))?;

    let mut objects = ObjectTable::new();
    for (key, dict) in document {
        let model = Model::from_dict(dict)
            .map_err(|e| StorageError::malformed(path.display(), format!("{key}: {e}")))?;
        if model.key() != key {
            return Err(StorageError::malformed(
                path.display(),
                format!("key {key} does not match entity {}", model.key()),
            ));
        }
        objects.insert(key, model);
    }
    Ok(objects)
}

// =============================================================================
// StorageBackend Implementation
// =============================================================================

#[async_trait]
impl StorageBackend for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn all(&self, kind: Option<ModelKind>) -> StorageResult<ObjectTable> {
        let objects = match kind {
            Some(kind) => self
                .objects
                .iter()
                .filter(|(_, model)| model.kind() == kind)
                .map(|(key, model)| (key.clone(), model.clone()))
                .collect(),
            None => self.objects.clone(),
        };
        Ok(objects)
    }

    fn new(&mut self, model: Model) {
        let key = model.key();
        tracing::debug!(key = %key, "Registered object");
        self.objects.insert(key, model);
    }

    fn delete(&mut self, model: Option<&Model>) {
        let Some(model) = model else { return };
        if self.objects.remove(&model.key()).is_some() {
            tracing::debug!(key = %model.key(), "Removed object");
        }
    }

    async fn save(&mut self) -> StorageResult<()> {
        let json = self.to_json()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, json.as_bytes()).await?;
        fs::rename(&temp_path, &self.path).await?;

        tracing::info!(
            path = %self.path.display(),
            objects = self.objects.len(),
            "Saved object table"
        );
        Ok(())
    }

    async fn reload(&mut self) -> StorageResult<()> {
        let objects = match fs::read(&self.path).await {
            Ok(bytes) => parse_table(&self.path, &bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No storage file yet");
                ObjectTable::new()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %self.path.display(),
            objects = objects.len(),
            "Loaded object table"
        );
        self.objects = objects;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
