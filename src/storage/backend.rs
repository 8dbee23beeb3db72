//! StorageBackend - The contract both backends satisfy
//!
//! TigerStyle: The rest of the crate depends only on this trait.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::error::StorageResult;
use crate::models::{key_for, Model, ModelKind};

/// Identity-keyed object table: `"<Type>.<id>"` to entity.
///
/// Ordered so that serialized output is deterministic.
pub type ObjectTable = BTreeMap<String, Model>;

/// Persistence contract shared by the file and database backends.
///
/// Lifecycle: construct, `reload()` once, then use. Calls are made by a single
/// owner and each completes before the next is issued.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Every tracked entity, or only those of `kind`.
    ///
    /// Reflects the latest `new`/`delete`/`save`, never a construction-time
    /// snapshot.
    async fn all(&self, kind: Option<ModelKind>) -> StorageResult<ObjectTable>;

    /// One entity by kind and id. A missing id is `Ok(None)`.
    async fn get(&self, kind: ModelKind, id: &str) -> StorageResult<Option<Model>> {
        let key = key_for(kind, id);
        Ok(self.all(Some(kind)).await?.remove(&key))
    }

    /// Number of tracked entities, optionally of one kind.
    async fn count(&self, kind: Option<ModelKind>) -> StorageResult<usize> {
        Ok(self.all(kind).await?.len())
    }

    /// Mark `model` for inclusion. Durable only after `save`. Registering the
    /// same identity again replaces the pending value.
    fn new(&mut self, model: Model);

    /// Mark `model` for removal. `None` is a no-op.
    fn delete(&mut self, model: Option<&Model>);

    /// Make every pending change durable, all or nothing.
    async fn save(&mut self) -> StorageResult<()>;

    /// (Re)open the backend and repopulate from durable state.
    ///
    /// Safe on an empty store and safe to repeat. On failure the previous
    /// state is left installed.
    async fn reload(&mut self) -> StorageResult<()>;

    /// Release connections. The default has nothing to release.
    async fn close(&mut self) {}
}
