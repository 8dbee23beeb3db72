//! PostgresStorage - Relational backend
//!
//! TigerStyle: One table per entity kind, staged session, single commit.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PostgresStorage                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pool: sqlx::PgPool (pre-ping on acquire)                    │
//! │  Session: staged upserts/deletes keyed by identity key       │
//! │  Tables: users, states, cities, places, reviews, amenities   │
//! │  Join: place_amenity (place_id, amenity_id, position)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `new` and `delete` only stage. `save` applies the staged operations inside
//! one transaction. `all` reads the tables and overlays whatever is staged, so
//! callers see their own pending changes before they commit.
//!
//! Undeclared (`extra`) attributes have no column and are not persisted here.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

use super::backend::{ObjectTable, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::models::{FieldType, Model, ModelKind, Place, CLASS_FIELD};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Maximum pooled connections
pub const POOL_CONNECTIONS_MAX: u32 = 5;

/// Seconds to wait for a connection before giving up
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Width of id columns
pub const ID_COLUMN_CHARS_MAX: usize = 60;

/// Many-to-many join table between places and amenities
pub const PLACE_AMENITY_TABLE: &str = "place_amenity";

// =============================================================================
// Schema
// =============================================================================

fn column_definition(ty: FieldType) -> &'static str {
    match ty {
        FieldType::Text => "TEXT NOT NULL DEFAULT ''",
        FieldType::Integer => "BIGINT NOT NULL DEFAULT 0",
        FieldType::Float => "DOUBLE PRECISION NOT NULL DEFAULT 0",
    }
}

/// `CREATE TABLE IF NOT EXISTS` statements for every kind plus the join table.
///
/// No foreign keys are declared: deleting a parent leaves its children in
/// place on this backend, same as the file backend.
#[must_use]
pub fn create_schema_statements() -> Vec<String> {
    let mut statements: Vec<String> = ModelKind::all()
        .iter()
        .map(|kind| {
            let mut columns = vec![
                format!("id VARCHAR({ID_COLUMN_CHARS_MAX}) PRIMARY KEY"),
                "created_at TIMESTAMPTZ NOT NULL".to_string(),
                "updated_at TIMESTAMPTZ NOT NULL".to_string(),
            ];
            columns.extend(
                kind.fields()
                    .iter()
                    .map(|f| format!("{} {}", f.name, column_definition(f.ty))),
            );
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                kind.table(),
                columns.join(", ")
            )
        })
        .collect();

    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {PLACE_AMENITY_TABLE} (\
         place_id VARCHAR({ID_COLUMN_CHARS_MAX}) NOT NULL, \
         amenity_id VARCHAR({ID_COLUMN_CHARS_MAX}) NOT NULL, \
         position INTEGER NOT NULL, \
         PRIMARY KEY (place_id, amenity_id))"
    ));
    statements
}

/// `DROP TABLE` for everything this backend owns.
#[must_use]
pub fn drop_schema_statement() -> String {
    let mut tables = vec![PLACE_AMENITY_TABLE];
    tables.extend(ModelKind::all().iter().rev().map(ModelKind::table));
    format!("DROP TABLE IF EXISTS {}", tables.join(", "))
}

/// Upsert statement for one kind; binds id, timestamps, then declared fields.
fn upsert_statement(kind: ModelKind) -> String {
    let columns: Vec<&str> = ["id", "created_at", "updated_at"]
        .into_iter()
        .chain(kind.fields().iter().map(|f| f.name))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    let updates: Vec<String> = columns[1..]
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (id) DO UPDATE SET {}",
        kind.table(),
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

// =============================================================================
// Session
// =============================================================================

/// A staged change, applied by the next `save`.
#[derive(Debug, Clone)]
enum PendingOp {
    Upsert(Model),
    Delete { kind: ModelKind, id: String },
}

impl PendingOp {
    fn kind(&self) -> ModelKind {
        match self {
            Self::Upsert(model) => model.kind(),
            Self::Delete { kind, .. } => *kind,
        }
    }
}

// =============================================================================
// PostgresStorage
// =============================================================================

/// PostgreSQL-backed object store.
pub struct PostgresStorage {
    options: PgConnectOptions,
    /// Drop and recreate the schema on the first reload
    test_mode: bool,
    schema_reset_done: bool,
    /// Open while a session exists
    pool: Option<PgPool>,
    /// Staged operations by identity key, last write wins
    pending: BTreeMap<String, PendingOp>,
}

impl PostgresStorage {
    /// Create an unconnected store. The first `reload` connects.
    ///
    /// With `test_mode` set, that first `reload` drops every table before
    /// recreating the schema.
    #[must_use]
    pub fn new(options: PgConnectOptions, test_mode: bool) -> Self {
        Self {
            options,
            test_mode,
            schema_reset_done: false,
            pool: None,
            pending: BTreeMap::new(),
        }
    }

    /// Number of staged operations.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn session_pool(&self, operation: &'static str) -> StorageResult<&PgPool> {
        self.pool
            .as_ref()
            .ok_or(StorageError::SessionClosed(operation))
    }

    async fn connect(&self) -> StorageResult<PgPool> {
        PgPoolOptions::new()
            .max_connections(POOL_CONNECTIONS_MAX)
            .acquire_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .test_before_acquire(true)
            .connect_with(self.options.clone())
            .await
            .map_err(|e| StorageError::connection(format!("failed to connect: {e}")))
    }

    async fn init_schema(&mut self, pool: &PgPool) -> StorageResult<()> {
        if self.test_mode && !self.schema_reset_done {
            sqlx::query(&drop_schema_statement())
                .execute(pool)
                .await
                .map_err(|e| StorageError::write(format!("failed to drop schema: {e}")))?;
            self.schema_reset_done = true;
            tracing::warn!("Test mode: dropped all tables");
        }

        for statement in create_schema_statements() {
            sqlx::query(&statement)
                .execute(pool)
                .await
                .map_err(|e| StorageError::write(format!("failed to create schema: {e}")))?;
        }
        Ok(())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

fn column_error(e: sqlx::Error) -> StorageError {
    StorageError::read(e.to_string())
}

/// Parse a database row of `kind` into a Model.
fn row_to_model(kind: ModelKind, row: &PgRow) -> StorageResult<Model> {
    let id: String = row.try_get("id").map_err(column_error)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(column_error)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(column_error)?;

    let mut dict = Map::new();
    dict.insert(CLASS_FIELD.to_string(), Value::from(kind.as_str()));
    dict.insert("id".to_string(), Value::String(id));
    dict.insert("created_at".to_string(), serde_json::to_value(created_at)?);
    dict.insert("updated_at".to_string(), serde_json::to_value(updated_at)?);

    for field in kind.fields() {
        let value = match field.ty {
            FieldType::Text => {
                Value::from(row.try_get::<String, _>(field.name).map_err(column_error)?)
            }
            FieldType::Integer => {
                Value::from(row.try_get::<i64, _>(field.name).map_err(column_error)?)
            }
            FieldType::Float => {
                Value::from(row.try_get::<f64, _>(field.name).map_err(column_error)?)
            }
        };
        dict.insert(field.name.to_string(), value);
    }

    Ok(Model::from_dict(dict)?)
}

async fn fetch_links(pool: &PgPool) -> StorageResult<HashMap<String, Vec<String>>> {
    let rows: Vec<(String, String)> = sqlx::query_as(&format!(
        "SELECT place_id, amenity_id FROM {PLACE_AMENITY_TABLE} ORDER BY place_id, position"
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| StorageError::read(format!("failed to read amenity links: {e}")))?;

    let mut links: HashMap<String, Vec<String>> = HashMap::new();
    for (place_id, amenity_id) in rows {
        links.entry(place_id).or_default().push(amenity_id);
    }
    Ok(links)
}

// =============================================================================
// Writes
// =============================================================================

async fn upsert(tx: &mut Transaction<'_, Postgres>, model: &Model) -> StorageResult<()> {
    let kind = model.kind();
    let dict = model.to_dict()?;
    let base = model.base();
    let sql = upsert_statement(kind);

    let mut query = sqlx::query(&sql)
        .bind(base.id.clone())
        .bind(base.created_at)
        .bind(base.updated_at);
    for field in kind.fields() {
        let value = dict.get(field.name);
        query = match field.ty {
            FieldType::Text => {
                query.bind(value.and_then(Value::as_str).unwrap_or_default().to_string())
            }
            FieldType::Integer => query.bind(value.and_then(Value::as_i64).unwrap_or_default()),
            FieldType::Float => query.bind(value.and_then(Value::as_f64).unwrap_or_default()),
        };
    }

    query
        .execute(&mut **tx)
        .await
        .map_err(|e| StorageError::write(format!("failed to store {}: {e}", model.key())))?;

    if let Model::Place(place) = model {
        replace_links(tx, place).await?;
    }
    Ok(())
}

/// Rewrite the join rows of `place` to match its `amenity_ids`.
async fn replace_links(tx: &mut Transaction<'_, Postgres>, place: &Place) -> StorageResult<()> {
    let link_error =
        |e: sqlx::Error| StorageError::write(format!("failed to store amenity links: {e}"));

    sqlx::query(&format!("DELETE FROM {PLACE_AMENITY_TABLE} WHERE place_id = $1"))
        .bind(&place.base.id)
        .execute(&mut **tx)
        .await
        .map_err(link_error)?;

    for (position, amenity_id) in place.amenity_ids.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| StorageError::write("too many amenity links"))?;
        sqlx::query(&format!(
            "INSERT INTO {PLACE_AMENITY_TABLE} (place_id, amenity_id, position) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING"
        ))
        .bind(&place.base.id)
        .bind(amenity_id)
        .bind(position)
        .execute(&mut **tx)
        .await
        .map_err(link_error)?;
    }
    Ok(())
}

async fn delete_row(
    tx: &mut Transaction<'_, Postgres>,
    kind: ModelKind,
    id: &str,
) -> StorageResult<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(|e| StorageError::write(format!("failed to delete {kind}.{id}: {e}")))?;

    let link_column = match kind {
        ModelKind::Place => "place_id",
        ModelKind::Amenity => "amenity_id",
        _ => return Ok(()),
    };
    sqlx::query(&format!(
        "DELETE FROM {PLACE_AMENITY_TABLE} WHERE {link_column} = $1"
    ))
    .bind(id)
    .execute(&mut **tx)
    .await
    .map_err(|e| StorageError::write(format!("failed to delete amenity links: {e}")))?;
    Ok(())
}

// =============================================================================
// StorageBackend Implementation
// =============================================================================

#[async_trait]
impl StorageBackend for PostgresStorage {
    fn name(&self) -> &'static str {
        "postgres"
    }

    /// One query per requested kind, plus the join table when places are read.
    async fn all(&self, kind: Option<ModelKind>) -> StorageResult<ObjectTable> {
        let pool = self.session_pool("all")?;
        let kinds: Vec<ModelKind> = match kind {
            Some(kind) => vec![kind],
            None => ModelKind::all().to_vec(),
        };

        let mut objects = ObjectTable::new();
        for kind in &kinds {
            let rows = sqlx::query(&format!("SELECT * FROM {}", kind.table()))
                .fetch_all(pool)
                .await
                .map_err(|e| StorageError::read(format!("failed to read {}: {e}", kind.table())))?;

            let mut links = if *kind == ModelKind::Place {
                fetch_links(pool).await?
            } else {
                HashMap::new()
            };

            for row in &rows {
                let mut model = row_to_model(*kind, row)?;
                if let Model::Place(place) = &mut model {
                    place.amenity_ids = links.remove(&place.base.id).unwrap_or_default();
                }
                objects.insert(model.key(), model);
            }
        }

        for (key, op) in &self.pending {
            if !kinds.contains(&op.kind()) {
                continue;
            }
            match op {
                PendingOp::Upsert(model) => {
                    objects.insert(key.clone(), model.clone());
                }
                PendingOp::Delete { .. } => {
                    objects.remove(key);
                }
            }
        }

        Ok(objects)
    }

    fn new(&mut self, model: Model) {
        let key = model.key();
        tracing::debug!(key = %key, "Staged upsert");
        self.pending.insert(key, PendingOp::Upsert(model));
    }

    fn delete(&mut self, model: Option<&Model>) {
        let Some(model) = model else { return };
        let key = model.key();
        tracing::debug!(key = %key, "Staged delete");
        self.pending.insert(
            key,
            PendingOp::Delete {
                kind: model.kind(),
                id: model.id().to_string(),
            },
        );
    }

    async fn save(&mut self) -> StorageResult<()> {
        let pool = self.session_pool("save")?;

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| StorageError::write(format!("failed to begin transaction: {e}")))?;

        for op in self.pending.values() {
            match op {
                PendingOp::Upsert(model) => upsert(&mut tx, model).await?,
                PendingOp::Delete { kind, id } => delete_row(&mut tx, *kind, id).await?,
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::write(format!("failed to commit: {e}")))?;

        tracing::info!(operations = self.pending.len(), "Committed session");
        self.pending.clear();
        Ok(())
    }

    async fn reload(&mut self) -> StorageResult<()> {
        let pool = self.connect().await?;
        self.init_schema(&pool).await?;

        if let Some(previous) = self.pool.replace(pool) {
            previous.close().await;
        }
        if !self.pending.is_empty() {
            tracing::warn!(
                discarded = self.pending.len(),
                "Reload discarded uncommitted operations"
            );
            self.pending.clear();
        }

        tracing::info!(test_mode = self.test_mode, "Opened database session");
        Ok(())
    }

    async fn close(&mut self) {
        self.pending.clear();
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            tracing::debug!("Closed database session");
        }
    }
}

// =============================================================================
// Tests (require running Postgres)
// =============================================================================
