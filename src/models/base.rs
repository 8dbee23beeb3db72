//! BaseModel - Identity and timestamps shared by every entity
//!
//! TigerStyle: Explicit fields, generated once, never reassigned.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Sub-second digits kept on timestamps (Postgres TIMESTAMPTZ precision)
pub const TIMESTAMP_SUBSEC_DIGITS: u16 = 6;

/// Current time at storage precision.
///
/// Truncating here means a timestamp read back from either backend compares
/// equal to the one that was written.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS)
}

// =============================================================================
// BaseModel
// =============================================================================

/// Identity and timestamps embedded (flattened) in every entity.
///
/// Missing fields in a restore mapping are filled from [`Default`], which
/// generates a fresh id and a single `now()` for both timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseModel {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last persisted mutation
    pub updated_at: DateTime<Utc>,
}

impl BaseModel {
    /// Fresh identity with `created_at == updated_at`.
    #[must_use]
    pub fn new() -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh `updated_at`.
    ///
    /// Restored state may carry a `created_at` ahead of the local clock; the
    /// new `updated_at` is clamped to it.
    pub fn touch(&mut self) {
        self.updated_at = now().max(self.created_at);

        // Postcondition
        assert!(self.updated_at >= self.created_at);
    }
}

impl Default for BaseModel {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_model_new() {
        let base = BaseModel::new();
        assert!(Uuid::parse_str(&base.id).is_ok());
        assert_eq!(base.created_at, base.updated_at);
    }

    #[test]
    fn test_base_model_ids_unique() {
        let a = BaseModel::new();
        let b = BaseModel::new();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_base_model_touch() {
        let mut base = BaseModel::new();
        let created = base.created_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        base.touch();

        assert_eq!(base.created_at, created);
        assert!(base.updated_at > created);
    }

    #[test]
    fn test_touch_with_future_created_at() {
        let mut base: BaseModel = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "created_at": "2099-01-01T00:00:00Z",
            "updated_at": "2099-01-01T00:00:00Z",
        }))
        .unwrap();
        let created = base.created_at;

        base.touch();

        assert_eq!(base.created_at, created);
        assert_eq!(base.updated_at, created);
    }

    #[test]
    fn test_now_truncated_to_micros() {
        let ts = now();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_partial_mapping_fills_defaults() {
        let base: BaseModel = serde_json::from_value(serde_json::json!({"id": "abc"})).unwrap();
        assert_eq!(base.id, "abc");
        assert_eq!(base.created_at, base.updated_at);
    }
}
