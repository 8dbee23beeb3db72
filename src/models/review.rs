//! Review - Written by a User about a Place

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::BaseModel;

/// A review of a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(flatten)]
    pub base: BaseModel,
    /// Foreign key to [`super::Place`]
    #[serde(default)]
    pub place_id: String,
    /// Foreign key to [`super::User`]
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Review {
    #[must_use]
    pub fn new(
        place_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            base: BaseModel::new(),
            place_id: place_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            extra: Map::new(),
        }
    }
}
