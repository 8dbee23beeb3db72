//! City - Belongs to a State through `state_id`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::BaseModel;

/// A city inside a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(flatten)]
    pub base: BaseModel,
    /// Foreign key to [`super::State`]
    #[serde(default)]
    pub state_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl City {
    #[must_use]
    pub fn new(state_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            base: BaseModel::new(),
            state_id: state_id.into(),
            name: name.into(),
            extra: Map::new(),
        }
    }
}
