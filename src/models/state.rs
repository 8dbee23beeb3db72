//! State - Top of the location hierarchy

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::BaseModel;

/// A state. Its cities are derived, see [`crate::relations::cities_of_state`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(flatten)]
    pub base: BaseModel,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl State {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: BaseModel::new(),
            name: name.into(),
            extra: Map::new(),
        }
    }
}
