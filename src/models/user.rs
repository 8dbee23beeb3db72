//! User - An account that owns places and writes reviews

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::BaseModel;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identity and timestamps
    #[serde(flatten)]
    pub base: BaseModel,
    /// Login email
    #[serde(default)]
    pub email: String,
    /// Password as supplied (hashing is the caller's concern)
    #[serde(default)]
    pub password: String,
    /// Given name
    #[serde(default)]
    pub first_name: String,
    /// Family name
    #[serde(default)]
    pub last_name: String,
    /// Undeclared attributes
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Create a user with login credentials and empty names.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base: BaseModel::new(),
            email: email.into(),
            password: password.into(),
            first_name: String::new(),
            last_name: String::new(),
            extra: Map::new(),
        }
    }
}
