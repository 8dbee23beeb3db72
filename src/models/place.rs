//! Place - A listing in a City, owned by a User
//!
//! Reviews are derived from `Review::place_id`. Amenities are the one
//! many-to-many edge; the ids live in `amenity_ids` here and each backend
//! decides how that list is persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::base::BaseModel;

/// A place to stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(flatten)]
    pub base: BaseModel,
    /// Foreign key to [`super::City`]
    #[serde(default)]
    pub city_id: String,
    /// Foreign key to [`super::User`] (the host)
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub number_rooms: i64,
    #[serde(default)]
    pub number_bathrooms: i64,
    #[serde(default)]
    pub max_guest: i64,
    #[serde(default)]
    pub price_by_night: i64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    /// Linked amenities, no duplicates
    #[serde(default)]
    pub amenity_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Place {
    /// Create a place with zeroed numeric attributes.
    #[must_use]
    pub fn new(
        city_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            base: BaseModel::new(),
            city_id: city_id.into(),
            user_id: user_id.into(),
            name: name.into(),
            description: String::new(),
            number_rooms: 0,
            number_bathrooms: 0,
            max_guest: 0,
            price_by_night: 0,
            latitude: 0.0,
            longitude: 0.0,
            amenity_ids: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Record an amenity link. Returns `false` if it was already linked.
    pub fn link_amenity(&mut self, amenity_id: &str) -> bool {
        if self.amenity_ids.iter().any(|id| id == amenity_id) {
            return false;
        }
        self.amenity_ids.push(amenity_id.to_string());
        true
    }
}
