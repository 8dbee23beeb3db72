//! Models - The tracked entity types
//!
//! TigerStyle: Closed set of kinds, explicit field declarations.
//!
//! Every entity is a plain struct embedding a [`BaseModel`]. The object table
//! is heterogeneous, so entities travel through storage as [`Model`], a closed
//! enum over the six kinds. The serialized form of a `Model` is a flat JSON
//! object carrying a `__class__` discriminator next to the attributes.
//!
//! Constructing an entity has no side effect: nothing is registered with any
//! storage until the caller passes it to `StorageBackend::new`.

mod amenity;
mod base;
mod city;
mod place;
mod review;
mod state;
mod user;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use amenity::Amenity;
pub use base::{now, BaseModel, TIMESTAMP_SUBSEC_DIGITS};
pub use city::City;
pub use place::Place;
pub use review::Review;
pub use state::State;
pub use user::User;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Discriminator field naming the concrete type in a serialized entity
pub const CLASS_FIELD: &str = "__class__";

/// Attributes that can never be reassigned after construction
pub const PROTECTED_ATTRIBUTES: &[&str] = &["id", "created_at", "updated_at", CLASS_FIELD];

/// Separator between type name and id in an identity key
pub const KEY_SEPARATOR: char = '.';

/// Identity key for an entity: `"<Type>.<id>"`.
#[must_use]
pub fn key_for(kind: ModelKind, id: &str) -> String {
    format!("{}{}{}", kind.as_str(), KEY_SEPARATOR, id)
}

// =============================================================================
// Field Declarations
// =============================================================================

/// Storage type of a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// UTF-8 string
    Text,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Float,
}

/// A declared, typed attribute of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Attribute (and column) name
    pub name: &'static str,
    /// Storage type
    pub ty: FieldType,
}

impl Field {
    const fn text(name: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Text,
        }
    }

    const fn integer(name: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Integer,
        }
    }

    const fn float(name: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Float,
        }
    }
}

const USER_FIELDS: &[Field] = &[
    Field::text("email"),
    Field::text("password"),
    Field::text("first_name"),
    Field::text("last_name"),
];

const STATE_FIELDS: &[Field] = &[Field::text("name")];

const CITY_FIELDS: &[Field] = &[Field::text("state_id"), Field::text("name")];

const PLACE_FIELDS: &[Field] = &[
    Field::text("city_id"),
    Field::text("user_id"),
    Field::text("name"),
    Field::text("description"),
    Field::integer("number_rooms"),
    Field::integer("number_bathrooms"),
    Field::integer("max_guest"),
    Field::integer("price_by_night"),
    Field::float("latitude"),
    Field::float("longitude"),
];

const REVIEW_FIELDS: &[Field] = &[
    Field::text("place_id"),
    Field::text("user_id"),
    Field::text("text"),
];

const AMENITY_FIELDS: &[Field] = &[Field::text("name")];

// =============================================================================
// Model Kind
// =============================================================================

/// The tracked-type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelKind {
    User,
    State,
    City,
    Place,
    Review,
    Amenity,
}

impl ModelKind {
    /// Type name as used in identity keys and the `__class__` field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::State => "State",
            Self::City => "City",
            Self::Place => "Place",
            Self::Review => "Review",
            Self::Amenity => "Amenity",
        }
    }

    /// Resolve a type name. Names are case-sensitive, as in identity keys.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "User" => Some(Self::User),
            "State" => Some(Self::State),
            "City" => Some(Self::City),
            "Place" => Some(Self::Place),
            "Review" => Some(Self::Review),
            "Amenity" => Some(Self::Amenity),
            _ => None,
        }
    }

    /// Get all kinds in order.
    #[must_use]
    pub fn all() -> &'static [ModelKind] {
        &[
            Self::User,
            Self::State,
            Self::City,
            Self::Place,
            Self::Review,
            Self::Amenity,
        ]
    }

    /// Relational table holding this kind.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::State => "states",
            Self::City => "cities",
            Self::Place => "places",
            Self::Review => "reviews",
            Self::Amenity => "amenities",
        }
    }

    /// Declared attributes, excluding identity and timestamps.
    #[must_use]
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Self::User => USER_FIELDS,
            Self::State => STATE_FIELDS,
            Self::City => CITY_FIELDS,
            Self::Place => PLACE_FIELDS,
            Self::Review => REVIEW_FIELDS,
            Self::Amenity => AMENITY_FIELDS,
        }
    }

    /// Look up a declared attribute by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields().iter().copied().find(|f| f.name == name)
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Model
// =============================================================================

/// Any tracked entity; the value type of the object table.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    User(User),
    State(State),
    City(City),
    Place(Place),
    Review(Review),
    Amenity(Amenity),
}

macro_rules! each_model {
    ($model:expr, $inner:ident => $body:expr) => {
        match $model {
            Model::User($inner) => $body,
            Model::State($inner) => $body,
            Model::City($inner) => $body,
            Model::Place($inner) => $body,
            Model::Review($inner) => $body,
            Model::Amenity($inner) => $body,
        }
    };
}

impl Model {
    /// Concrete kind.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::User(_) => ModelKind::User,
            Self::State(_) => ModelKind::State,
            Self::City(_) => ModelKind::City,
            Self::Place(_) => ModelKind::Place,
            Self::Review(_) => ModelKind::Review,
            Self::Amenity(_) => ModelKind::Amenity,
        }
    }

    #[must_use]
    pub fn base(&self) -> &BaseModel {
        each_model!(self, m => &m.base)
    }

    pub fn base_mut(&mut self) -> &mut BaseModel {
        each_model!(self, m => &mut m.base)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.base().id
    }

    /// Identity key `"<Type>.<id>"`.
    #[must_use]
    pub fn key(&self) -> String {
        key_for(self.kind(), self.id())
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.base_mut().touch();
    }

    /// Serialize to a flat attribute map including the `__class__` discriminator.
    pub fn to_dict(&self) -> Result<Map<String, Value>, ModelError> {
        let kind = self.kind();
        let value = each_model!(self, m => serde_json::to_value(m))
            .map_err(|e| ModelError::invalid(kind, e))?;

        let Value::Object(mut dict) = value else {
            return Err(ModelError::invalid(kind, "entity did not serialize to an object"));
        };
        dict.insert(
            CLASS_FIELD.to_string(),
            Value::String(kind.as_str().to_string()),
        );

        // Postcondition
        assert!(dict.contains_key("id"), "serialized entity must carry its id");
        Ok(dict)
    }

    /// Restore an entity from an attribute map.
    ///
    /// The discriminator selects the concrete type. Identity and timestamps are
    /// taken from the map when present and generated otherwise.
    ///
    /// # Errors
    /// Returns error if `__class__` is missing or unknown, or an attribute has
    /// the wrong type.
    pub fn from_dict(mut dict: Map<String, Value>) -> Result<Self, ModelError> {
        let class = match dict.remove(CLASS_FIELD) {
            Some(Value::String(class)) => class,
            Some(_) | None => return Err(ModelError::MissingClass),
        };
        let kind = ModelKind::from_str(&class).ok_or(ModelError::UnknownType(class))?;
        let value = Value::Object(dict);

        let model = match kind {
            ModelKind::User => Self::User(decode(kind, value)?),
            ModelKind::State => Self::State(decode(kind, value)?),
            ModelKind::City => Self::City(decode(kind, value)?),
            ModelKind::Place => Self::Place(decode(kind, value)?),
            ModelKind::Review => Self::Review(decode(kind, value)?),
            ModelKind::Amenity => Self::Amenity(decode(kind, value)?),
        };
        Ok(model)
    }

    /// A fresh entity of `kind` with default attributes.
    pub fn blank(kind: ModelKind) -> Result<Self, ModelError> {
        let mut dict = Map::new();
        dict.insert(
            CLASS_FIELD.to_string(),
            Value::String(kind.as_str().to_string()),
        );
        Self::from_dict(dict)
    }

    /// Set one attribute, declared or not.
    ///
    /// Declared attributes must match their declared type. Identity, timestamps
    /// and the discriminator are rejected.
    pub fn set_attribute(&mut self, name: &str, value: Value) -> Result<(), ModelError> {
        if PROTECTED_ATTRIBUTES.contains(&name) {
            return Err(ModelError::ProtectedAttribute(name.to_string()));
        }

        let mut dict = self.to_dict()?;
        dict.insert(name.to_string(), value);
        let updated = Self::from_dict(dict)?;

        // Postcondition
        assert_eq!(updated.id(), self.id(), "set_attribute must not change identity");
        *self = updated;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(kind: ModelKind, value: Value) -> Result<T, ModelError> {
    serde_json::from_value(value).map_err(|e| ModelError::invalid(kind, e))
}

// =============================================================================
// Entity Trait
// =============================================================================

/// Implemented by every concrete entity struct.
pub trait Entity: Clone + Into<Model> {
    /// Kind of this entity type.
    const KIND: ModelKind;

    fn base(&self) -> &BaseModel;

    fn base_mut(&mut self) -> &mut BaseModel;

    /// Unwrap a [`Model`] of this kind.
    fn from_model(model: Model) -> Option<Self>;

    /// Borrow a [`Model`] of this kind.
    fn from_model_ref(model: &Model) -> Option<&Self>;

    fn id(&self) -> &str {
        &self.base().id
    }

    /// Identity key `"<Type>.<id>"`.
    fn key(&self) -> String {
        key_for(Self::KIND, self.id())
    }
}

macro_rules! impl_entity {
    ($ty:ident) => {
        impl From<$ty> for Model {
            fn from(entity: $ty) -> Self {
                Self::$ty(entity)
            }
        }

        impl Entity for $ty {
            const KIND: ModelKind = ModelKind::$ty;

            fn base(&self) -> &BaseModel {
                &self.base
            }

            fn base_mut(&mut self) -> &mut BaseModel {
                &mut self.base
            }

            fn from_model(model: Model) -> Option<Self> {
                match model {
                    Model::$ty(entity) => Some(entity),
                    _ => None,
                }
            }

            fn from_model_ref(model: &Model) -> Option<&Self> {
                match model {
                    Model::$ty(entity) => Some(entity),
                    _ => None,
                }
            }
        }
    };
}

impl_entity!(User);
impl_entity!(State);
impl_entity!(City);
impl_entity!(Place);
impl_entity!(Review);
impl_entity!(Amenity);

// =============================================================================
// Errors
// =============================================================================

/// Entity (de)serialization errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unknown model type: {0}")]
    UnknownType(String),

    #[error("missing __class__ discriminator")]
    MissingClass,

    #[error("invalid {kind}: {reason}")]
    Invalid { kind: ModelKind, reason: String },

    #[error("attribute {0} cannot be changed")]
    ProtectedAttribute(String),
}

impl ModelError {
    fn invalid(kind: ModelKind, reason: impl std::fmt::Display) -> Self {
        Self::Invalid {
            kind,
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
