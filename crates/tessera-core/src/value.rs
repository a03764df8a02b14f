use crate::{
    entity::Entity,
    patch::{KeyedPatchMap, OrderedPatchList},
};
use std::{collections::BTreeMap, fmt};

///
/// Value
///
/// In-memory value held by an entity field, list element, or map entry.
/// Collection patches are values too, so patch entities reuse the same
/// storage as put entities.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Self>),
    Map(BTreeMap<String, Self>),
    Entity(Box<Entity>),
    ListPatch(OrderedPatchList),
    MapPatch(KeyedPatchMap),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Text(_)
        )
    }

    /// True for values that carry a change rather than a replacement:
    /// patch entities and collection patches.
    #[must_use]
    pub fn is_patch(&self) -> bool {
        match self {
            Self::Entity(entity) => entity.is_patch(),
            Self::ListPatch(_) | Self::MapPatch(_) => true,
            _ => false,
        }
    }

    ///
    /// identity
    ///
    /// Stable key used to address this value inside a collection.
    /// Scalars are their own identity; entities defer to their schema.
    ///
    #[must_use]
    pub fn identity(&self) -> Option<Self> {
        match self {
            Self::Bool(_) | Self::Int(_) | Self::Text(_) => Some(self.clone()),
            Self::Entity(entity) => entity.identity(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Short name of the variant, for shape-mismatch messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Entity(_) => "entity",
            Self::ListPatch(_) => "list patch",
            Self::MapPatch(_) => "map patch",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Entity(entity) => match entity.identity() {
                Some(id) => write!(f, "{}({id})", entity.schema().name()),
                None => write!(f, "{}", entity.schema().name()),
            },
            other => write!(f, "<{}>", other.kind()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Self::Entity(Box::new(value))
    }
}

impl From<OrderedPatchList> for Value {
    fn from(value: OrderedPatchList) -> Self {
        Self::ListPatch(value)
    }
}

impl From<KeyedPatchMap> for Value {
    fn from(value: KeyedPatchMap) -> Self {
        Self::MapPatch(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

///
/// TESTS
///
