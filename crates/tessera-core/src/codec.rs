use crate::{schema::EntitySchema, value::Value};
use serde_json::{Number, Value as TreeValue};
use std::fmt;
use thiserror::Error as ThisError;

/// Lazily resolved schema handle; a plain function so entity types may
/// refer to themselves.
pub type SchemaRef = fn() -> &'static EntitySchema;

///
/// CodecError
///
/// Failure reported by a leaf codec. The wire decoder attaches the path.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct CodecError {
    pub code: &'static str,
    pub message: String,
}

impl CodecError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: "invalid_field",
            message: message.into(),
        }
    }
}

///
/// ScalarCodec
///
/// Contract for leaf codecs. Implementations are stateless and shared
/// across every schema that mentions them.
///

pub trait ScalarCodec: Send + Sync {
    /// Short label used in diagnostics.
    fn name(&self) -> &'static str;

    fn decode(&self, node: &TreeValue) -> Result<Value, CodecError>;

    fn encode(&self, value: &Value) -> Result<TreeValue, CodecError> {
        scalar_to_tree(value)
    }

    /// Value reconstructed when a required field is absent on the wire.
    fn default_value(&self) -> Option<Value> {
        None
    }

    fn is_default(&self, value: &Value) -> bool {
        self.default_value().is_some_and(|default| &default == value)
    }
}

/// Encode a scalar value as its natural tree form.
pub fn scalar_to_tree(value: &Value) -> Result<TreeValue, CodecError> {
    match value {
        Value::Null => Ok(TreeValue::Null),
        Value::Bool(value) => Ok(TreeValue::Bool(*value)),
        Value::Int(value) => Ok(TreeValue::Number((*value).into())),
        Value::Float(value) => Number::from_f64(*value)
            .map(TreeValue::Number)
            .ok_or_else(|| CodecError::invalid(format!("{value} is not a finite number"))),
        Value::Text(value) => Ok(TreeValue::String(value.clone())),
        other => Err(CodecError::invalid(format!(
            "expected a scalar, found {}",
            other.kind()
        ))),
    }
}

///
/// TextCodec
///

pub struct TextCodec;

impl ScalarCodec for TextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn decode(&self, node: &TreeValue) -> Result<Value, CodecError> {
        node.as_str()
            .map(Value::from)
            .ok_or_else(|| CodecError::invalid("Expected a string"))
    }

    fn default_value(&self) -> Option<Value> {
        Some(Value::Text(String::new()))
    }
}

///
/// IntegerCodec
///
/// Accepts integral numbers and numeric strings.
///

pub struct IntegerCodec;

impl ScalarCodec for IntegerCodec {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn decode(&self, node: &TreeValue) -> Result<Value, CodecError> {
        let parsed = match node {
            TreeValue::Number(number) => number.as_i64(),
            TreeValue::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        };

        parsed
            .map(Value::Int)
            .ok_or_else(|| CodecError::invalid("Expected an integer"))
    }
}

///
/// NumberCodec
///

pub struct NumberCodec;

impl ScalarCodec for NumberCodec {
    fn name(&self) -> &'static str {
        "number"
    }

    fn decode(&self, node: &TreeValue) -> Result<Value, CodecError> {
        node.as_f64()
            .map(Value::Float)
            .ok_or_else(|| CodecError::invalid("Expected a number"))
    }

    fn encode(&self, value: &Value) -> Result<TreeValue, CodecError> {
        match value {
            #[allow(clippy::cast_precision_loss)]
            Value::Int(int) => scalar_to_tree(&Value::Float(*int as f64)),
            other => scalar_to_tree(other),
        }
    }
}

///
/// BooleanCodec
///
/// Accepts `true`/`false`, their string spellings, and `1`/`0`.
///

pub struct BooleanCodec;

impl ScalarCodec for BooleanCodec {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn decode(&self, node: &TreeValue) -> Result<Value, CodecError> {
        let parsed = match node {
            TreeValue::Bool(value) => Some(*value),
            TreeValue::String(text) => match text.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            TreeValue::Number(number) => match number.as_i64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            _ => None,
        };

        parsed
            .map(Value::Bool)
            .ok_or_else(|| CodecError::invalid("Expected a boolean"))
    }
}

///
/// EnumCodec
///
/// Text restricted to a fixed set of variants.
///

pub struct EnumCodec {
    pub variants: &'static [&'static str],
}

impl ScalarCodec for EnumCodec {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn decode(&self, node: &TreeValue) -> Result<Value, CodecError> {
        match node.as_str() {
            Some(text) if self.variants.contains(&text) => Ok(Value::from(text)),
            _ => Err(CodecError::invalid(format!(
                "Expected one of: {}",
                self.variants.join(", ")
            ))),
        }
    }
}

pub static TEXT: TextCodec = TextCodec;
pub static INTEGER: IntegerCodec = IntegerCodec;
pub static NUMBER: NumberCodec = NumberCodec;
pub static BOOLEAN: BooleanCodec = BooleanCodec;

///
/// Codec
///
/// Structural codec of a field. The `Patchable*` and `PutOrPatch` variants
/// only appear in derived patch schemas.
///

#[derive(Clone)]
pub enum Codec {
    Scalar(&'static dyn ScalarCodec),
    Entity(SchemaRef),
    List(Box<Self>),
    Map(Box<Self>),
    PutOrPatch(SchemaRef),
    PatchableList(Box<Self>),
    PatchableMap(Box<Self>),
}

impl Codec {
    #[must_use]
    pub fn list(inner: Self) -> Self {
        Self::List(Box::new(inner))
    }

    #[must_use]
    pub fn map(inner: Self) -> Self {
        Self::Map(Box::new(inner))
    }

    /// True for codecs whose patch form carries structure rather than a
    /// plain replacement value.
    #[must_use]
    pub const fn is_structural_patch(&self) -> bool {
        matches!(
            self,
            Self::PutOrPatch(_) | Self::PatchableList(_) | Self::PatchableMap(_)
        )
    }

    ///
    /// patch_codec
    ///
    /// Codec used by the derived patch shape. Idempotent: the patch codec of
    /// a patch codec is itself.
    ///
    #[must_use]
    pub fn patch_codec(&self) -> Self {
        match self {
            Self::Entity(schema) => Self::PutOrPatch(*schema),
            Self::List(inner) => match inner.as_ref() {
                Self::Scalar(_) => Self::PatchableList(inner.clone()),
                Self::Entity(schema) if schema().is_identifiable() => {
                    Self::PatchableList(inner.clone())
                }
                _ => self.clone(),
            },
            Self::Map(inner) => match inner.as_ref() {
                Self::Entity(_) => Self::PatchableMap(inner.clone()),
                _ => self.clone(),
            },
            _ => self.clone(),
        }
    }

    /// Default supplied by the codec itself; only leaf codecs have one.
    #[must_use]
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Self::Scalar(codec) => codec.default_value(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_default(&self, value: &Value) -> bool {
        match self {
            Self::Scalar(codec) => codec.is_default(value),
            _ => false,
        }
    }

    /// Entity schema addressed by this codec or its element codec.
    #[must_use]
    pub fn element_schema(&self) -> Option<SchemaRef> {
        match self {
            Self::Entity(schema) | Self::PutOrPatch(schema) => Some(*schema),
            Self::List(inner)
            | Self::Map(inner)
            | Self::PatchableList(inner)
            | Self::PatchableMap(inner) => inner.element_schema(),
            Self::Scalar(_) => None,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Entity(_) => "entity",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::PutOrPatch(_) => "entity or patch",
            Self::PatchableList(_) => "list or list patch",
            Self::PatchableMap(_) => "map or map patch",
        }
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(codec) => write!(f, "Scalar({})", codec.name()),
            Self::Entity(_) => write!(f, "Entity"),
            Self::PutOrPatch(_) => write!(f, "PutOrPatch"),
            Self::List(inner) => write!(f, "List({inner:?})"),
            Self::Map(inner) => write!(f, "Map({inner:?})"),
            Self::PatchableList(inner) => write!(f, "PatchableList({inner:?})"),
            Self::PatchableMap(inner) => write!(f, "PatchableMap({inner:?})"),
        }
    }
}

///
/// TESTS
///
