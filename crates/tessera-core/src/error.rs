use derive_more::{Deref, IntoIterator};
use std::fmt;
use thiserror::Error as ThisError;

///
/// SchemaError
///
/// Misconfiguration detected while building or using an entity schema.
/// These are programmer errors and surface at registration time.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SchemaError {
    #[error("field '{field}' is registered twice for version {version} on {entity}")]
    DuplicateField {
        entity: &'static str,
        field: &'static str,
        version: u32,
    },

    #[error("{entity} has no identity and cannot be addressed inside an ordered patch list")]
    MissingIdentity { entity: &'static str },

    #[error("identity field '{field}' is not a registered field of {entity}")]
    UnknownIdentityField {
        entity: &'static str,
        field: &'static str,
    },
}

///
/// DecodeError
///
/// A single failure reading a tree value, pinned to the dotted path of the
/// offending sub-value. `code` is a stable machine-readable tag.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{code} at '{path}': {message}")]
pub struct DecodeError {
    pub code: String,
    pub message: String,
    pub path: String,
}

impl DecodeError {
    pub const INVALID_FIELD: &'static str = "invalid_field";
    pub const MISSING_FIELD: &'static str = "missing_field";
    pub const UNKNOWN_REFERENCE: &'static str = "unknown_reference";

    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: path.into(),
        }
    }

    /// Prefix the error code with a namespace, e.g. `dog.invalid_field`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.code = format!("{namespace}.{}", self.code);
        self
    }
}

///
/// DecodeErrors
///
/// Aggregate of independent decode failures collected from one pass.
/// Never empty when returned as an `Err`.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, PartialEq)]
pub struct DecodeErrors(#[into_iterator(owned, ref)] Vec<DecodeError>);

impl DecodeErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: DecodeError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Find the first error reported at `path`.
    #[must_use]
    pub fn at(&self, path: &str) -> Option<&DecodeError> {
        self.0.iter().find(|err| err.path == path)
    }

    /// Convert into a `Result`, succeeding with `value` when nothing was collected.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for DecodeErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "decode failed"),
            [only] => write!(f, "{only}"),
            [first, rest @ ..] => write!(f, "{first} (and {} more)", rest.len()),
        }
    }
}

impl std::error::Error for DecodeErrors {}

impl From<DecodeError> for DecodeErrors {
    fn from(error: DecodeError) -> Self {
        Self(vec![error])
    }
}

///
/// EncodeError
///
/// Encoding a well-formed entity never fails; these variants mark
/// invariant violations in the caller's data.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum EncodeError {
    #[error("{codec} codec rejected the value: {message}")]
    Codec { codec: &'static str, message: String },

    #[error("encode failed at {path}: {source}")]
    Context {
        path: String,
        #[source]
        source: Box<Self>,
    },

    #[error("required field '{field}' of {entity} has no value")]
    MissingValue {
        entity: &'static str,
        field: &'static str,
    },

    #[error("value shape mismatch: expected {expected}, found {actual}")]
    ShapeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

impl EncodeError {
    /// Prepend a field segment to the error path.
    #[must_use]
    pub fn with_field(self, field: impl AsRef<str>) -> Self {
        self.with_path_segment(field.as_ref())
    }

    /// Prepend an index segment to the error path.
    #[must_use]
    pub fn with_index(self, index: usize) -> Self {
        self.with_path_segment(index.to_string())
    }

    #[must_use]
    pub const fn path(&self) -> Option<&str> {
        match self {
            Self::Context { path, .. } => Some(path.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn leaf(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.leaf(),
            _ => self,
        }
    }

    fn with_path_segment(self, segment: impl Into<String>) -> Self {
        let segment = segment.into();
        match self {
            Self::Context { path, source } => Self::Context {
                path: join_path(&segment, &path),
                source,
            },
            source => Self::Context {
                path: segment,
                source: Box::new(source),
            },
        }
    }
}

///
/// CreateError
///
/// Validation failures from `Entity::create`.
///

#[remain::sorted]
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CreateError {
    #[error("required field '{field}' of {entity} is missing")]
    MissingRequired {
        entity: &'static str,
        field: &'static str,
    },

    #[error("field '{field}' of {entity} is not nullable")]
    NullNotAllowed {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity} has no field named '{field}'")]
    UnknownField { entity: &'static str, field: String },
}

/// Join two dotted path fragments.
pub(crate) fn join_path(prefix: &str, suffix: &str) -> String {
    match (prefix.is_empty(), suffix.is_empty()) {
        (true, _) => suffix.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}.{suffix}"),
    }
}

///
/// TESTS
///
