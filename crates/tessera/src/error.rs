use derive_more::Display;
use serde::{Deserialize, Serialize};
use tessera_core::{
    config::ConfigError,
    error::{CreateError, DecodeError, DecodeErrors, EncodeError, SchemaError},
    patch::PatchError as CorePatchError,
};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }
}

impl From<DecodeErrors> for Error {
    fn from(errors: DecodeErrors) -> Self {
        let kind = errors
            .first()
            .map_or(DecodeErrorKind::InvalidField, DecodeErrorKind::from);

        Self::new(ErrorKind::Decode(kind), ErrorOrigin::Decode, errors.to_string())
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        DecodeErrors::from(err).into()
    }
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Self {
        Self::new(ErrorKind::Internal, ErrorOrigin::Encode, err.to_string())
    }
}

impl From<CorePatchError> for Error {
    fn from(err: CorePatchError) -> Self {
        let kind = match err.leaf() {
            CorePatchError::Schema(_) => ErrorKind::Schema,
            leaf => ErrorKind::Patch(leaf.into()),
        };

        Self::new(kind, ErrorOrigin::Patch, err.to_string())
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Self::new(ErrorKind::Schema, ErrorOrigin::Schema, err.to_string())
    }
}

impl From<CreateError> for Error {
    fn from(err: CreateError) -> Self {
        Self::new(ErrorKind::Invalid, ErrorOrigin::Create, err.to_string())
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config, ErrorOrigin::Config, err.to_string())
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[remain::sorted]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Configuration could not be parsed.
    Config,

    Decode(DecodeErrorKind),

    /// The caller cannot remediate this.
    Internal,

    /// Entity values violate their schema (missing or null fields).
    Invalid,

    Patch(PatchErrorKind),

    /// Schema definition or identity contract violated.
    Schema,
}

///
/// DecodeErrorKind
/// Kind of the first decode failure; the message lists all of them.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DecodeErrorKind {
    InvalidField,
    MissingField,
    UnknownReference,
}

impl From<&DecodeError> for DecodeErrorKind {
    fn from(err: &DecodeError) -> Self {
        match err.code.rsplit('.').next().unwrap_or_default() {
            DecodeError::MISSING_FIELD => Self::MissingField,
            DecodeError::UNKNOWN_REFERENCE => Self::UnknownReference,
            _ => Self::InvalidField,
        }
    }
}

///
/// PatchErrorKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum PatchErrorKind {
    CannotPatchAbsent,
    InvalidShape,
    NotAPatch,
    NullNotAllowed,
    SchemaMismatch,
}

impl From<&CorePatchError> for PatchErrorKind {
    fn from(err: &CorePatchError) -> Self {
        match err.leaf() {
            CorePatchError::CannotPatchAbsent { .. } => Self::CannotPatchAbsent,
            CorePatchError::NotAPatch { .. } => Self::NotAPatch,
            CorePatchError::NullNotAllowed { .. } => Self::NullNotAllowed,
            CorePatchError::SchemaMismatch { .. } => Self::SchemaMismatch,
            CorePatchError::ShapeMismatch { .. }
            | CorePatchError::Schema(_)
            | CorePatchError::Context { .. } => Self::InvalidShape,
        }
    }
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Config,
    Create,
    Decode,
    Encode,
    Patch,
    Schema,
}

///
/// TESTS
///
