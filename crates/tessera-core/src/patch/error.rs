use crate::error::{SchemaError, join_path};
use thiserror::Error as ThisError;

///
/// PatchError
///
/// Structured failures while merging or applying patches. Intentional
/// no-ops (missing move/delete/patch targets) are not errors.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PatchError {
    #[error("cannot patch absent {entity}: {reason}")]
    CannotPatchAbsent { entity: &'static str, reason: String },

    #[error("patch failed at {path}: {source}")]
    Context {
        path: String,
        #[source]
        source: Box<Self>,
    },

    #[error("expected a patch of {entity}, found a put entity")]
    NotAPatch { entity: &'static str },

    #[error("field '{field}' of {entity} is not nullable")]
    NullNotAllowed {
        entity: &'static str,
        field: &'static str,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("cannot apply a {actual} patch to {expected}")]
    SchemaMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid patch shape: expected {expected}, found {actual}")]
    ShapeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

impl PatchError {
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

    /// Return the full contextual path, if available.
    #[must_use]
    pub const fn path(&self) -> Option<&str> {
        match self {
            Self::Context { path, .. } => Some(path.as_str()),
            _ => None,
        }
    }

    /// Return the innermost, non-context variant.
    #[must_use]
    pub fn leaf(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.leaf(),
            _ => self,
        }
    }

    pub(crate) fn cannot_patch_absent(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::CannotPatchAbsent {
            entity,
            reason: reason.into(),
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
