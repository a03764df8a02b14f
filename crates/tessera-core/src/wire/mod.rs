//! Wire codec: entities to and from a generic tree value, at an explicit
//! schema version.

mod decode;
mod encode;
mod envelope;
mod reader;

pub use envelope::Envelope;
pub use reader::Cursor;

use crate::{
    entity::Entity,
    error::{DecodeErrors, EncodeError},
    schema::EntitySchema,
    value::Value,
};
use std::collections::{HashMap, HashSet};

/// Generic tree value exchanged with transports and storage.
pub type TreeValue = serde_json::Value;

/// Discriminant carried by patch entities and collection patches.
pub const PATCH_MARKER: &str = "_isPatch";

/// Key of a back-reference to an entity already emitted in the same pass.
pub const REFERENCE_MARKER: &str = "_ref";

///
/// EncodeContext
///
/// Per-pass encoding state: target version, default skipping, and the
/// set of identities already emitted when references are on.
///

#[derive(Clone, Debug)]
pub struct EncodeContext {
    version: u32,
    skip_defaults: bool,
    references: Option<HashSet<ReferenceKey>>,
}

impl EncodeContext {
    #[must_use]
    pub const fn new(version: u32) -> Self {
        Self {
            version,
            skip_defaults: false,
            references: None,
        }
    }

    /// Encode at the latest version of `schema`.
    #[must_use]
    pub const fn latest(schema: &EntitySchema) -> Self {
        Self::new(schema.latest_version())
    }

    #[must_use]
    pub const fn skip_defaults(mut self, skip: bool) -> Self {
        self.skip_defaults = skip;
        self
    }

    /// Emit repeated identified entities as `{ "_ref": id }`.
    #[must_use]
    pub fn with_references(mut self) -> Self {
        self.references = Some(HashSet::new());
        self
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub const fn skips_defaults(&self) -> bool {
        self.skip_defaults
    }

    /// Record an emitted identity; false if it was already emitted.
    pub(crate) fn first_emission(&mut self, entity: &'static str, id: &Value) -> bool {
        self.references
            .as_mut()
            .is_none_or(|seen| seen.insert(reference_key(entity, id)))
    }
}

///
/// DecodeContext
///
/// Per-pass decoding state: source version and, when references are on,
/// the table of identified entities decoded so far.
///

#[derive(Clone, Debug)]
pub struct DecodeContext {
    version: u32,
    references: Option<HashMap<ReferenceKey, Entity>>,
}

impl DecodeContext {
    #[must_use]
    pub const fn new(version: u32) -> Self {
        Self {
            version,
            references: None,
        }
    }

    #[must_use]
    pub const fn latest(schema: &EntitySchema) -> Self {
        Self::new(schema.latest_version())
    }

    /// Resolve `{ "_ref": id }` nodes against entities seen earlier.
    #[must_use]
    pub fn with_references(mut self) -> Self {
        self.references = Some(HashMap::new());
        self
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn remember(&mut self, entity: &Entity) {
        if let Some(table) = self.references.as_mut()
            && let Some(id) = entity.identity()
        {
            table.insert(reference_key(entity.schema().name(), &id), entity.clone());
        }
    }

    pub(crate) fn lookup(&self, entity: &'static str, id: &Value) -> Option<&Entity> {
        self.references
            .as_ref()
            .and_then(|table| table.get(&reference_key(entity, id)))
    }
}

// entity name plus kind-tagged id, so `2` and `"2"` stay distinct
type ReferenceKey = (&'static str, String);

fn reference_key(entity: &'static str, id: &Value) -> ReferenceKey {
    (entity, format!("{}:{id}", id.kind()))
}

impl Entity {
    /// Encode this entity for the version in `ctx`.
    pub fn encode(&self, ctx: &mut EncodeContext) -> Result<TreeValue, EncodeError> {
        encode::entity(self, ctx)
    }
}

impl EntitySchema {
    /// Decode an entity (put or patch, per this schema's flavor) written
    /// at the version in `ctx`.
    pub fn decode(
        &'static self,
        tree: &TreeValue,
        ctx: &mut DecodeContext,
    ) -> Result<Entity, DecodeErrors> {
        decode::entity(self, &Cursor::root(tree), ctx)
    }

    /// Decode a put entity or, when the tree carries the patch marker, a
    /// patch of this entity type.
    pub fn decode_any(
        &'static self,
        tree: &TreeValue,
        ctx: &mut DecodeContext,
    ) -> Result<Entity, DecodeErrors> {
        let schema = if decode::is_patch_node(tree) {
            self.patch_schema()
        } else {
            self.put_schema()
        };

        decode::entity(schema, &Cursor::root(tree), ctx)
    }
}

///
/// TESTS
///
