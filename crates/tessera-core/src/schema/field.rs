use crate::{
    codec::{Codec, ScalarCodec, SchemaRef},
    value::Value,
};
use std::fmt;

/// Per-field migration between adjacent versions.
pub type Migration = fn(&Value) -> Value;

/// Factory producing a field's default value.
pub type DefaultFactory = fn() -> Value;

///
/// FieldDescriptor
///
/// One field of an entity as it exists from `version` onwards. A later
/// descriptor with the same name supersedes this one.
///

#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub wire_name: &'static str,
    pub version: u32,
    pub optional: bool,
    pub nullable: bool,
    pub codec: Codec,
    pub upgrade: Option<Migration>,
    pub downgrade: Option<Migration>,
    pub upgrade_patch: Option<Migration>,
    pub downgrade_patch: Option<Migration>,
    pub default: Option<DefaultFactory>,
}

impl FieldDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, codec: Codec) -> Self {
        Self {
            name,
            wire_name: name,
            version: 0,
            optional: false,
            nullable: false,
            codec,
            upgrade: None,
            downgrade: None,
            upgrade_patch: None,
            downgrade_patch: None,
            default: None,
        }
    }

    #[must_use]
    pub const fn scalar(name: &'static str, codec: &'static dyn ScalarCodec) -> Self {
        Self::new(name, Codec::Scalar(codec))
    }

    #[must_use]
    pub const fn entity(name: &'static str, schema: SchemaRef) -> Self {
        Self::new(name, Codec::Entity(schema))
    }

    #[must_use]
    pub const fn wire(mut self, wire_name: &'static str) -> Self {
        self.wire_name = wire_name;
        self
    }

    #[must_use]
    pub const fn since(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub const fn upgrade(mut self, migration: Migration) -> Self {
        self.upgrade = Some(migration);
        self
    }

    #[must_use]
    pub const fn downgrade(mut self, migration: Migration) -> Self {
        self.downgrade = Some(migration);
        self
    }

    #[must_use]
    pub const fn upgrade_patch(mut self, migration: Migration) -> Self {
        self.upgrade_patch = Some(migration);
        self
    }

    #[must_use]
    pub const fn downgrade_patch(mut self, migration: Migration) -> Self {
        self.downgrade_patch = Some(migration);
        self
    }

    #[must_use]
    pub const fn default_with(mut self, factory: DefaultFactory) -> Self {
        self.default = Some(factory);
        self
    }

    /// Field default factory, falling back to the codec default.
    #[must_use]
    pub fn default_value(&self) -> Option<Value> {
        self.default
            .map(|factory| factory())
            .or_else(|| self.codec.default_value())
    }

    #[must_use]
    pub fn is_default(&self, value: &Value) -> bool {
        match self.default {
            Some(factory) => factory() == *value,
            None => self.codec.is_default(value),
        }
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("wire_name", &self.wire_name)
            .field("version", &self.version)
            .field("optional", &self.optional)
            .field("nullable", &self.nullable)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}
