mod derive;
mod field;

pub use field::{DefaultFactory, FieldDescriptor, Migration};

use crate::{entity::Entity, error::SchemaError, value::Value};
use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

/// Wire names emitted ahead of the lexicographic order.
const PRIORITY_FIELDS: &[&str] = &["id"];

///
/// Flavor
///
/// Put entities are concrete; patch entities describe a partial change.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flavor {
    Put,
    Patch,
}

///
/// Identity
///

#[derive(Clone, Copy)]
pub enum Identity {
    Field(&'static str),
    Accessor(fn(&Entity) -> Option<Value>),
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "Field({name})"),
            Self::Accessor(_) => write!(f, "Accessor"),
        }
    }
}

///
/// SchemaBuilder
///
/// Collects field descriptors for one entity type. `build` freezes them.
///

pub struct SchemaBuilder {
    name: &'static str,
    fields: Vec<FieldDescriptor>,
    identity: Option<Identity>,
    latest_version: Option<u32>,
}

impl SchemaBuilder {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
            identity: None,
            latest_version: None,
        }
    }

    /// Append a descriptor. A second descriptor for the same name and
    /// version is rejected.
    pub fn register(mut self, descriptor: FieldDescriptor) -> Result<Self, SchemaError> {
        let duplicate = self
            .fields
            .iter()
            .any(|d| d.name == descriptor.name && d.version == descriptor.version);
        if duplicate {
            return Err(SchemaError::DuplicateField {
                entity: self.name,
                field: descriptor.name,
                version: descriptor.version,
            });
        }

        self.fields.push(descriptor);
        Ok(self)
    }

    #[must_use]
    pub const fn identity_field(mut self, name: &'static str) -> Self {
        self.identity = Some(Identity::Field(name));
        self
    }

    #[must_use]
    pub const fn identity_with(mut self, accessor: fn(&Entity) -> Option<Value>) -> Self {
        self.identity = Some(Identity::Accessor(accessor));
        self
    }

    /// Pin the latest version; defaults to the highest field version.
    #[must_use]
    pub const fn latest_version(mut self, version: u32) -> Self {
        self.latest_version = Some(version);
        self
    }

    pub fn build(mut self) -> Result<EntitySchema, SchemaError> {
        if let Some(Identity::Field(field)) = self.identity
            && !self.fields.iter().any(|d| d.name == field)
        {
            return Err(SchemaError::UnknownIdentityField {
                entity: self.name,
                field,
            });
        }

        // stable, so registration order breaks ties
        self.fields.sort_by_key(|d| d.version);

        let latest_version = self
            .latest_version
            .or_else(|| self.fields.iter().map(|d| d.version).max())
            .unwrap_or_default();

        Ok(EntitySchema::new(
            self.name,
            Flavor::Put,
            latest_version,
            self.fields,
            self.identity,
            None,
        ))
    }
}

///
/// EntitySchema
///
/// Frozen field registry of one entity type, with lazily derived patch
/// shape and per-version resolution caches.
///

pub struct EntitySchema {
    name: &'static str,
    flavor: Flavor,
    latest_version: u32,
    fields: Vec<FieldDescriptor>,
    identity: Option<Identity>,
    origin: Option<&'static Self>,
    patch_shape: OnceLock<Box<Self>>,
    by_version: RwLock<HashMap<u32, Arc<[usize]>>>,
    latest: OnceLock<Arc<[usize]>>,
}

impl EntitySchema {
    fn new(
        name: &'static str,
        flavor: Flavor,
        latest_version: u32,
        fields: Vec<FieldDescriptor>,
        identity: Option<Identity>,
        origin: Option<&'static Self>,
    ) -> Self {
        Self {
            name,
            flavor,
            latest_version,
            fields,
            identity,
            origin,
            patch_shape: OnceLock::new(),
            by_version: RwLock::new(HashMap::new()),
            latest: OnceLock::new(),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn flavor(&self) -> Flavor {
        self.flavor
    }

    #[must_use]
    pub const fn is_patch(&self) -> bool {
        matches!(self.flavor, Flavor::Patch)
    }

    #[must_use]
    pub const fn latest_version(&self) -> u32 {
        self.latest_version
    }

    /// Every registered descriptor, ascending by version.
    #[must_use]
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[must_use]
    pub const fn identity(&self) -> Option<Identity> {
        self.identity
    }

    #[must_use]
    pub const fn is_identifiable(&self) -> bool {
        self.identity.is_some()
    }

    /// Name of the identity field, when identity is field-based.
    #[must_use]
    pub const fn identity_field(&self) -> Option<&'static str> {
        match self.identity {
            Some(Identity::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// The put schema this shape was derived from, or itself.
    #[must_use]
    pub fn put_schema(&'static self) -> &'static Self {
        self.origin.unwrap_or(self)
    }

    /// True when both schemas describe the same entity type.
    #[must_use]
    pub fn same_type(&'static self, other: &'static Self) -> bool {
        std::ptr::eq(self.put_schema(), other.put_schema())
    }

    ///
    /// patch_schema
    ///
    /// Derived patch shape, built once per entity type. The patch shape of a
    /// patch shape is itself.
    ///
    #[must_use]
    pub fn patch_schema(&'static self) -> &'static Self {
        if self.is_patch() {
            return self;
        }

        self.patch_shape
            .get_or_init(|| Box::new(derive::patch_shape(self)))
    }

    ///
    /// resolve_for_version
    ///
    /// Indices into `descriptors()` of the fields active at `version`, one
    /// per name, in wire emission order.
    ///
    #[must_use]
    pub fn resolve_for_version(&self, version: u32) -> Arc<[usize]> {
        if version == self.latest_version {
            return self.resolve_latest();
        }

        if let Some(hit) = self
            .by_version
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&version)
        {
            return Arc::clone(hit);
        }

        let resolved = self.compute_resolution(version);
        self.by_version
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(version)
            .or_insert(resolved)
            .clone()
    }

    #[must_use]
    pub fn resolve_latest(&self) -> Arc<[usize]> {
        Arc::clone(
            self.latest
                .get_or_init(|| self.compute_resolution(self.latest_version)),
        )
    }

    /// Descriptors active at `version`, in wire emission order.
    pub fn fields_at(&self, version: u32) -> impl Iterator<Item = &FieldDescriptor> {
        let resolved = self.resolve_for_version(version);
        (0..resolved.len()).map(move |i| &self.fields[resolved[i]])
    }

    /// Latest descriptor for `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.resolve_latest()
            .iter()
            .map(|&i| &self.fields[i])
            .find(|d| d.name == name)
    }

    /// Descriptor of `name` active at `version`.
    #[must_use]
    pub fn field_at(&self, name: &str, version: u32) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .rev()
            .find(|d| d.name == name && d.version <= version)
    }

    ///
    /// fallback_value
    ///
    /// Value for a required field that was not supplied: the field default,
    /// else the codec default. The identity field only takes an explicit
    /// default.
    ///
    #[must_use]
    pub fn fallback_value(&self, descriptor: &FieldDescriptor) -> Option<Value> {
        if self.identity_field() == Some(descriptor.name) {
            return descriptor.default.map(|factory| factory());
        }

        descriptor.default_value()
    }

    fn compute_resolution(&self, version: u32) -> Arc<[usize]> {
        let mut seen = HashSet::new();
        let mut resolved: Vec<usize> = (0..self.fields.len())
            .rev()
            .filter(|&i| {
                let d = &self.fields[i];
                d.version <= version && seen.insert(d.name)
            })
            .collect();

        resolved.sort_by(|&a, &b| wire_order(self.fields[a].wire_name, self.fields[b].wire_name));
        resolved.into()
    }
}

impl fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("name", &self.name)
            .field("flavor", &self.flavor)
            .field("latest_version", &self.latest_version)
            .field("identity", &self.identity)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Priority names first, then lexicographic.
fn wire_order(a: &str, b: &str) -> Ordering {
    let rank = |name: &str| {
        PRIORITY_FIELDS
            .iter()
            .position(|p| *p == name)
            .unwrap_or(PRIORITY_FIELDS.len())
    };

    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

///
/// install
///
/// Build a schema into a process-wide cell on first use. Registration
/// errors are programmer errors and abort.
///
pub fn install(
    cell: &'static OnceLock<EntitySchema>,
    build: impl FnOnce() -> Result<EntitySchema, SchemaError>,
) -> &'static EntitySchema {
    cell.get_or_init(|| match build() {
        Ok(schema) => schema,
        Err(err) => panic!("schema registration failed: {err}"),
    })
}

///
/// TESTS
///
