use crate::{
    codec::Codec,
    error::CreateError,
    patch::{KeyedPatchMap, OrderedPatchList, PatchError, reconcile},
    schema::{EntitySchema, Flavor, Identity},
    value::Value,
};
use std::{collections::BTreeMap, fmt};

///
/// Entity
///
/// A record conforming to an `EntitySchema`. Put entities hold concrete
/// values; patch entities hold only the fields they change, plus an
/// optional id addressing the element they apply to.
///
/// Entities are values: `patch` returns a new entity and leaves both
/// inputs untouched.
///

#[derive(Clone)]
pub struct Entity {
    schema: &'static EntitySchema,
    values: BTreeMap<&'static str, Value>,
    id: Option<Value>,
}

impl Entity {
    pub(crate) const fn empty(schema: &'static EntitySchema) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
            id: None,
        }
    }

    /// Put entity holding every field default factory.
    pub(crate) fn with_defaults(schema: &'static EntitySchema) -> Self {
        let mut entity = Self::empty(schema);
        for descriptor in schema.fields_at(schema.latest_version()) {
            if let Some(factory) = descriptor.default {
                entity.values.insert(descriptor.name, factory());
            }
        }

        entity
    }

    ///
    /// create
    ///
    /// Validating constructor for put entities. Unknown names are ignored;
    /// missing fields fall back to their defaults, nullable ones to null.
    ///
    pub fn create<I>(schema: &'static EntitySchema, values: I) -> Result<Self, CreateError>
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        if schema.is_patch() {
            return Self::new_patch(schema, values);
        }

        let mut entity = Self::with_defaults(schema);
        for (name, value) in values {
            if let Some(descriptor) = schema.field(name) {
                entity.values.insert(descriptor.name, value);
            }
        }

        for descriptor in schema.fields_at(schema.latest_version()) {
            match entity.values.get(descriptor.name) {
                Some(Value::Null) if !descriptor.nullable => {
                    return Err(CreateError::NullNotAllowed {
                        entity: schema.name(),
                        field: descriptor.name,
                    });
                }
                Some(_) => {}
                None if descriptor.optional => {}
                None if descriptor.nullable => {
                    entity.values.insert(descriptor.name, Value::Null);
                }
                None => {
                    let default =
                        schema
                            .fallback_value(descriptor)
                            .ok_or(CreateError::MissingRequired {
                                entity: schema.name(),
                                field: descriptor.name,
                            })?;
                    entity.values.insert(descriptor.name, default);
                }
            }
        }

        Ok(entity)
    }

    ///
    /// new_patch
    ///
    /// Patch of `schema`'s entity type. No defaults; a value for the
    /// identity field becomes the patch's addressing id. Names must be
    /// fields of the schema, and null only lands on nullable fields.
    ///
    pub fn new_patch<I>(schema: &'static EntitySchema, values: I) -> Result<Self, CreateError>
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let mut patch = Self::empty(schema.patch_schema());
        for (name, value) in values {
            patch.set(name, value)?;
        }

        Ok(patch)
    }

    /// Set the identity: the id slot of a patch, the identity field of a put.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        let id = id.into();
        match (self.schema.flavor(), self.schema.identity_field()) {
            (Flavor::Patch, _) => self.id = Some(id),
            (Flavor::Put, Some(name)) => {
                self.values.insert(name, id);
            }
            (Flavor::Put, None) => {}
        }

        self
    }

    #[must_use]
    pub const fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    #[must_use]
    pub const fn flavor(&self) -> Flavor {
        self.schema.flavor()
    }

    #[must_use]
    pub const fn is_patch(&self) -> bool {
        self.schema.is_patch()
    }

    #[must_use]
    pub const fn is_put(&self) -> bool {
        !self.schema.is_patch()
    }

    /// Addressing id carried by a patch.
    #[must_use]
    pub const fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn values(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }

    /// Set a field by name. On a patch the identity field sets the id slot.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), CreateError> {
        let value = value.into();
        if self.is_patch() && self.schema.identity_field() == Some(name) {
            self.id = Some(value);
            return Ok(());
        }

        let descriptor = self.schema.field(name).ok_or_else(|| CreateError::UnknownField {
            entity: self.schema.name(),
            field: name.to_string(),
        })?;
        if value.is_null() && !descriptor.nullable {
            return Err(CreateError::NullNotAllowed {
                entity: self.schema.name(),
                field: descriptor.name,
            });
        }
        self.values.insert(descriptor.name, value);

        Ok(())
    }

    /// Builder form of `set`.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, CreateError> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    ///
    /// list_patch
    ///
    /// Ordered patch list held by a patch entity at `name`, created on
    /// first use. `None` when the field does not take list patches or
    /// already holds a replacement list.
    ///
    pub fn list_patch(&mut self, name: &str) -> Option<&mut OrderedPatchList> {
        let descriptor = self.schema.field(name)?;
        if !self.is_patch() || !matches!(descriptor.codec, Codec::PatchableList(_)) {
            return None;
        }

        match self
            .values
            .entry(descriptor.name)
            .or_insert_with(|| Value::ListPatch(OrderedPatchList::new()))
        {
            Value::ListPatch(list) => Some(list),
            _ => None,
        }
    }

    /// Keyed patch map held by a patch entity at `name`; see `list_patch`.
    pub fn map_patch(&mut self, name: &str) -> Option<&mut KeyedPatchMap> {
        let descriptor = self.schema.field(name)?;
        if !self.is_patch() || !matches!(descriptor.codec, Codec::PatchableMap(_)) {
            return None;
        }

        match self
            .values
            .entry(descriptor.name)
            .or_insert_with(|| Value::MapPatch(KeyedPatchMap::new()))
        {
            Value::MapPatch(map) => Some(map),
            _ => None,
        }
    }

    ///
    /// identity
    ///
    /// Addressing key of this entity. Patches prefer their id slot.
    ///
    #[must_use]
    pub fn identity(&self) -> Option<Value> {
        if let Some(id) = &self.id {
            return Some(id.clone());
        }

        match self.schema.identity()? {
            Identity::Field(name) => self.values.get(name).filter(|v| !v.is_null()).cloned(),
            Identity::Accessor(accessor) => accessor(self),
        }
    }

    ///
    /// patch
    ///
    /// Apply a patch of the same entity type. On a put receiver the result
    /// is a put; on a patch receiver the two patches are stacked.
    ///
    pub fn patch(&self, patch: &Self) -> Result<Self, PatchError> {
        if patch.is_put() {
            return Err(PatchError::NotAPatch {
                entity: patch.schema.name(),
            });
        }
        if !self.schema.same_type(patch.schema) {
            return Err(PatchError::SchemaMismatch {
                expected: self.schema.name(),
                actual: patch.schema.name(),
            });
        }

        let receiver = self.flavor();
        let mut next = self.clone();
        if self.is_patch() && next.id.is_none() {
            next.id.clone_from(&patch.id);
        }

        for (&name, payload) in &patch.values {
            let descriptor = self.schema.field(name);
            let default = descriptor.and_then(|d| d.default);
            let resolved = reconcile(self.values.get(name), payload, default, receiver)
                .map_err(|err| err.with_field(name))?;

            match resolved {
                // null clears nullable fields and unsets optional ones
                Some(Value::Null)
                    if receiver == Flavor::Put && descriptor.is_some_and(|d| !d.nullable) =>
                {
                    if descriptor.is_some_and(|d| d.optional) {
                        next.values.remove(name);
                    } else {
                        return Err(PatchError::NullNotAllowed {
                            entity: self.schema.name(),
                            field: name,
                        }
                        .with_field(name));
                    }
                }
                Some(value) => {
                    next.values.insert(name, value);
                }
                None => {
                    next.values.remove(name);
                }
            }
        }

        Ok(next)
    }

    /// Apply `payload` if it is a patch; a put replaces `self` outright.
    pub fn patch_or_put(&self, payload: &Self) -> Result<Self, PatchError> {
        if payload.is_put() {
            return Ok(payload.clone());
        }

        self.patch(payload)
    }

    ///
    /// synthesize
    ///
    /// Build a put entity from a patch alone: patch values first, then
    /// field defaults, codec defaults, absence for optional fields, and
    /// null for nullable ones. Identifiable types need the patch to carry
    /// an identity.
    ///
    pub fn synthesize(patch: &Self) -> Result<Self, PatchError> {
        let schema = patch.schema.put_schema();
        let mut base = Self::empty(schema);

        if schema.is_identifiable() {
            let id = patch.identity().ok_or_else(|| {
                PatchError::cannot_patch_absent(schema.name(), "the patch carries no identity")
            })?;
            if let Some(name) = schema.identity_field() {
                base.values.insert(name, id);
            }
        }

        for descriptor in schema.fields_at(schema.latest_version()) {
            if base.values.contains_key(descriptor.name) || patch.values.contains_key(descriptor.name)
            {
                continue;
            }

            if let Some(default) = descriptor.default_value() {
                base.values.insert(descriptor.name, default);
            } else if descriptor.optional {
                continue;
            } else if descriptor.nullable {
                base.values.insert(descriptor.name, Value::Null);
            } else {
                return Err(PatchError::cannot_patch_absent(
                    schema.name(),
                    format!("field '{}' has no default", descriptor.name),
                ));
            }
        }

        base.patch(patch)
    }

    ///
    /// merge_from
    ///
    /// Fold `other` into `self` in place. Entities with equal identity are
    /// merged field by field, list elements are matched by identity and map
    /// entries by key; everything else is replaced.
    ///
    pub fn merge_from(&mut self, other: &Self) {
        for (&name, incoming) in &other.values {
            match self.values.get_mut(name) {
                Some(existing) => merge_value(existing, incoming),
                None => {
                    self.values.insert(name, incoming.clone());
                }
            }
        }
    }

    pub(crate) fn insert(&mut self, name: &'static str, value: Value) {
        self.values.insert(name, value);
    }

    pub(crate) fn values_mut(&mut self) -> &mut BTreeMap<&'static str, Value> {
        &mut self.values
    }

    pub(crate) fn set_id(&mut self, id: Option<Value>) {
        self.id = id;
    }
}

fn merge_value(existing: &mut Value, incoming: &Value) {
    match (existing, incoming) {
        (Value::Entity(current), Value::Entity(next))
            if current.schema().same_type(next.schema())
                && current.identity() == next.identity() =>
        {
            current.merge_from(next);
        }
        (Value::List(current), Value::List(next)) => {
            let mut pool = std::mem::take(current);
            *current = next
                .iter()
                .map(|item| {
                    let matched = match item {
                        Value::Entity(_) => item.identity().and_then(|id| {
                            pool.iter()
                                .position(|kept| kept.identity().as_ref() == Some(&id))
                        }),
                        _ => None,
                    };

                    match matched {
                        Some(index) => {
                            let mut kept = pool.swap_remove(index);
                            merge_value(&mut kept, item);
                            kept
                        }
                        None => item.clone(),
                    }
                })
                .collect();
        }
        (Value::Map(current), Value::Map(next)) => {
            current.retain(|key, _| next.contains_key(key));
            for (key, value) in next {
                match current.get_mut(key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        current.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.values == other.values && self.id == other.id
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.schema.name());
        if self.is_patch() {
            debug.field("_isPatch", &true);
        }
        if let Some(id) = &self.id {
            debug.field("id", id);
        }
        for (name, value) in &self.values {
            debug.field(name, value);
        }

        debug.finish()
    }
}

///
/// TESTS
///
