use crate::{
    entity::Entity,
    obs::{self, PatchEvent},
    patch::{PatchError, reconcile},
    schema::Flavor,
    value::Value,
};
use std::collections::BTreeMap;

///
/// MapChange
///

#[derive(Clone, Debug, PartialEq)]
pub enum MapChange {
    Upsert(Value),
    Delete,
}

///
/// KeyedPatchMap
///
/// Per-key changes to a string-keyed map. Values are either replacements
/// or patches reconciled against the current entry.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyedPatchMap {
    changes: BTreeMap<String, MapChange>,
}

impl KeyedPatchMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            changes: BTreeMap::new(),
        }
    }

    /// Upsert `value` at `key`; `Value::Null` records a delete.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let change = match value.into() {
            Value::Null => MapChange::Delete,
            value => MapChange::Upsert(value),
        };
        self.changes.insert(key.into(), change);
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.changes.insert(key.into(), MapChange::Delete);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MapChange> {
        self.changes.get(key)
    }

    pub fn changes(&self) -> impl Iterator<Item = (&str, &MapChange)> {
        self.changes.iter().map(|(key, change)| (key.as_str(), change))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    ///
    /// apply_to
    ///
    /// Apply every change to a copy of `map`. Deleting a missing key is a
    /// no-op; patching a missing key synthesizes the entry or fails.
    ///
    pub fn apply_to(
        &self,
        map: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, PatchError> {
        let mut out = map.clone();

        for (key, change) in &self.changes {
            match change {
                MapChange::Delete => {
                    out.remove(key);
                }
                MapChange::Upsert(Value::Entity(patch))
                    if patch.is_patch() && matches!(out.get(key), None | Some(Value::Null)) =>
                {
                    let entity = Entity::synthesize(patch).map_err(|err| err.with_field(key))?;
                    out.insert(key.clone(), Value::from(entity));
                }
                MapChange::Upsert(value) => {
                    let next = reconcile(out.get(key), value, None, Flavor::Put)
                        .map_err(|err| err.with_field(key))?;
                    match next {
                        Some(next) => out.insert(key.clone(), next),
                        None => out.remove(key),
                    };
                }
            }
        }

        obs::record(PatchEvent::MapApplied {
            changes: self.changes.len(),
        });

        Ok(out)
    }

    ///
    /// patch
    ///
    /// Compose two change sets. A later delete wins; later upserts stack on
    /// earlier ones; an upsert after a delete starts from nothing.
    ///
    pub fn patch(&self, other: &Self) -> Result<Self, PatchError> {
        let mut merged = self.clone();

        for (key, change) in &other.changes {
            let next = match (merged.changes.get(key), change) {
                (_, MapChange::Delete) => MapChange::Delete,
                (Some(MapChange::Upsert(pending)), MapChange::Upsert(value)) => {
                    match reconcile(Some(pending), value, None, Flavor::Patch)
                        .map_err(|err| err.with_field(key))?
                    {
                        Some(value) => MapChange::Upsert(value),
                        None => MapChange::Delete,
                    }
                }
                (Some(MapChange::Delete), MapChange::Upsert(Value::Entity(patch)))
                    if patch.is_patch() =>
                {
                    let entity = Entity::synthesize(patch).map_err(|err| err.with_field(key))?;
                    MapChange::Upsert(Value::from(entity))
                }
                (_, MapChange::Upsert(value)) => MapChange::Upsert(value.clone()),
            };

            merged.changes.insert(key.clone(), next);
        }

        Ok(merged)
    }
}

///
/// TESTS
///
