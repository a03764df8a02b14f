use crate::{
    codec::{Codec, scalar_to_tree},
    entity::Entity,
    error::EncodeError,
    patch::{KeyedPatchMap, ListChange, MapChange, OrderedPatchList, Position},
    schema::{EntitySchema, FieldDescriptor},
    value::Value,
    wire::{EncodeContext, PATCH_MARKER, REFERENCE_MARKER, TreeValue},
};
use serde_json::Map;
use std::collections::BTreeMap;

///
/// entity
///
/// Downgrade to `ctx.version`, then emit every resolved field by wire name
/// in resolution order. Patches lead with the marker and their id.
///
pub(super) fn entity(entity: &Entity, ctx: &mut EncodeContext) -> Result<TreeValue, EncodeError> {
    let schema = entity.schema();

    if entity.is_put()
        && let Some(id) = entity.identity()
        && !ctx.first_emission(schema.name(), &id)
    {
        let id = match schema.identity_field() {
            Some(name) => downgrade_value(schema, name, id, ctx.version()),
            None => id,
        };
        return reference(&id);
    }

    let shadow = downgrade(schema, entity, ctx.version());
    let mut out = Map::new();

    if entity.is_patch() {
        out.insert(PATCH_MARKER.to_string(), TreeValue::Bool(true));

        let put = schema.put_schema();
        if let (Some(id), Some(name)) = (entity.id(), put.identity_field())
            && let Some(descriptor) = put.field_at(name, ctx.version())
        {
            let id = downgrade_value(put, name, id.clone(), ctx.version());
            let node = value(&id, &descriptor.codec, ctx).map_err(|err| err.with_field(name))?;
            out.insert(descriptor.wire_name.to_string(), node);
        }
    }

    for descriptor in schema.fields_at(ctx.version()) {
        // null on a non-nullable field counts as missing
        let current = shadow
            .get(descriptor.name)
            .filter(|current| descriptor.nullable || !current.is_null());

        match current {
            None if descriptor.optional => {}
            None => {
                return Err(EncodeError::MissingValue {
                    entity: schema.name(),
                    field: descriptor.name,
                });
            }
            Some(current) => {
                if skips(entity, descriptor, current, ctx) {
                    continue;
                }

                let node = value(current, &descriptor.codec, ctx)
                    .map_err(|err| err.with_field(descriptor.name))?;
                out.insert(descriptor.wire_name.to_string(), node);
            }
        }
    }

    Ok(TreeValue::Object(out))
}

// patches always spell out what they change
fn skips(entity: &Entity, descriptor: &FieldDescriptor, current: &Value, ctx: &EncodeContext) -> bool {
    ctx.skips_defaults() && entity.is_put() && descriptor.is_default(current)
}

/// Field values rewritten down to `target`, newest migration first.
fn downgrade(
    schema: &EntitySchema,
    entity: &Entity,
    target: u32,
) -> BTreeMap<&'static str, Value> {
    let mut shadow: BTreeMap<&'static str, Value> = entity
        .values()
        .map(|(name, value)| (name, value.clone()))
        .collect();

    for descriptor in schema.descriptors().iter().rev() {
        if descriptor.version <= target {
            break;
        }

        if let Some(migration) = descriptor.downgrade
            && let Some(current) = shadow.get_mut(descriptor.name)
            && !current.is_null()
        {
            *current = migration(current);
        }
    }

    shadow
}

fn downgrade_value(schema: &EntitySchema, name: &str, mut value: Value, target: u32) -> Value {
    for descriptor in schema.descriptors().iter().rev() {
        if descriptor.version <= target {
            break;
        }
        if descriptor.name == name
            && let Some(migration) = descriptor.downgrade
            && !value.is_null()
        {
            value = migration(&value);
        }
    }

    value
}

fn value(current: &Value, codec: &Codec, ctx: &mut EncodeContext) -> Result<TreeValue, EncodeError> {
    match (codec, current) {
        (_, Value::Null) => Ok(TreeValue::Null),

        (Codec::Scalar(scalar), _) => scalar.encode(current).map_err(|err| EncodeError::Codec {
            codec: scalar.name(),
            message: err.message,
        }),

        (Codec::Entity(_), Value::Entity(nested)) if nested.is_put() => entity(nested, ctx),
        (Codec::PutOrPatch(_), Value::Entity(nested)) => entity(nested, ctx),

        (Codec::List(inner) | Codec::PatchableList(inner), Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| value(item, inner, ctx).map_err(|err| err.with_index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(TreeValue::Array),
        (Codec::PatchableList(inner), Value::ListPatch(list)) => list_patch(list, inner, ctx),

        (Codec::Map(inner) | Codec::PatchableMap(inner), Value::Map(map)) => {
            let mut out = Map::new();
            for (key, item) in map {
                let node = value(item, inner, ctx).map_err(|err| err.with_field(key))?;
                out.insert(key.clone(), node);
            }
            Ok(TreeValue::Object(out))
        }
        (Codec::PatchableMap(inner), Value::MapPatch(changes)) => map_patch(changes, inner, ctx),

        _ => Err(EncodeError::ShapeMismatch {
            expected: codec.label(),
            actual: current.kind(),
        }),
    }
}

fn list_patch(
    list: &OrderedPatchList,
    inner: &Codec,
    ctx: &mut EncodeContext,
) -> Result<TreeValue, EncodeError> {
    let mut changes = Vec::with_capacity(list.len());

    for (i, change) in list.changes().iter().enumerate() {
        let mut out = Map::new();
        match change {
            ListChange::Put { value: item, position } => {
                let node = value(item, inner, ctx).map_err(|err| err.with_index(i))?;
                out.insert("put".to_string(), node);
                anchor(&mut out, position)?;
            }
            ListChange::Move { id, position } => {
                out.insert("move".to_string(), identifier(id)?);
                anchor(&mut out, position)?;
            }
            ListChange::Patch { patch } => {
                let node = entity(patch, ctx).map_err(|err| err.with_index(i))?;
                out.insert("patch".to_string(), node);
            }
            ListChange::Delete { id } => {
                out.insert("delete".to_string(), identifier(id)?);
            }
        }
        changes.push(TreeValue::Object(out));
    }

    Ok(patch_envelope(TreeValue::Array(changes)))
}

fn map_patch(
    changes: &KeyedPatchMap,
    inner: &Codec,
    ctx: &mut EncodeContext,
) -> Result<TreeValue, EncodeError> {
    let mut out = Map::new();

    for (key, change) in changes.changes() {
        let node = match change {
            MapChange::Delete => TreeValue::Null,
            MapChange::Upsert(item) => {
                let codec = match inner {
                    Codec::Entity(schema) => Codec::PutOrPatch(*schema),
                    other => other.clone(),
                };
                value(item, &codec, ctx).map_err(|err| err.with_field(key))?
            }
        };
        out.insert(key.to_string(), node);
    }

    Ok(patch_envelope(TreeValue::Object(out)))
}

fn patch_envelope(changes: TreeValue) -> TreeValue {
    let mut out = Map::new();
    out.insert(PATCH_MARKER.to_string(), TreeValue::Bool(true));
    out.insert("changes".to_string(), changes);

    TreeValue::Object(out)
}

// absent = end, null = start
fn anchor(out: &mut Map<String, TreeValue>, position: &Position) -> Result<(), EncodeError> {
    match position {
        Position::End => {}
        Position::Start => {
            out.insert("afterId".to_string(), TreeValue::Null);
        }
        Position::After(id) => {
            out.insert("afterId".to_string(), identifier(id)?);
        }
    }

    Ok(())
}

fn identifier(id: &Value) -> Result<TreeValue, EncodeError> {
    match id {
        Value::Bool(_) | Value::Int(_) | Value::Text(_) => scalar_to_tree(id)
            .map_err(|_| EncodeError::ShapeMismatch {
                expected: "identifier",
                actual: id.kind(),
            }),
        other => Err(EncodeError::ShapeMismatch {
            expected: "identifier",
            actual: other.kind(),
        }),
    }
}

fn reference(id: &Value) -> Result<TreeValue, EncodeError> {
    let mut out = Map::new();
    out.insert(REFERENCE_MARKER.to_string(), identifier(id)?);

    Ok(TreeValue::Object(out))
}
