use crate::{
    codec::Codec,
    entity::Entity,
    error::{DecodeError, DecodeErrors},
    patch::{KeyedPatchMap, ListChange, OrderedPatchList, Position},
    schema::EntitySchema,
    value::Value,
    wire::{Cursor, DecodeContext, PATCH_MARKER, REFERENCE_MARKER, TreeValue},
};
use std::collections::BTreeMap;

static ABSENT: TreeValue = TreeValue::Null;

pub(super) fn is_patch_node(node: &TreeValue) -> bool {
    node.get(PATCH_MARKER).and_then(TreeValue::as_bool) == Some(true)
}

///
/// entity
///
/// Read every field resolved at `ctx.version`, collecting independent
/// failures, then run the upgrade chain over the values read from the wire.
///
pub(super) fn entity(
    schema: &'static EntitySchema,
    cursor: &Cursor<'_>,
    ctx: &mut DecodeContext,
) -> Result<Entity, DecodeErrors> {
    cursor.object()?;

    if let Some(node) = cursor.field(REFERENCE_MARKER)
        && !schema.is_patch()
    {
        return reference(schema, &node, ctx).map_err(DecodeErrors::from);
    }

    let version = ctx.version();
    let mut entity = if schema.is_patch() {
        Entity::empty(schema)
    } else {
        Entity::with_defaults(schema)
    };
    let mut errors = DecodeErrors::new();
    let mut from_wire = Vec::new();

    if schema.is_patch() {
        let put = schema.put_schema();
        if let Some(name) = put.identity_field()
            && let Some(descriptor) = put.field_at(name, version)
            && let Some(child) = cursor.field(descriptor.wire_name)
            && !child.node().is_null()
        {
            match value(&descriptor.codec, &child, ctx) {
                Ok(id) => entity.set_id(Some(upgrade_value(put, name, id, version))),
                Err(err) => errors.extend(err),
            }
        }
    }

    for descriptor in schema.fields_at(version) {
        let present = cursor.field(descriptor.wire_name);

        if let Some(child) = &present
            && !child.node().is_null()
        {
            match value(&descriptor.codec, child, ctx) {
                Ok(decoded) => {
                    entity.insert(descriptor.name, decoded);
                    from_wire.push(descriptor.name);
                }
                Err(err) => errors.extend(err),
            }
            continue;
        }

        let present_null = present.is_some();
        if descriptor.nullable {
            if present_null || !descriptor.optional {
                entity.insert(descriptor.name, Value::Null);
            }
        } else if descriptor.optional {
            // absent or null: left at the constructor default
        } else if !present_null && let Some(fallback) = schema.fallback_value(descriptor) {
            entity.insert(descriptor.name, fallback);
            from_wire.push(descriptor.name);
        } else {
            let field = cursor.child(&ABSENT, descriptor.wire_name);
            errors.push(field.error(
                DecodeError::MISSING_FIELD,
                format!(
                    "Field {} is expected at {}",
                    descriptor.wire_name,
                    cursor.display_path()
                ),
            ));
        }
    }

    let mut entity = errors.into_result(entity)?;
    upgrade(schema, &mut entity, &from_wire, version);

    if entity.is_put() {
        ctx.remember(&entity);
    }

    Ok(entity)
}

/// Ascending over descriptors introduced after the wire version.
fn upgrade(schema: &EntitySchema, entity: &mut Entity, from_wire: &[&'static str], version: u32) {
    let values = entity.values_mut();

    for descriptor in schema.descriptors() {
        if descriptor.version <= version || !from_wire.contains(&descriptor.name) {
            continue;
        }

        if let Some(migration) = descriptor.upgrade
            && let Some(current) = values.get_mut(descriptor.name)
            && !current.is_null()
        {
            *current = migration(current);
        }
    }
}

fn upgrade_value(schema: &EntitySchema, name: &str, mut value: Value, version: u32) -> Value {
    for descriptor in schema.descriptors() {
        if descriptor.version > version
            && descriptor.name == name
            && let Some(migration) = descriptor.upgrade
            && !value.is_null()
        {
            value = migration(&value);
        }
    }

    value
}

fn value(codec: &Codec, cursor: &Cursor<'_>, ctx: &mut DecodeContext) -> Result<Value, DecodeErrors> {
    let node = cursor.node();
    if node.is_null() {
        return Ok(Value::Null);
    }

    match codec {
        Codec::Scalar(scalar) => scalar
            .decode(node)
            .map_err(|err| cursor.error(err.code, err.message).into()),
        Codec::Entity(schema) => entity(schema(), cursor, ctx).map(Value::from),
        Codec::PutOrPatch(schema) => {
            let schema = if is_patch_node(node) {
                schema().patch_schema()
            } else {
                schema()
            };
            entity(schema, cursor, ctx).map(Value::from)
        }
        Codec::List(inner) => list(inner, cursor, ctx).map(Value::List),
        Codec::PatchableList(inner) if is_patch_node(node) => {
            list_patch(inner, cursor, ctx).map(Value::ListPatch)
        }
        Codec::PatchableList(inner) => list(inner, cursor, ctx).map(Value::List),
        Codec::Map(inner) => map(inner, cursor, ctx).map(Value::Map),
        Codec::PatchableMap(inner) if is_patch_node(node) => {
            map_patch(inner, cursor, ctx).map(Value::MapPatch)
        }
        Codec::PatchableMap(inner) => map(inner, cursor, ctx).map(Value::Map),
    }
}

fn list(
    inner: &Codec,
    cursor: &Cursor<'_>,
    ctx: &mut DecodeContext,
) -> Result<Vec<Value>, DecodeErrors> {
    let items = cursor.array()?;
    let mut out = Vec::with_capacity(items.len());
    let mut errors = DecodeErrors::new();

    for (i, node) in items.iter().enumerate() {
        match value(inner, &cursor.child(node, &i.to_string()), ctx) {
            Ok(item) => out.push(item),
            Err(err) => errors.extend(err),
        }
    }

    errors.into_result(out)
}

fn map(
    inner: &Codec,
    cursor: &Cursor<'_>,
    ctx: &mut DecodeContext,
) -> Result<BTreeMap<String, Value>, DecodeErrors> {
    let entries = cursor.object()?;
    let mut out = BTreeMap::new();
    let mut errors = DecodeErrors::new();

    for (key, node) in entries {
        match value(inner, &cursor.child(node, key), ctx) {
            Ok(item) => {
                out.insert(key.clone(), item);
            }
            Err(err) => errors.extend(err),
        }
    }

    errors.into_result(out)
}

fn changes<'a>(cursor: &Cursor<'a>) -> Result<Cursor<'a>, DecodeError> {
    cursor.object()?;
    cursor.field("changes").ok_or_else(|| {
        cursor.child(&ABSENT, "changes").error(
            DecodeError::MISSING_FIELD,
            format!("Field changes is expected at {}", cursor.display_path()),
        )
    })
}

fn list_patch(
    inner: &Codec,
    cursor: &Cursor<'_>,
    ctx: &mut DecodeContext,
) -> Result<OrderedPatchList, DecodeErrors> {
    let changes = changes(cursor)?;
    let entries = changes.array()?;
    let mut list = OrderedPatchList::new();
    let mut errors = DecodeErrors::new();

    for (i, node) in entries.iter().enumerate() {
        match list_change(inner, &changes.child(node, &i.to_string()), ctx) {
            Ok(change) => list.push_raw(change),
            Err(err) => errors.extend(err),
        }
    }

    errors.into_result(list)
}

fn list_change(
    inner: &Codec,
    item: &Cursor<'_>,
    ctx: &mut DecodeContext,
) -> Result<ListChange, DecodeErrors> {
    item.object()?;

    if let Some(put) = item.field("put") {
        let value = value(inner, &put, ctx)?;
        return Ok(ListChange::Put {
            value,
            position: position(item)?,
        });
    }

    if let Some(id) = item.field("move") {
        return Ok(ListChange::Move {
            id: identifier(&id)?,
            position: position(item)?,
        });
    }

    if let Some(patch) = item.field("patch") {
        let Some(schema) = inner.element_schema() else {
            return Err(patch.invalid("Only entity elements can be patched").into());
        };
        return entity(schema().patch_schema(), &patch, ctx).map(|patch| ListChange::Patch { patch });
    }

    if let Some(id) = item.field("delete") {
        return Ok(ListChange::Delete {
            id: identifier(&id)?,
        });
    }

    Err(item
        .invalid(format!(
            "Expected a put, move, patch or delete at {}",
            item.display_path()
        ))
        .into())
}

// absent = end, null = start
fn position(item: &Cursor<'_>) -> Result<Position, DecodeError> {
    match item.field("afterId") {
        None => Ok(Position::End),
        Some(anchor) if anchor.node().is_null() => Ok(Position::Start),
        Some(anchor) => identifier(&anchor).map(Position::After),
    }
}

fn map_patch(
    inner: &Codec,
    cursor: &Cursor<'_>,
    ctx: &mut DecodeContext,
) -> Result<KeyedPatchMap, DecodeErrors> {
    let changes = changes(cursor)?;
    let entries = changes.object()?;
    let codec = match inner {
        Codec::Entity(schema) => Codec::PutOrPatch(*schema),
        other => other.clone(),
    };
    let mut out = KeyedPatchMap::new();
    let mut errors = DecodeErrors::new();

    for (key, node) in entries {
        if node.is_null() {
            out.delete(key.clone());
            continue;
        }

        match value(&codec, &changes.child(node, key), ctx) {
            Ok(item) => out.set(key.clone(), item),
            Err(err) => errors.extend(err),
        }
    }

    errors.into_result(out)
}

fn identifier(cursor: &Cursor<'_>) -> Result<Value, DecodeError> {
    match cursor.node() {
        TreeValue::String(text) => Ok(Value::Text(text.clone())),
        TreeValue::Bool(flag) => Ok(Value::Bool(*flag)),
        TreeValue::Number(number) => number
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| cursor.invalid("Expected an identifier")),
        _ => Err(cursor.invalid("Expected an identifier")),
    }
}

fn reference(
    schema: &'static EntitySchema,
    cursor: &Cursor<'_>,
    ctx: &DecodeContext,
) -> Result<Entity, DecodeError> {
    let id = identifier(cursor)?;
    let id = match schema.identity_field() {
        Some(name) => upgrade_value(schema, name, id, ctx.version()),
        None => id,
    };

    ctx.lookup(schema.name(), &id)
        .cloned()
        .ok_or_else(|| {
            cursor.error(
                DecodeError::UNKNOWN_REFERENCE,
                format!("No {} with id {id} was decoded earlier", schema.name()),
            )
        })
}
