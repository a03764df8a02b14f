use crate::{
    codec::{Codec, INTEGER, TEXT},
    entity::Entity,
    patch::{ListChange, OrderedPatchList, Position},
    schema::{EntitySchema, FieldDescriptor, SchemaBuilder, install},
    value::Value,
};
use std::{collections::BTreeMap, sync::OnceLock};

///
/// Dog
///
/// Identifiable, self-referencing, and versioned: `id` switched from an
/// integer to a `DOG<n>` string at version 2, and `name` moved to the
/// `breed` wire key at the same time.
///

pub(crate) fn dog() -> &'static EntitySchema {
    static SCHEMA: OnceLock<EntitySchema> = OnceLock::new();

    install(&SCHEMA, || {
        SchemaBuilder::new("Dog")
            .register(FieldDescriptor::scalar("id", &INTEGER))?
            .register(
                FieldDescriptor::scalar("id", &TEXT)
                    .since(2)
                    .upgrade(dog_id_up)
                    .downgrade(dog_id_down),
            )?
            .register(FieldDescriptor::scalar("name", &TEXT))?
            .register(FieldDescriptor::scalar("name", &TEXT).wire("breed").since(2))?
            .register(FieldDescriptor::entity("friend", friend).nullable())?
            .register(
                FieldDescriptor::new("friends", Codec::list(Codec::Entity(dog)))
                    .default_with(empty_list),
            )?
            .identity_field("id")
            .build()
    })
}

fn dog_id_up(value: &Value) -> Value {
    match value {
        Value::Int(n) => Value::Text(format!("DOG{n}")),
        other => other.clone(),
    }
}

fn dog_id_down(value: &Value) -> Value {
    value
        .as_text()
        .and_then(|text| text.strip_prefix("DOG"))
        .and_then(|digits| digits.parse::<i64>().ok())
        .map_or_else(|| value.clone(), Value::Int)
}

///
/// Friend
///
/// Anonymous (no identity) entity with a defaulted text field.
///

pub(crate) fn friend() -> &'static EntitySchema {
    static SCHEMA: OnceLock<EntitySchema> = OnceLock::new();

    install(&SCHEMA, || {
        SchemaBuilder::new("Friend")
            .register(FieldDescriptor::scalar("name", &TEXT))?
            .register(FieldDescriptor::scalar("age", &INTEGER).optional())?
            .build()
    })
}

///
/// Key
///

pub(crate) fn key() -> &'static EntitySchema {
    static SCHEMA: OnceLock<EntitySchema> = OnceLock::new();

    install(&SCHEMA, || {
        SchemaBuilder::new("Key")
            .register(FieldDescriptor::scalar("name", &TEXT))?
            .register(FieldDescriptor::scalar("num", &INTEGER).optional())?
            .build()
    })
}

///
/// Keychain
///
/// Keyed maps of anonymous and identifiable entities, plus a scalar list.
///

pub(crate) fn keychain() -> &'static EntitySchema {
    static SCHEMA: OnceLock<EntitySchema> = OnceLock::new();

    install(&SCHEMA, || {
        SchemaBuilder::new("Keychain")
            .register(
                FieldDescriptor::new("keys", Codec::map(Codec::Entity(key)))
                    .default_with(empty_map),
            )?
            .register(
                FieldDescriptor::new("dogs", Codec::map(Codec::Entity(dog)))
                    .default_with(empty_map),
            )?
            .register(
                FieldDescriptor::new("tags", Codec::list(Codec::Scalar(&TEXT)))
                    .default_with(empty_list),
            )?
            .build()
    })
}

///
/// Pack
///
/// List of anonymous entities; its patch form is a replacement list.
///

pub(crate) fn pack() -> &'static EntitySchema {
    static SCHEMA: OnceLock<EntitySchema> = OnceLock::new();

    install(&SCHEMA, || {
        SchemaBuilder::new("Pack")
            .register(
                FieldDescriptor::new("friends", Codec::list(Codec::Entity(friend)))
                    .default_with(empty_list),
            )?
            .register(
                FieldDescriptor::entity("leader", friend)
                    .optional()
                    .default_with(default_leader),
            )?
            .build()
    })
}

///
/// Collar
///
/// Identity supplied by an accessor rather than a designated field.
///

pub(crate) fn collar() -> &'static EntitySchema {
    static SCHEMA: OnceLock<EntitySchema> = OnceLock::new();

    install(&SCHEMA, || {
        SchemaBuilder::new("Collar")
            .register(FieldDescriptor::scalar("serial", &TEXT))?
            .register(FieldDescriptor::scalar("color", &TEXT).optional())?
            .identity_with(|entity| entity.get("serial").cloned())
            .build()
    })
}

///
/// Kennel
///
/// Tags went from lowercase to uppercase at version 2. Tag list patches
/// carry tags as ids and anchors, so they migrate with their own functions.
///

pub(crate) fn kennel() -> &'static EntitySchema {
    static SCHEMA: OnceLock<EntitySchema> = OnceLock::new();

    install(&SCHEMA, || {
        SchemaBuilder::new("Kennel")
            .register(FieldDescriptor::scalar("name", &TEXT).optional())?
            .register(
                FieldDescriptor::new("tags", Codec::list(Codec::Scalar(&TEXT)))
                    .default_with(empty_list),
            )?
            .register(
                FieldDescriptor::new("tags", Codec::list(Codec::Scalar(&TEXT)))
                    .since(2)
                    .default_with(empty_list)
                    .upgrade(|tags| map_tags(tags, str::to_uppercase))
                    .downgrade(|tags| map_tags(tags, str::to_lowercase))
                    .upgrade_patch(|tags| map_tag_patch(tags, str::to_uppercase))
                    .downgrade_patch(|tags| map_tag_patch(tags, str::to_lowercase)),
            )?
            .build()
    })
}

fn map_tag(tag: &Value, f: fn(&str) -> String) -> Value {
    tag.as_text().map_or_else(|| tag.clone(), |text| Value::Text(f(text)))
}

fn map_tags(tags: &Value, f: fn(&str) -> String) -> Value {
    match tags {
        Value::List(items) => Value::List(items.iter().map(|tag| map_tag(tag, f)).collect()),
        other => other.clone(),
    }
}

// a patch slot may also hold a replacement list
fn map_tag_patch(tags: &Value, f: fn(&str) -> String) -> Value {
    let Value::ListPatch(list) = tags else {
        return map_tags(tags, f);
    };

    let position = |position: &Position| match position {
        Position::After(anchor) => Position::After(map_tag(anchor, f)),
        other => other.clone(),
    };

    let mut out = OrderedPatchList::new();
    for change in list.changes() {
        out.push_raw(match change {
            ListChange::Put { value, position: at } => ListChange::Put {
                value: map_tag(value, f),
                position: position(at),
            },
            ListChange::Move { id, position: at } => ListChange::Move {
                id: map_tag(id, f),
                position: position(at),
            },
            ListChange::Patch { patch } => ListChange::Patch {
                patch: patch.clone(),
            },
            ListChange::Delete { id } => ListChange::Delete {
                id: map_tag(id, f),
            },
        });
    }

    Value::ListPatch(out)
}

fn empty_list() -> Value {
    Value::List(Vec::new())
}

fn empty_map() -> Value {
    Value::Map(BTreeMap::new())
}

fn default_leader() -> Value {
    Value::from(new_friend("Rex"))
}

// ----------------------------------------------------------------------------
// constructors
// ----------------------------------------------------------------------------

pub(crate) fn new_dog(id: &str, name: &str) -> Entity {
    Entity::create(dog(), [("id", Value::from(id)), ("name", Value::from(name))])
        .expect("valid dog")
}

pub(crate) fn new_friend(name: &str) -> Entity {
    Entity::create(friend(), [("name", Value::from(name))]).expect("valid friend")
}

pub(crate) fn new_key(name: &str) -> Entity {
    Entity::create(key(), [("name", Value::from(name))]).expect("valid key")
}

pub(crate) fn dog_patch(id: &str) -> Entity {
    Entity::new_patch(dog(), []).unwrap().with_id(id)
}

pub(crate) fn ids(values: &[Value]) -> Vec<Value> {
    values.iter().filter_map(Value::identity).collect()
}
