use crate::{
    entity::Entity,
    error::{DecodeError, DecodeErrors, EncodeError},
    schema::EntitySchema,
    wire::{Cursor, DecodeContext, EncodeContext, TreeValue, decode},
};
use serde_json::Map;

const VERSION_KEY: &str = "version";
const DATA_KEY: &str = "data";

///
/// Envelope
///
/// Self-describing document: `{ "version": v, "data": ... }`. The version
/// written is the one the data was encoded at, so readers on any schema
/// revision can decode it.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub version: u32,
    pub entity: Entity,
}

impl Envelope {
    /// Encode `entity` at `ctx.version()` and wrap it.
    pub fn wrap(entity: &Entity, ctx: &mut EncodeContext) -> Result<TreeValue, EncodeError> {
        let data = entity.encode(ctx)?;

        let mut out = Map::new();
        out.insert(VERSION_KEY.to_string(), TreeValue::from(ctx.version()));
        out.insert(DATA_KEY.to_string(), data);

        Ok(TreeValue::Object(out))
    }

    ///
    /// open
    ///
    /// Read the version, then decode the data at it. References are
    /// resolved, so documents written with `with_references` open too.
    ///
    pub fn open(schema: &'static EntitySchema, tree: &TreeValue) -> Result<Self, DecodeErrors> {
        let root = Cursor::root(tree);
        root.object()?;

        let version = version(&root)?;
        let data = root.field(DATA_KEY).ok_or_else(|| missing(&root, DATA_KEY))?;

        let mut ctx = DecodeContext::new(version).with_references();
        let entity = decode::entity(schema, &data, &mut ctx)?;

        Ok(Self { version, entity })
    }
}

fn version(root: &Cursor<'_>) -> Result<u32, DecodeError> {
    let field = root
        .field(VERSION_KEY)
        .ok_or_else(|| missing(root, VERSION_KEY))?;

    field
        .node()
        .as_u64()
        .and_then(|version| u32::try_from(version).ok())
        .ok_or_else(|| field.invalid("Expected a non-negative integer version"))
}

fn missing(root: &Cursor<'_>, key: &str) -> DecodeError {
    DecodeError::new(
        DecodeError::MISSING_FIELD,
        format!("Field {key} is expected at {}", root.display_path()),
        key,
    )
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{dog, new_dog};
    use serde_json::json;

    #[test]
    fn envelopes_record_the_encoded_version() {
        let rex = new_dog("DOG3", "Lab");
        let tree = Envelope::wrap(&rex, &mut EncodeContext::new(1)).unwrap();

        assert_eq!(tree["version"], json!(1));
        assert_eq!(tree["data"]["id"], json!(3));

        let opened = Envelope::open(dog(), &tree).unwrap();
        assert_eq!(opened.version, 1);
        assert_eq!(opened.entity, rex);
    }

    #[test]
    fn malformed_versions_are_invalid() {
        let tree = json!({ "version": "two", "data": {} });
        let errors = Envelope::open(dog(), &tree).unwrap_err();

        assert_eq!(errors[0].code, DecodeError::INVALID_FIELD);
        assert_eq!(errors[0].path, "version");
    }

    #[test]
    fn missing_data_is_reported() {
        let errors = Envelope::open(dog(), &json!({ "version": 2 })).unwrap_err();

        assert_eq!(errors[0].code, DecodeError::MISSING_FIELD);
        assert_eq!(errors[0].path, "data");
    }
}
