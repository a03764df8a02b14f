use serde_json::json;
use std::sync::OnceLock;
use tessera::{
    CodecConfig, Envelope,
    core::codec::EnumCodec,
    error::{DecodeErrorKind, ErrorKind, ErrorOrigin},
    prelude::*,
};

//
// Schemas
//

static UNITS: EnumCodec = EnumCodec {
    variants: &["c", "f"],
};

/// Sensor: `reading` moved from integer tenths to a float at version 3,
/// `label` is spelled `name` on the wire from version 2, and `unit` only
/// exists from version 2.
fn sensor() -> &'static EntitySchema {
    static SCHEMA: OnceLock<EntitySchema> = OnceLock::new();

    install(&SCHEMA, || {
        SchemaBuilder::new("Sensor")
            .register(FieldDescriptor::scalar("id", &TEXT))?
            .register(FieldDescriptor::scalar("label", &TEXT))?
            .register(FieldDescriptor::scalar("label", &TEXT).wire("name").since(2))?
            .register(FieldDescriptor::scalar("unit", &UNITS).optional().since(2))?
            .register(FieldDescriptor::scalar("reading", &INTEGER))?
            .register(
                FieldDescriptor::scalar("reading", &NUMBER)
                    .since(3)
                    .upgrade(tenths_to_float)
                    .downgrade(float_to_tenths),
            )?
            .identity_field("id")
            .build()
    })
}

fn tenths_to_float(value: &Value) -> Value {
    match value {
        #[allow(clippy::cast_precision_loss)]
        Value::Int(tenths) => Value::Float(*tenths as f64 / 10.0),
        other => other.clone(),
    }
}

fn float_to_tenths(value: &Value) -> Value {
    match value {
        #[allow(clippy::cast_possible_truncation)]
        Value::Float(reading) => Value::Int((reading * 10.0).round() as i64),
        other => other.clone(),
    }
}

fn roof(reading: f64) -> Entity {
    Entity::create(
        sensor(),
        [
            ("id", Value::from("s1")),
            ("label", Value::from("roof")),
            ("reading", Value::from(reading)),
        ],
    )
    .unwrap()
}

//
// Tests
//

#[test]
fn oldest_payloads_upgrade_to_latest() {
    let tree = json!({ "id": "s1", "label": "roof", "reading": 215 });
    let decoded = sensor().decode(&tree, &mut DecodeContext::new(1)).unwrap();

    assert_eq!(decoded, roof(21.5));
    assert_eq!(decoded.get("reading"), Some(&Value::Float(21.5)));
}

#[test]
fn each_version_has_its_own_wire_form() {
    let sensor_v3 = roof(21.5).with("unit", "c").unwrap();

    let v1 = sensor_v3.encode(&mut EncodeContext::new(1)).unwrap();
    assert_eq!(v1, json!({ "id": "s1", "label": "roof", "reading": 215 }));

    let v2 = sensor_v3.encode(&mut EncodeContext::new(2)).unwrap();
    assert_eq!(v2, json!({ "id": "s1", "name": "roof", "reading": 215, "unit": "c" }));

    let v3 = sensor_v3.encode(&mut EncodeContext::latest(sensor())).unwrap();
    assert_eq!(v3, json!({ "id": "s1", "name": "roof", "reading": 21.5, "unit": "c" }));

    // fields absent from the old version are lost, the rest survives
    let back = sensor().decode(&v1, &mut DecodeContext::new(1)).unwrap();
    assert_eq!(back, roof(21.5));
}

#[test]
fn encoding_never_mutates_the_entity() {
    let original = roof(9.5);
    let copy = original.clone();

    original.encode(&mut EncodeContext::new(1)).unwrap();

    assert_eq!(original, copy);
}

#[test]
fn envelopes_carry_their_version() {
    let tree = Envelope::wrap(&roof(3.0), &mut EncodeContext::new(2)).unwrap();
    assert_eq!(tree["version"], json!(2));
    assert_eq!(tree["data"]["reading"], json!(30));

    let opened = Envelope::open(sensor(), &tree).unwrap();
    assert_eq!(opened.version, 2);
    assert_eq!(opened.entity, roof(3.0));
}

#[test]
fn patches_migrate_like_puts() {
    let patch = Entity::new_patch(sensor(), [("reading", Value::from(30.0))])
        .unwrap()
        .with_id("s1");

    let tree = patch.encode(&mut EncodeContext::new(1)).unwrap();
    assert_eq!(tree, json!({ "_isPatch": true, "id": "s1", "reading": 300 }));

    let decoded = sensor().decode_any(&tree, &mut DecodeContext::new(1)).unwrap();
    assert_eq!(decoded, patch);

    let next = roof(21.5).patch(&decoded).unwrap();
    assert_eq!(next.get("reading"), Some(&Value::Float(30.0)));
}

#[test]
fn decode_failures_surface_through_the_public_error() {
    let tree = json!({ "id": "s1", "name": "roof", "reading": 1.5, "unit": "k" });
    let errors = sensor().decode(&tree, &mut DecodeContext::new(2)).unwrap_err();

    assert_eq!(errors.len(), 2);
    assert!(errors.at("unit").is_some());
    assert!(errors.at("reading").is_some());

    let public = tessera::Error::from(errors);
    assert_eq!(public.kind, ErrorKind::Decode(DecodeErrorKind::InvalidField));
    assert_eq!(public.origin, ErrorOrigin::Decode);
    assert!(public.message.contains("(and 1 more)"));
}

#[test]
fn config_selects_the_wire_version() {
    let config = CodecConfig::from_toml_str("version = 2\nskip_defaults = true").unwrap();

    let tree = roof(1.0)
        .with("label", "")
        .unwrap()
        .encode(&mut config.encode_context(sensor()))
        .unwrap();
    assert_eq!(tree, json!({ "id": "s1", "reading": 10 }));

    let back = sensor()
        .decode(&tree, &mut config.decode_context(sensor()))
        .unwrap();
    assert_eq!(back.get("label"), Some(&Value::from("")));
    assert_eq!(back.get("reading"), Some(&Value::Float(1.0)));
}

#[test]
fn bad_config_is_a_config_error() {
    let err = CodecConfig::from_toml_str("version = \"two\"").unwrap_err();

    assert_eq!(tessera::Error::from(err).kind, ErrorKind::Config);
}
