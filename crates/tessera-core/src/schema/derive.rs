use super::{EntitySchema, FieldDescriptor, Flavor};

///
/// patch_shape
///
/// Derive the patch schema of a put schema. Every field becomes optional,
/// the identity field is dropped (a patch addresses its target through its
/// own id slot), and entity or collection codecs switch to their patch form.
///
pub(super) fn patch_shape(source: &'static EntitySchema) -> EntitySchema {
    let identity_field = source.identity_field();
    let fields = source
        .fields
        .iter()
        .filter(|d| Some(d.name) != identity_field)
        .map(patch_descriptor)
        .collect();

    EntitySchema::new(
        source.name,
        Flavor::Patch,
        source.latest_version,
        fields,
        source.identity,
        Some(source),
    )
}

fn patch_descriptor(source: &FieldDescriptor) -> FieldDescriptor {
    let codec = source.codec.patch_codec();

    // structural patch values migrate with the patch-specific functions
    let (upgrade, downgrade) = if codec.is_structural_patch() {
        (source.upgrade_patch, source.downgrade_patch)
    } else {
        (source.upgrade, source.downgrade)
    };

    FieldDescriptor {
        optional: true,
        codec,
        upgrade,
        downgrade,
        default: None,
        ..source.clone()
    }
}

///
/// TESTS
///
