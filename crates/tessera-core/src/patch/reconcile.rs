use crate::{
    entity::Entity,
    patch::PatchError,
    schema::{DefaultFactory, Flavor},
    value::Value,
};

///
/// reconcile
///
/// Resolve `payload` against the `current` value of a slot. `default` is
/// the slot's default factory and `receiver` the flavor of the entity that
/// owns the slot.
///
/// Returns `None` only when the slot stays absent.
///
pub fn reconcile(
    current: Option<&Value>,
    payload: &Value,
    default: Option<DefaultFactory>,
    receiver: Flavor,
) -> Result<Option<Value>, PatchError> {
    let stacking = matches!(receiver, Flavor::Patch);

    match (current, payload) {
        (_, Value::Null) => Ok(Some(Value::Null)),

        // pending collection patches stack
        (Some(Value::ListPatch(pending)), Value::ListPatch(next)) => {
            Ok(Some(Value::ListPatch(pending.patch(next)?)))
        }
        (Some(Value::MapPatch(pending)), Value::MapPatch(next)) => {
            Ok(Some(Value::MapPatch(pending.patch(next)?)))
        }

        (Some(Value::Entity(entity)), Value::Entity(incoming)) => {
            if incoming.is_put() {
                Ok(Some(payload.clone()))
            } else {
                entity.patch(incoming).map(|next| Some(Value::from(next)))
            }
        }

        (Some(Value::List(items)), Value::ListPatch(list)) => {
            list.apply_to(items).map(|next| Some(Value::List(next)))
        }
        (Some(Value::Map(map)), Value::MapPatch(changes)) => {
            changes.apply_to(map).map(|next| Some(Value::Map(next)))
        }

        (None | Some(Value::Null), Value::ListPatch(list)) => {
            if stacking {
                return Ok(Some(payload.clone()));
            }
            if list.is_empty() {
                return Ok(current.cloned());
            }

            let applied = list.apply_to(&[])?;
            if applied.is_empty() {
                Ok(current.cloned())
            } else {
                Ok(Some(Value::List(applied)))
            }
        }
        (None | Some(Value::Null), Value::MapPatch(changes)) => {
            if stacking {
                return Ok(Some(payload.clone()));
            }
            if changes.is_empty() {
                return Ok(current.cloned());
            }

            let applied = changes.apply_to(&Default::default())?;
            if applied.is_empty() {
                Ok(current.cloned())
            } else {
                Ok(Some(Value::Map(applied)))
            }
        }
        (None | Some(Value::Null), Value::Entity(incoming)) if incoming.is_patch() => {
            if stacking {
                return Ok(Some(payload.clone()));
            }

            materialize(incoming, default).map(|entity| Some(Value::from(entity)))
        }

        (Some(other), Value::ListPatch(_) | Value::MapPatch(_)) => Err(PatchError::ShapeMismatch {
            expected: payload.kind(),
            actual: other.kind(),
        }),
        (Some(other), Value::Entity(_)) if payload.is_patch() => Err(PatchError::ShapeMismatch {
            expected: "entity",
            actual: other.kind(),
        }),

        _ => Ok(Some(payload.clone())),
    }
}

///
/// materialize
///
/// Turn a partial patch into a put entity for a slot that has nothing to
/// patch. The slot's default factory supplies the base; without one the
/// patch is rejected.
///
fn materialize(patch: &Entity, default: Option<DefaultFactory>) -> Result<Entity, PatchError> {
    let entity = patch.schema().name();
    let Some(factory) = default else {
        return Err(PatchError::cannot_patch_absent(
            entity,
            "the slot is empty and has no default",
        ));
    };

    match factory() {
        Value::Entity(base) if base.schema().same_type(patch.schema()) => base.patch(patch),
        _ => Err(PatchError::cannot_patch_absent(
            entity,
            "the slot default is not an entity of the patched type",
        )),
    }
}

///
/// TESTS
///
