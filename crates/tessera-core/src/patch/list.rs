use crate::{
    entity::Entity,
    error::SchemaError,
    obs::{self, PatchEvent},
    patch::PatchError,
    value::Value,
};

///
/// Position
///
/// Where a put or move lands. `After` an id that is not present falls
/// back to the tail.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Position {
    Start,
    After(Value),
    #[default]
    End,
}

impl Position {
    #[must_use]
    pub fn after(id: impl Into<Value>) -> Self {
        Self::After(id.into())
    }
}

///
/// ListChange
///

#[derive(Clone, Debug, PartialEq)]
pub enum ListChange {
    Put { value: Value, position: Position },
    Move { id: Value, position: Position },
    Patch { patch: Entity },
    Delete { id: Value },
}

impl ListChange {
    /// Identity of the element this change addresses.
    #[must_use]
    pub fn target(&self) -> Option<Value> {
        match self {
            Self::Put { value, .. } => value.identity(),
            Self::Patch { patch } => patch.identity(),
            Self::Move { id, .. } | Self::Delete { id } => Some(id.clone()),
        }
    }

    fn targets(&self, id: &Value) -> bool {
        self.target().as_ref() == Some(id)
    }
}

///
/// OrderedPatchList
///
/// Ordered log of changes to a list whose elements are addressed by
/// identity. Appending coalesces with pending changes to the same element.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderedPatchList {
    changes: Vec<ListChange>,
}

impl OrderedPatchList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    #[must_use]
    pub fn changes(&self) -> &[ListChange] {
        &self.changes
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.changes.len()
    }

    /// Put `value` at the end of the list.
    pub fn add_put(&mut self, value: impl Into<Value>) {
        self.add_put_at(value, Position::End);
    }

    pub fn add_put_at(&mut self, value: impl Into<Value>, position: Position) {
        self.changes.push(ListChange::Put {
            value: value.into(),
            position,
        });
    }

    pub fn add_move(&mut self, id: impl Into<Value>, position: Position) {
        self.changes.push(ListChange::Move {
            id: id.into(),
            position,
        });
    }

    ///
    /// add_patch
    ///
    /// Record a partial update. A pending put of the same element absorbs
    /// it immediately; a pending patch is stacked.
    ///
    pub fn add_patch(&mut self, patch: Entity) -> Result<(), PatchError> {
        let Some(id) = patch.identity() else {
            return Err(SchemaError::MissingIdentity {
                entity: patch.schema().name(),
            }
            .into());
        };

        let pending = self.changes.iter().rposition(|change| {
            matches!(change, ListChange::Put { .. } | ListChange::Patch { .. })
                && change.targets(&id)
        });
        let Some(index) = pending else {
            self.changes.push(ListChange::Patch { patch });
            return Ok(());
        };

        match &mut self.changes[index] {
            ListChange::Put { value, .. } => {
                let Value::Entity(entity) = value else {
                    return Err(PatchError::ShapeMismatch {
                        expected: "entity",
                        actual: value.kind(),
                    });
                };
                **entity = entity.patch(&patch)?;
            }
            ListChange::Patch { patch: stacked } => {
                *stacked = stacked.patch(&patch)?;
            }
            ListChange::Move { .. } | ListChange::Delete { .. } => {}
        }

        Ok(())
    }

    ///
    /// add_delete
    ///
    /// Drop pending puts and patches of `id`. A tombstone is kept unless
    /// one of the dropped changes was a put.
    ///
    pub fn add_delete(&mut self, id: impl Into<Value>) {
        let id = id.into();
        let mut dropped_put = false;

        self.changes.retain(|change| match change {
            ListChange::Put { .. } if change.targets(&id) => {
                dropped_put = true;
                false
            }
            ListChange::Patch { .. } => !change.targets(&id),
            _ => true,
        });

        if !dropped_put {
            self.changes.push(ListChange::Delete { id });
        }
    }

    /// Append one change with the coalescing rules of the `add_*` methods.
    pub fn push(&mut self, change: ListChange) -> Result<(), PatchError> {
        match change {
            ListChange::Put { value, position } => self.add_put_at(value, position),
            ListChange::Move { id, position } => self.add_move(id, position),
            ListChange::Patch { patch } => self.add_patch(patch)?,
            ListChange::Delete { id } => self.add_delete(id),
        }

        Ok(())
    }

    /// Append a decoded change verbatim.
    pub(crate) fn push_raw(&mut self, change: ListChange) {
        self.changes.push(change);
    }

    /// Compose two logs: the result applies `self` then `other`.
    pub fn patch(&self, other: &Self) -> Result<Self, PatchError> {
        let mut merged = self.clone();
        for change in &other.changes {
            merged.push(change.clone())?;
        }

        Ok(merged)
    }

    /// Split into the changes that do not address `id` and those that do,
    /// each in original order.
    #[must_use]
    pub fn filter(&self, id: &Value) -> (Self, Self) {
        let (extracted, remaining): (Vec<_>, Vec<_>) = self
            .changes
            .iter()
            .cloned()
            .partition(|change| change.targets(id));

        (
            Self {
                changes: remaining,
            },
            Self { changes: extracted },
        )
    }

    ///
    /// apply_to
    ///
    /// Run the log against `items` and return the new list. Missing move,
    /// delete, and patch targets are skipped and reported as diagnostics.
    ///
    pub fn apply_to(&self, items: &[Value]) -> Result<Vec<Value>, PatchError> {
        let mut out = items.to_vec();

        for change in &self.changes {
            match change {
                ListChange::Put { value, position } => {
                    if let Some(id) = value.identity()
                        && let Some(index) = index_of(&out, &id)
                    {
                        out.remove(index);
                    }
                    insert_at(&mut out, position, value.clone());
                }
                ListChange::Move { id, position } => match index_of(&out, id) {
                    Some(index) => {
                        let item = out.remove(index);
                        insert_at(&mut out, position, item);
                    }
                    None => obs::record(PatchEvent::MoveTargetMissing { id: id.to_string() }),
                },
                ListChange::Patch { patch } => {
                    let id = patch.identity().unwrap_or(Value::Null);
                    let Some(index) = index_of(&out, &id) else {
                        obs::record(PatchEvent::PatchTargetMissing { id: id.to_string() });
                        continue;
                    };

                    let Value::Entity(current) = &out[index] else {
                        return Err(PatchError::ShapeMismatch {
                            expected: "entity",
                            actual: out[index].kind(),
                        }
                        .with_index(index));
                    };
                    let next = current.patch(patch).map_err(|err| err.with_index(index))?;
                    out[index] = Value::from(next);
                }
                ListChange::Delete { id } => match index_of(&out, id) {
                    Some(index) => {
                        out.remove(index);
                    }
                    None => obs::record(PatchEvent::DeleteTargetMissing { id: id.to_string() }),
                },
            }
        }

        obs::record(PatchEvent::ListApplied {
            changes: self.changes.len(),
        });

        Ok(out)
    }
}

fn index_of(items: &[Value], id: &Value) -> Option<usize> {
    items
        .iter()
        .position(|item| item.identity().as_ref() == Some(id))
}

fn insert_at(items: &mut Vec<Value>, position: &Position, value: Value) {
    match position {
        Position::Start => items.insert(0, value),
        Position::End => items.push(value),
        Position::After(anchor) => match index_of(items, anchor) {
            Some(index) => items.insert(index + 1, value),
            None => {
                obs::record(PatchEvent::AnchorMissing {
                    anchor: anchor.to_string(),
                });
                items.push(value);
            }
        },
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        obs::{RecordingSink, with_diagnostics_sink},
        test_fixtures::{dog, dog_patch, ids, new_dog},
    };
    use proptest::prelude::*;
    use std::{ops::Range, rc::Rc};

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn integer_walkthrough() {
        let base = ints(&[8, 5, 3, 1]);
        let mut list = OrderedPatchList::new();

        list.add_put_at(9, Position::after(3));
        assert_eq!(list.apply_to(&base).unwrap(), ints(&[8, 5, 3, 9, 1]));

        list.add_put_at(10, Position::after(9));
        list.add_put_at(11, Position::after(9));
        assert_eq!(list.apply_to(&base).unwrap(), ints(&[8, 5, 3, 9, 11, 10, 1]));

        list.add_delete(3);
        assert_eq!(list.apply_to(&base).unwrap(), ints(&[8, 5, 9, 11, 10, 1]));

        list.add_move(8, Position::after(1));
        assert_eq!(list.apply_to(&base).unwrap(), ints(&[5, 9, 11, 10, 1, 8]));

        list.add_move(1, Position::Start);
        assert_eq!(list.apply_to(&base).unwrap(), ints(&[1, 5, 9, 11, 10, 8]));

        list.add_put_at(12, Position::Start);
        assert_eq!(
            list.apply_to(&base).unwrap(),
            ints(&[12, 1, 5, 9, 11, 10, 8])
        );
    }

    #[test]
    fn put_of_present_id_replaces_the_prior_occurrence() {
        let base = vec![
            Value::from(new_dog("2", "b")),
            Value::from(new_dog("1", "a")),
            Value::from(new_dog("3", "c")),
        ];
        let replacement = new_dog("1", "z");

        let cases = [
            (Position::End, ["2", "3", "1"]),
            (Position::Start, ["1", "2", "3"]),
            (Position::after("2"), ["2", "1", "3"]),
        ];

        for (position, expected) in cases {
            let mut list = OrderedPatchList::new();
            list.add_put_at(replacement.clone(), position);

            let out = list.apply_to(&base).unwrap();
            assert_eq!(ids(&out), expected.map(Value::from).to_vec());
            assert!(out.contains(&Value::from(replacement.clone())));
        }
    }

    #[test]
    fn put_then_delete_cancels_out() {
        let mut list = OrderedPatchList::new();
        list.add_put(new_dog("1", "a"));
        list.add_delete("1");

        assert!(list.is_empty());
    }

    #[test]
    fn delete_without_pending_put_leaves_a_tombstone() {
        let mut list = OrderedPatchList::new();
        list.add_patch(dog_patch("1").with("name", "b").unwrap())
            .unwrap();
        list.add_delete("1");

        assert_eq!(
            list.changes(),
            &[ListChange::Delete {
                id: Value::from("1")
            }]
        );
    }

    #[test]
    fn patch_folds_into_pending_put() {
        let mut list = OrderedPatchList::new();
        list.add_put(new_dog("1", "a"));
        list.add_patch(dog_patch("1").with("name", "b").unwrap())
            .unwrap();

        assert_eq!(list.len(), 1);
        let ListChange::Put { value, .. } = &list.changes()[0] else {
            panic!("expected a put");
        };
        assert_eq!(value, &Value::from(new_dog("1", "b")));
    }

    #[test]
    fn patches_of_the_same_element_stack() {
        let mut list = OrderedPatchList::new();
        list.add_patch(dog_patch("1").with("name", "b").unwrap())
            .unwrap();
        list.add_patch(dog_patch("1").with("friend", Value::Null).unwrap())
            .unwrap();

        assert_eq!(list.len(), 1);
        let ListChange::Patch { patch } = &list.changes()[0] else {
            panic!("expected a patch");
        };
        assert_eq!(patch.get("name"), Some(&Value::from("b")));
        assert_eq!(patch.get("friend"), Some(&Value::Null));
    }

    #[test]
    fn patch_without_identity_is_rejected() {
        let mut list = OrderedPatchList::new();
        let anonymous = Entity::new_patch(dog(), [("name", Value::from("a"))]).unwrap();

        let err = list.add_patch(anonymous).unwrap_err();
        assert_eq!(
            err,
            PatchError::Schema(SchemaError::MissingIdentity { entity: "Dog" })
        );
    }

    #[test]
    fn patch_applies_to_the_matching_element_only() {
        let base = vec![
            Value::from(new_dog("1", "a")),
            Value::from(new_dog("2", "b")),
        ];
        let mut list = OrderedPatchList::new();
        list.add_patch(dog_patch("2").with("name", "z").unwrap())
            .unwrap();

        let out = list.apply_to(&base).unwrap();
        assert_eq!(out[0], base[0]);
        assert_eq!(out[1], Value::from(new_dog("2", "z")));
    }

    #[test]
    fn missing_targets_are_reported_not_raised() {
        let sink = Rc::new(RecordingSink::default());
        let mut list = OrderedPatchList::new();
        list.add_move(42, Position::Start);
        list.add_delete(43);
        list.add_put_at(1, Position::after(44));

        let out = with_diagnostics_sink(sink.clone(), || list.apply_to(&ints(&[7]))).unwrap();

        assert_eq!(out, ints(&[7, 1]));
        assert_eq!(
            sink.events(),
            vec![
                PatchEvent::MoveTargetMissing { id: "42".into() },
                PatchEvent::DeleteTargetMissing { id: "43".into() },
                PatchEvent::AnchorMissing {
                    anchor: "44".into()
                },
                PatchEvent::ListApplied { changes: 3 },
            ]
        );
    }

    #[test]
    fn missing_patch_target_is_a_no_op() {
        let base = vec![Value::from(new_dog("1", "a"))];
        let mut list = OrderedPatchList::new();
        list.add_patch(dog_patch("9").with("name", "z").unwrap())
            .unwrap();

        assert_eq!(list.apply_to(&base).unwrap(), base);
    }

    #[test]
    fn filter_partitions_by_target() {
        let mut list = OrderedPatchList::new();
        list.add_put(1);
        list.add_put(2);
        list.add_move(1, Position::Start);

        let (remaining, extracted) = list.filter(&Value::Int(1));
        assert_eq!(remaining.changes(), &[ListChange::Put {
            value: Value::Int(2),
            position: Position::End,
        }]);
        assert_eq!(extracted.len(), 2);
    }

    ///
    /// PROPERTIES
    ///

    fn text_id(id: i64) -> Value {
        Value::from(id.to_string())
    }

    fn position_strategy(
        ids: Range<i64>,
        key: fn(i64) -> Value,
    ) -> impl Strategy<Value = Position> {
        prop_oneof![
            Just(Position::Start),
            Just(Position::End),
            ids.prop_map(move |id| Position::After(key(id))),
        ]
    }

    fn change_strategy(ids: Range<i64>) -> impl Strategy<Value = ListChange> {
        prop_oneof![
            (ids.clone(), position_strategy(ids.clone(), Value::Int)).prop_map(|(id, position)| {
                ListChange::Put {
                    value: Value::Int(id),
                    position,
                }
            }),
            (ids.clone(), position_strategy(ids.clone(), Value::Int)).prop_map(|(id, position)| {
                ListChange::Move {
                    id: Value::Int(id),
                    position,
                }
            }),
            ids.prop_map(|id| ListChange::Delete { id: Value::Int(id) }),
        ]
    }

    fn dog_change_strategy(ids: Range<i64>) -> impl Strategy<Value = ListChange> {
        prop_oneof![
            (ids.clone(), "[a-c]", position_strategy(ids.clone(), text_id)).prop_map(
                |(id, name, position)| ListChange::Put {
                    value: Value::from(new_dog(&id.to_string(), &name)),
                    position,
                }
            ),
            (ids.clone(), position_strategy(ids.clone(), text_id)).prop_map(|(id, position)| {
                ListChange::Move {
                    id: text_id(id),
                    position,
                }
            }),
            (ids.clone(), "[a-c]").prop_map(|(id, name)| ListChange::Patch {
                patch: dog_patch(&id.to_string()).with("name", name).unwrap(),
            }),
            ids.prop_map(|id| ListChange::Delete { id: text_id(id) }),
        ]
    }

    fn log(changes: Vec<ListChange>) -> OrderedPatchList {
        let mut list = OrderedPatchList::new();
        for change in changes {
            list.push(change).unwrap();
        }
        list
    }

    proptest! {
        #[test]
        fn empty_log_is_identity(base in proptest::collection::vec(0i64..50, 0..10)) {
            let base = ints(&base);
            prop_assert_eq!(OrderedPatchList::new().apply_to(&base).unwrap(), base);
        }

        #[test]
        fn composition_over_disjoint_ids_matches_sequential_application(
            base in proptest::collection::btree_set(0i64..100, 0..8),
            first in proptest::collection::vec(change_strategy(0..50), 0..6),
            second in proptest::collection::vec(change_strategy(50..100), 0..6),
        ) {
            let base: Vec<Value> = base.into_iter().map(Value::Int).collect();
            let first = log(first);
            let second = log(second);

            let sequential = second.apply_to(&first.apply_to(&base).unwrap()).unwrap();
            let composed = first.patch(&second).unwrap().apply_to(&base).unwrap();

            prop_assert_eq!(composed, sequential);
        }

        #[test]
        fn composition_with_patches_is_associative(
            base in proptest::collection::btree_set(0i64..90, 0..8),
            first in proptest::collection::vec(dog_change_strategy(0..30), 0..5),
            second in proptest::collection::vec(dog_change_strategy(30..60), 0..5),
            third in proptest::collection::vec(dog_change_strategy(60..90), 0..5),
        ) {
            let base: Vec<Value> = base
                .into_iter()
                .map(|id| Value::from(new_dog(&id.to_string(), "base")))
                .collect();
            let (first, second, third) = (log(first), log(second), log(third));

            let left = first.patch(&second).unwrap().patch(&third).unwrap();
            let right = first.patch(&second.patch(&third).unwrap()).unwrap();
            let sequential = third
                .apply_to(&second.apply_to(&first.apply_to(&base).unwrap()).unwrap())
                .unwrap();

            prop_assert_eq!(left.apply_to(&base).unwrap(), sequential.clone());
            prop_assert_eq!(right.apply_to(&base).unwrap(), sequential);
        }
    }
}
