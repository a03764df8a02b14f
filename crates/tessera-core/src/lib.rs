//! Core runtime for Tessera: versioned entity schemas, the wire codec, and
//! identity-keyed patch reconciliation, plus the vocabulary exported via the
//! `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod obs;
pub mod patch;
pub mod schema;
pub mod value;
pub mod wire;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, contexts, or diagnostics are re-exported here.
///

pub mod prelude {
    pub use crate::{
        codec::{BOOLEAN, Codec, INTEGER, NUMBER, ScalarCodec, TEXT},
        entity::Entity,
        patch::{KeyedPatchMap, OrderedPatchList, Position},
        schema::{EntitySchema, FieldDescriptor, Flavor, SchemaBuilder},
        value::Value,
    };
}
