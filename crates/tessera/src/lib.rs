//! Tessera: versioned entity schemas, a tree-value wire codec, and
//! identity-keyed patch reconciliation.
//!
//! This is the public meta-crate. Downstream users depend on **tessera** only.
//!
//! ## Crate layout
//! - `core`: the runtime engine (schemas, codecs, entities, patches, wire).
//! - `error`: the public error type with a stable kind + origin taxonomy.
//!
//! The `prelude` module mirrors the vocabulary used when declaring schemas
//! and building patches.

pub use tessera_core as core;

pub mod error;

pub use error::Error;

// flat re-exports of the runtime surface
pub use tessera_core::{
    codec::{CodecError, ScalarCodec, SchemaRef},
    config::CodecConfig,
    entity::Entity,
    obs::{
        DiagnosticsReport, DiagnosticsSink, PatchEvent, RecordingSink, diagnostics_report,
        diagnostics_reset, with_diagnostics_sink,
    },
    patch::{KeyedPatchMap, ListChange, MapChange, OrderedPatchList, Position, reconcile},
    schema::{EntitySchema, FieldDescriptor, Flavor, SchemaBuilder, install},
    value::Value,
    wire::{DecodeContext, EncodeContext, Envelope, TreeValue},
};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::{
        codec::{BOOLEAN, Codec, INTEGER, NUMBER, ScalarCodec as _, TEXT},
        entity::Entity,
        patch::{KeyedPatchMap, OrderedPatchList, Position},
        schema::{EntitySchema, FieldDescriptor, Flavor, SchemaBuilder, install},
        value::Value,
        wire::{DecodeContext, EncodeContext},
    };
}
