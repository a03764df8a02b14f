//! Observability: diagnostic counters and the sink boundary.
//!
//! Patch application never raises for intentional no-ops; it reports them
//! here instead.

pub(crate) mod diagnostics;
pub(crate) mod sink;

// re-exports
pub use diagnostics::DiagnosticsReport;
pub use sink::{
    DiagnosticsSink, PatchEvent, RecordingSink, diagnostics_report, diagnostics_reset,
    with_diagnostics_sink,
};

pub(crate) use sink::record;
