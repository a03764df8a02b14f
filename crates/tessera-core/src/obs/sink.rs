//! Diagnostics sink boundary.
//!
//! Patch logic never touches the counters directly; every observation
//! flows through `PatchEvent` and `DiagnosticsSink`.
use crate::obs::diagnostics::{self, DiagnosticsReport};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn DiagnosticsSink>>> = const { RefCell::new(None) };
}

///
/// PatchEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PatchEvent {
    AnchorMissing { anchor: String },
    DeleteTargetMissing { id: String },
    ListApplied { changes: usize },
    MapApplied { changes: usize },
    MoveTargetMissing { id: String },
    PatchTargetMissing { id: String },
}

///
/// DiagnosticsSink
///

pub trait DiagnosticsSink {
    fn record(&self, event: PatchEvent);
}

/// GlobalDiagnosticsSink
/// Default sink: bumps the thread-local counters and emits a trace event.

pub(crate) struct GlobalDiagnosticsSink;

impl DiagnosticsSink for GlobalDiagnosticsSink {
    fn record(&self, event: PatchEvent) {
        match &event {
            PatchEvent::ListApplied { changes } => {
                diagnostics::with_state_mut(|m| {
                    m.lists_applied = m.lists_applied.saturating_add(1);
                    m.changes_applied = m.changes_applied.saturating_add(*changes as u64);
                });
                tracing::trace!(changes, "ordered patch list applied");
            }
            PatchEvent::MapApplied { changes } => {
                diagnostics::with_state_mut(|m| {
                    m.maps_applied = m.maps_applied.saturating_add(1);
                    m.changes_applied = m.changes_applied.saturating_add(*changes as u64);
                });
                tracing::trace!(changes, "keyed patch map applied");
            }
            PatchEvent::AnchorMissing { anchor } => {
                diagnostics::with_state_mut(|m| {
                    m.missing_anchors = m.missing_anchors.saturating_add(1);
                });
                tracing::debug!(%anchor, "put anchor not found, appended at tail");
            }
            PatchEvent::MoveTargetMissing { id } => {
                diagnostics::with_state_mut(|m| {
                    m.missing_move_targets = m.missing_move_targets.saturating_add(1);
                });
                tracing::debug!(%id, "move target not found, skipped");
            }
            PatchEvent::DeleteTargetMissing { id } => {
                diagnostics::with_state_mut(|m| {
                    m.missing_delete_targets = m.missing_delete_targets.saturating_add(1);
                });
                tracing::debug!(%id, "delete target not found, skipped");
            }
            PatchEvent::PatchTargetMissing { id } => {
                diagnostics::with_state_mut(|m| {
                    m.missing_patch_targets = m.missing_patch_targets.saturating_add(1);
                });
                tracing::debug!(%id, "patch target not found, skipped");
            }
        }
    }
}

pub(crate) const GLOBAL_DIAGNOSTICS_SINK: GlobalDiagnosticsSink = GlobalDiagnosticsSink;

pub(crate) fn record(event: PatchEvent) {
    let installed = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match installed {
        Some(sink) => sink.record(event),
        None => GLOBAL_DIAGNOSTICS_SINK.record(event),
    }
}

/// Snapshot the diagnostic counters of the current thread.
#[must_use]
pub fn diagnostics_report() -> DiagnosticsReport {
    diagnostics::report()
}

/// Reset the diagnostic counters of the current thread.
pub fn diagnostics_reset() {
    diagnostics::reset();
}

/// Run a closure with a temporary sink override on this thread.
pub fn with_diagnostics_sink<T>(sink: Rc<dyn DiagnosticsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn DiagnosticsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let previous = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = previous;
            });
        }
    }

    let previous = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(previous);

    f()
}

///
/// RecordingSink
/// Collects events in memory; handy in tests and for batch inspection.
///

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<PatchEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn events(&self) -> Vec<PatchEvent> {
        self.events.borrow().clone()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn record(&self, event: PatchEvent) {
        self.events.borrow_mut().push(event);
    }
}

///
/// TESTS
///
