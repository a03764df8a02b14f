use serde::{Deserialize, Serialize};
use std::cell::RefCell;

///
/// DiagnosticsState
/// Ephemeral, in-memory counters of patch application.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct DiagnosticsState {
    pub(crate) lists_applied: u64,
    pub(crate) maps_applied: u64,
    pub(crate) changes_applied: u64,
    pub(crate) missing_anchors: u64,
    pub(crate) missing_move_targets: u64,
    pub(crate) missing_delete_targets: u64,
    pub(crate) missing_patch_targets: u64,
}

thread_local! {
    static DIAGNOSTICS_STATE: RefCell<DiagnosticsState> = RefCell::new(DiagnosticsState::default());
}

/// Borrow counters mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut DiagnosticsState) -> R) -> R {
    DIAGNOSTICS_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters (useful in tests).
pub(crate) fn reset() {
    with_state_mut(|m| *m = DiagnosticsState::default());
}

///
/// DiagnosticsReport
/// Point-in-time snapshot of the counters.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    pub lists_applied: u64,
    pub maps_applied: u64,
    pub changes_applied: u64,
    pub missing_anchors: u64,
    pub missing_move_targets: u64,
    pub missing_delete_targets: u64,
    pub missing_patch_targets: u64,
}

impl DiagnosticsReport {
    /// Total intentional no-ops observed.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.missing_anchors
            .saturating_add(self.missing_move_targets)
            .saturating_add(self.missing_delete_targets)
            .saturating_add(self.missing_patch_targets)
    }
}

pub(crate) fn report() -> DiagnosticsReport {
    DIAGNOSTICS_STATE.with(|m| {
        let m = m.borrow();
        DiagnosticsReport {
            lists_applied: m.lists_applied,
            maps_applied: m.maps_applied,
            changes_applied: m.changes_applied,
            missing_anchors: m.missing_anchors,
            missing_move_targets: m.missing_move_targets,
            missing_delete_targets: m.missing_delete_targets,
            missing_patch_targets: m.missing_patch_targets,
        }
    })
}
