//! Aggregate console status derived from the selected module set.

use crate::core::types::{ModuleStatus, RunSession};

/// Coarse presentation signal summarizing the selected modules' outcome.
///
/// Used only for display weight (status indicator); never for control
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStatus {
    Idle,
    Running,
    Failure,
    Success,
}

/// Derive the console status from canonical state.
///
/// Rules are evaluated in order against the selected modules, so a single
/// failure dominates a mix of completed and failed modules.
pub fn derive_console_status(session: &RunSession) -> ConsoleStatus {
    if session.is_running {
        return ConsoleStatus::Running;
    }

    let selected: Vec<ModuleStatus> = session
        .selected_modules()
        .map(|module| module.status)
        .collect();
    if selected.is_empty() {
        return ConsoleStatus::Idle;
    }
    if selected.contains(&ModuleStatus::Running) {
        return ConsoleStatus::Running;
    }
    if selected.contains(&ModuleStatus::Failed) {
        return ConsoleStatus::Failure;
    }
    if selected.contains(&ModuleStatus::Completed) {
        return ConsoleStatus::Success;
    }
    ConsoleStatus::Idle
}
