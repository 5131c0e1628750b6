//! Pure state transitions for the run session.
//!
//! `reduce` is the single place where a session changes in response to an
//! event. It is total and side-effect-free: persistence and network calls
//! happen in the dispatcher, never here.

use thiserror::Error;

use crate::core::types::{LogEntry, ModuleStatus, PackageSource, RunSession, Variant};

/// Log messages that mark the end of a run on the server side.
///
/// A matching non-PROGRESS log line forces `is_running = false` even when no
/// explicit module or run-complete event arrives. This compensates for a
/// server that may stop emitting events mid-run.
const RUN_TERMINATED_SENTINELS: [&str; 4] = [
    "interrupted",
    "report generated",
    "report skipped",
    "process terminated",
];

/// Inbound and operator events handled by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Free-text console line from the stream or a local synthetic log.
    Log { message: String, severity: String },
    /// Status transition for a named module.
    ModuleStatus {
        module: String,
        status: ModuleStatus,
        message: Option<String>,
    },
    /// The server declared the run finished.
    RunComplete,
    /// Operator started a run against the currently selected package source.
    Start,
    /// Operator stopped the run.
    Stop,
    /// Operator flipped selection of the module at `index`.
    ToggleSelection { index: usize },
    /// Operator switched to another application variant.
    SwitchVariant { variant: Variant },
    /// Operator picked (or cleared) the package source.
    SetSource { source: Option<PackageSource> },
}

/// Why a transition was refused with no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no modules selected")]
    NoModulesSelected,
    #[error("no package source set")]
    NoPackageSource,
}

/// Apply `event` to `state`, producing the next state.
///
/// `now` is the display-formatted timestamp stamped on any appended log entry;
/// passing it in keeps the function deterministic. Events that are defined as
/// no-ops (unmatched module name, toggle/switch while running) return the
/// state unchanged rather than an error.
pub fn reduce(state: &RunSession, event: &SessionEvent, now: &str) -> Result<RunSession, Rejection> {
    let mut next = state.clone();

    match event {
        SessionEvent::Log { message, severity } => {
            append_log(&mut next, now, message, severity);
            // PROGRESS lines are display-only and must not touch run state.
            if !severity.eq_ignore_ascii_case(crate::core::types::PROGRESS)
                && is_terminated_sentinel(message)
            {
                next.is_running = false;
            }
        }
        SessionEvent::ModuleStatus {
            module,
            status,
            message,
        } => {
            let Some(found) = next.module_mut(module) else {
                // Late or foreign event: tolerated, not an error.
                return Ok(next);
            };
            found.status = *status;
            recompute_running(&mut next);
            if let Some(message) = message {
                let tagged = format!("[{module}] {message}");
                append_log(&mut next, now, &tagged, status.label());
            }
        }
        SessionEvent::RunComplete => {
            next.is_running = false;
        }
        SessionEvent::Start => {
            if !state.modules.iter().any(|module| module.selected) {
                return Err(Rejection::NoModulesSelected);
            }
            if state.source.is_none() {
                return Err(Rejection::NoPackageSource);
            }
            for module in &mut next.modules {
                module.status = ModuleStatus::Pending;
            }
            next.is_running = true;
            next.has_opened_report = false;
            next.logs.clear();
        }
        SessionEvent::Stop => {
            next.is_running = false;
            for module in &mut next.modules {
                if module.status == ModuleStatus::Running {
                    // A stop fails in-flight work; it never counts as success.
                    module.status = ModuleStatus::Failed;
                }
            }
            append_log(&mut next, now, "Test run stopped by user.", "FAILED");
        }
        SessionEvent::ToggleSelection { index } => {
            if next.is_running {
                return Ok(next);
            }
            if let Some(module) = next.modules.get_mut(*index) {
                module.selected = !module.selected;
            }
        }
        SessionEvent::SwitchVariant { variant } => {
            // Rehydration on reload re-requests the active variant; that must
            // not reset module state.
            if next.is_running || variant.id == next.variant {
                return Ok(next);
            }
            next.variant = variant.id.clone();
            next.modules = variant.default_modules();
            next.has_opened_report = false;
        }
        SessionEvent::SetSource { source } => {
            if next.is_running {
                return Ok(next);
            }
            next.source = source.clone();
        }
    }

    Ok(next)
}

/// Recompute the `is_running` invariant against the module set.
///
/// The session is running iff some module is running, or a started run still
/// has a selected module pending.
fn recompute_running(session: &mut RunSession) {
    let any_running = session
        .modules
        .iter()
        .any(|module| module.status == ModuleStatus::Running);
    let selected_pending = session
        .modules
        .iter()
        .any(|module| module.selected && module.status == ModuleStatus::Pending);
    session.is_running = any_running || (session.is_running && selected_pending);
}

/// Append a log entry, collapsing consecutive PROGRESS entries in place.
fn append_log(session: &mut RunSession, now: &str, message: &str, severity: &str) {
    let entry = LogEntry {
        timestamp: now.to_string(),
        message: message.to_string(),
        severity: severity.to_string(),
    };
    if entry.is_progress()
        && let Some(last) = session.logs.last_mut()
        && last.is_progress()
    {
        *last = entry;
        return;
    }
    session.logs.push(entry);
}

fn is_terminated_sentinel(message: &str) -> bool {
    let lower = message.to_lowercase();
    RUN_TERMINATED_SENTINELS
        .iter()
        .any(|sentinel| lower.contains(sentinel))
}
