//! Run lifecycle orchestration.
//!
//! The controller is a synchronous state machine over the session: it
//! validates preconditions, applies reducer transitions, and decides which
//! REST calls the dispatcher should issue. Keeping the network out of this
//! module means every lifecycle rule is testable without a server, and every
//! transition stays on the single event queue.

use thiserror::Error;
use tracing::{debug, info};

use crate::core::reducer::{Rejection, SessionEvent, reduce};
use crate::core::types::{ModuleStatus, RunSession};
use crate::io::api::{ApiError, RunAccepted, RunRequest};

/// Lifecycle phase of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Why a start was refused before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartRefusal {
    #[error("automation driver is not running")]
    DriverNotRunning,
    #[error("no modules selected")]
    NoModulesSelected,
    #[error("no package source set")]
    NoPackageSource,
}

/// Why a reset was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResetRefusal {
    #[error("a run is still active")]
    RunActive,
}

/// Result of a local stop transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    /// The operator must be offered a partial-report prompt.
    pub offer_partial_report: bool,
}

#[derive(Debug)]
pub struct RunController {
    phase: RunPhase,
    /// A stop prompt is awaiting the operator's answer.
    prompt_open: bool,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
            prompt_open: false,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Validate preconditions and apply the start transition.
    ///
    /// Returns the submission body for the dispatcher to send. Any refusal
    /// happens before a network call and leaves the session untouched.
    pub fn begin_start(
        &mut self,
        session: &mut RunSession,
        driver_running: bool,
        now: &str,
    ) -> Result<RunRequest, StartRefusal> {
        if !driver_running {
            return Err(StartRefusal::DriverNotRunning);
        }
        let next = reduce(session, &SessionEvent::Start, now).map_err(|rejection| match rejection {
            Rejection::NoModulesSelected => StartRefusal::NoModulesSelected,
            Rejection::NoPackageSource => StartRefusal::NoPackageSource,
        })?;
        *session = next;

        // `Start` validated the source, so the request always builds.
        let Some(request) = RunRequest::from_session(session) else {
            return Err(StartRefusal::NoPackageSource);
        };

        let feedback = match &request.apk_name {
            Some(name) => format!("Initializing test with staged package: {name}"),
            None => "Initializing test request...".to_string(),
        };
        apply_log(session, now, &feedback, "INFO");

        self.phase = RunPhase::Starting;
        info!(variant = %session.variant, modules = request.tests_to_run.len(), "run submitted");
        Ok(request)
    }

    /// Ingest the submission outcome.
    ///
    /// If the operator stopped or reset while the request was in flight, the
    /// completion is applied to the log only and must not resurrect the run.
    pub fn finish_start(
        &mut self,
        session: &mut RunSession,
        result: Result<RunAccepted, ApiError>,
        now: &str,
    ) {
        let still_starting = self.phase == RunPhase::Starting;
        match result {
            Ok(accepted) => {
                if accepted.app_icon.is_some() {
                    session.app_icon = accepted.app_icon;
                }
                if accepted.app_name.is_some() {
                    session.app_title = accepted.app_name;
                }
                apply_log(
                    session,
                    now,
                    &format!("Package staged at: {}", accepted.apk_path),
                    "SUCCESS",
                );
                if still_starting {
                    self.phase = RunPhase::Running;
                } else {
                    debug!("submission completed after stop; not resuming run");
                    session.is_running = false;
                }
            }
            Err(err) => {
                apply_log(session, now, &format!("Error: {err}"), "FAILED");
                session.is_running = false;
                if still_starting {
                    self.phase = RunPhase::Failed;
                }
            }
        }
    }

    /// Local stop transition. The stop REST call is best-effort and issued by
    /// the dispatcher; its outcome is only logged.
    pub fn stop(&mut self, session: &mut RunSession, now: &str) -> StopOutcome {
        if let Ok(next) = reduce(session, &SessionEvent::Stop, now) {
            *session = next;
        }
        self.phase = RunPhase::Stopped;
        self.prompt_open = true;
        StopOutcome {
            offer_partial_report: true,
        }
    }

    /// Answer the partial-report prompt. Returns true when the dispatcher
    /// should issue the report-generation request; declining closes the
    /// prompt with no further effect.
    pub fn confirm_partial_report(&mut self, accept: bool) -> bool {
        if !self.prompt_open {
            return false;
        }
        self.prompt_open = false;
        accept
    }

    /// Apply a run-complete event and evaluate the one-shot report gate.
    ///
    /// Returns the report URL to navigate to at most once per run; replayed
    /// `RUN_COMPLETE` events (reconnects) return `None`.
    pub fn handle_run_complete(
        &mut self,
        session: &mut RunSession,
        report_url: Option<String>,
        now: &str,
    ) -> Option<String> {
        if let Ok(next) = reduce(session, &SessionEvent::RunComplete, now) {
            *session = next;
        }
        if matches!(self.phase, RunPhase::Starting | RunPhase::Running) {
            self.phase = RunPhase::Completed;
        }

        let url = report_url?;
        if session.has_opened_report {
            debug!("report already opened this run; ignoring replay");
            return None;
        }
        // Gate first, then navigate: replays can never open twice.
        session.has_opened_report = true;
        Some(url)
    }

    /// Tear the session down to its idle shape. Selection is operator-owned
    /// and survives.
    pub fn reset(&mut self, session: &mut RunSession) -> Result<(), ResetRefusal> {
        if session.is_running {
            return Err(ResetRefusal::RunActive);
        }
        session.logs.clear();
        session.source = None;
        session.has_opened_report = false;
        session.app_icon = None;
        session.app_title = None;
        for module in &mut session.modules {
            module.status = ModuleStatus::Pending;
        }
        self.phase = RunPhase::Idle;
        self.prompt_open = false;
        Ok(())
    }
}

/// Append a synthetic log entry through the reducer (log events never reject).
fn apply_log(session: &mut RunSession, now: &str, message: &str, severity: &str) {
    let event = SessionEvent::Log {
        message: message.to_string(),
        severity: severity.to_string(),
    };
    if let Ok(next) = reduce(session, &event, now) {
        *session = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PackageSource;
    use crate::test_support::{module, session_with_modules};

    const NOW: &str = "12:00:00";

    fn ready_session() -> RunSession {
        let mut session = session_with_modules(vec![
            module("Login", ModuleStatus::Pending, true),
            module("Dashboard", ModuleStatus::Pending, true),
        ]);
        session.source = Some(PackageSource::Staged("build-7.apk".to_string()));
        session
    }

    fn accepted() -> RunAccepted {
        RunAccepted {
            app_icon: Some("http://localhost:8000/static/icon.png".to_string()),
            app_name: Some("Field App".to_string()),
            apk_path: "/tmp/build-7.apk".to_string(),
        }
    }

    /// Preconditions are checked in order, before any request is built.
    #[test]
    fn begin_start_refuses_missing_preconditions() {
        let mut controller = RunController::new();
        let mut session = ready_session();

        let err = controller
            .begin_start(&mut session, false, NOW)
            .expect_err("driver down");
        assert_eq!(err, StartRefusal::DriverNotRunning);
        assert!(!session.is_running);

        session.source = None;
        let err = controller
            .begin_start(&mut session, true, NOW)
            .expect_err("no source");
        assert_eq!(err, StartRefusal::NoPackageSource);

        session.source = Some(PackageSource::Staged("build-7.apk".to_string()));
        for module in &mut session.modules {
            module.selected = false;
        }
        let err = controller
            .begin_start(&mut session, true, NOW)
            .expect_err("no selection");
        assert_eq!(err, StartRefusal::NoModulesSelected);
        assert_eq!(controller.phase(), RunPhase::Idle);
    }

    /// A valid start flips the session into a fresh run and yields the request.
    #[test]
    fn begin_start_transitions_to_starting() {
        let mut controller = RunController::new();
        let mut session = ready_session();

        let request = controller
            .begin_start(&mut session, true, NOW)
            .expect("start");

        assert_eq!(controller.phase(), RunPhase::Starting);
        assert!(session.is_running);
        assert_eq!(request.apk_name.as_deref(), Some("build-7.apk"));
        assert_eq!(request.tests_to_run.len(), 2);
        // Immediate operator feedback is in the fresh log.
        assert_eq!(session.logs.len(), 1);
        assert_eq!(session.logs[0].severity, "INFO");
    }

    /// A successful submission ingests display metadata and enters Running.
    #[test]
    fn finish_start_success_enters_running() {
        let mut controller = RunController::new();
        let mut session = ready_session();
        controller.begin_start(&mut session, true, NOW).expect("start");

        controller.finish_start(&mut session, Ok(accepted()), NOW);

        assert_eq!(controller.phase(), RunPhase::Running);
        assert_eq!(session.app_title.as_deref(), Some("Field App"));
        assert_eq!(session.logs.last().expect("log").severity, "SUCCESS");
        assert!(session.is_running);
    }

    /// A failed submission logs the reason and never leaves the run flag up.
    #[test]
    fn finish_start_failure_forces_not_running() {
        let mut controller = RunController::new();
        let mut session = ready_session();
        controller.begin_start(&mut session, true, NOW).expect("start");

        let err = ApiError::Rejected {
            status: reqwest::StatusCode::BAD_REQUEST,
            detail: "Download Failed: not an apk".to_string(),
        };
        controller.finish_start(&mut session, Err(err), NOW);

        assert_eq!(controller.phase(), RunPhase::Failed);
        assert!(!session.is_running);
        let last = session.logs.last().expect("log");
        assert_eq!(last.severity, "FAILED");
        assert!(last.message.contains("Download Failed"));
    }

    /// A submission completing after the operator stopped must not resurrect
    /// the run.
    #[test]
    fn finish_start_after_stop_does_not_resume() {
        let mut controller = RunController::new();
        let mut session = ready_session();
        controller.begin_start(&mut session, true, NOW).expect("start");
        controller.stop(&mut session, NOW);

        controller.finish_start(&mut session, Ok(accepted()), NOW);

        assert_eq!(controller.phase(), RunPhase::Stopped);
        assert!(!session.is_running);
    }

    /// Two RUN_COMPLETE events (reconnect replay) open the report exactly once.
    #[test]
    fn report_gate_is_one_shot() {
        let mut controller = RunController::new();
        let mut session = ready_session();
        controller.begin_start(&mut session, true, NOW).expect("start");
        controller.finish_start(&mut session, Ok(accepted()), NOW);

        let url = "http://localhost:8000/report".to_string();
        let first = controller.handle_run_complete(&mut session, Some(url.clone()), NOW);
        let second = controller.handle_run_complete(&mut session, Some(url), NOW);

        assert_eq!(first.as_deref(), Some("http://localhost:8000/report"));
        assert_eq!(second, None);
        assert!(!session.is_running);
        assert_eq!(controller.phase(), RunPhase::Completed);
    }

    /// RUN_COMPLETE without a URL never trips the gate.
    #[test]
    fn run_complete_without_url_leaves_gate_closed() {
        let mut controller = RunController::new();
        let mut session = ready_session();

        let opened = controller.handle_run_complete(&mut session, None, NOW);
        assert_eq!(opened, None);
        assert!(!session.has_opened_report);
    }

    /// Stop raises the partial-report prompt; the answer resolves it once.
    #[test]
    fn stop_prompt_resolves_once() {
        let mut controller = RunController::new();
        let mut session = ready_session();
        controller.begin_start(&mut session, true, NOW).expect("start");

        let outcome = controller.stop(&mut session, NOW);
        assert!(outcome.offer_partial_report);
        assert_eq!(controller.phase(), RunPhase::Stopped);

        assert!(controller.confirm_partial_report(true));
        // Prompt already answered: replays do nothing.
        assert!(!controller.confirm_partial_report(true));
    }

    /// Declining the prompt has no further effect.
    #[test]
    fn declining_prompt_is_inert() {
        let mut controller = RunController::new();
        let mut session = ready_session();
        controller.begin_start(&mut session, true, NOW).expect("start");
        controller.stop(&mut session, NOW);

        assert!(!controller.confirm_partial_report(false));
        assert!(!controller.confirm_partial_report(true));
    }

    /// Reset is refused while running and otherwise clears run-scoped fields,
    /// preserving selection.
    #[test]
    fn reset_clears_run_scoped_fields() {
        let mut controller = RunController::new();
        let mut session = ready_session();
        session.modules[1].selected = false;
        controller.begin_start(&mut session, true, NOW).expect("start");

        assert_eq!(
            controller.reset(&mut session).expect_err("running"),
            ResetRefusal::RunActive
        );

        controller.stop(&mut session, NOW);
        controller.reset(&mut session).expect("reset");

        assert_eq!(controller.phase(), RunPhase::Idle);
        assert!(session.logs.is_empty());
        assert_eq!(session.source, None);
        assert!(!session.has_opened_report);
        assert!(
            session
                .modules
                .iter()
                .all(|module| module.status == ModuleStatus::Pending)
        );
        assert!(session.modules[0].selected);
        assert!(!session.modules[1].selected);
    }
}
