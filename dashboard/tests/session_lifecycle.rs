//! Full lifecycle tests for the dashboard event queue.
//!
//! These drive the dispatcher through complete runs with synthetic stream
//! events and REST completions: start → module flow → completion → report
//! gate, plus the stop and reset paths, verifying persistence after every
//! committed transition.

use dashboard::core::status::ConsoleStatus;
use dashboard::core::types::{ModuleStatus, PackageSource};
use dashboard::core::wire::StreamMessage;
use dashboard::dispatch::{Dashboard, DashboardEvent, OperatorAction};
use dashboard::io::api::RunAccepted;
use dashboard::io::config::DashboardConfig;
use dashboard::io::poller::HealthUpdate;
use dashboard::io::session_store::SessionStore;

fn new_dashboard(temp: &tempfile::TempDir) -> Dashboard {
    let config = DashboardConfig::default();
    let store = SessionStore::new(temp.path(), config.log_retention);
    Dashboard::new(config, store).expect("dashboard")
}

fn module_event(name: &str, status: ModuleStatus, message: Option<&str>) -> DashboardEvent {
    DashboardEvent::Stream(StreamMessage::Module {
        module: name.to_string(),
        status,
        message: message.map(str::to_string),
    })
}

fn accepted() -> RunAccepted {
    RunAccepted {
        app_icon: None,
        app_name: Some("Field App".to_string()),
        apk_path: "/srv/apks/build-7.apk".to_string(),
    }
}

/// Happy path: start → both modules complete → RUN_COMPLETE opens the report
/// once, replay is ignored, and the final state survives a reload.
#[tokio::test]
async fn full_run_completes_and_opens_report_once() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut dashboard = new_dashboard(&temp);

    dashboard.handle_event(DashboardEvent::Health(HealthUpdate::Driver { running: true }));
    dashboard.handle_event(DashboardEvent::Action(OperatorAction::SetStagedPackage(
        "build-7.apk".to_string(),
    )));
    dashboard.handle_event(DashboardEvent::Action(OperatorAction::Start));
    assert!(dashboard.session().is_running);

    dashboard.handle_event(DashboardEvent::RunSubmitted(Ok(accepted())));
    assert_eq!(dashboard.session().app_title.as_deref(), Some("Field App"));

    dashboard.handle_event(module_event("Login", ModuleStatus::Running, Some("started")));
    assert_eq!(dashboard.console_status(), ConsoleStatus::Running);

    dashboard.handle_event(module_event("Login", ModuleStatus::Completed, None));
    // Onboarding is still selected and pending, so the run stays live.
    assert!(dashboard.session().is_running);

    dashboard.handle_event(module_event("Onboarding", ModuleStatus::Completed, None));
    assert!(!dashboard.session().is_running);

    let complete = || {
        DashboardEvent::Stream(StreamMessage::RunComplete {
            report_url: Some("http://localhost:8000/report".to_string()),
        })
    };
    dashboard.handle_event(complete());
    assert!(dashboard.session().has_opened_report);
    dashboard.handle_event(complete());
    assert!(dashboard.session().has_opened_report);

    assert_eq!(dashboard.console_status(), ConsoleStatus::Success);

    // A fresh dashboard over the same store rehydrates the finished run.
    drop(dashboard);
    let reloaded = new_dashboard(&temp);
    assert!(!reloaded.session().is_running);
    assert!(reloaded.session().has_opened_report);
    assert_eq!(
        reloaded.session().source,
        Some(PackageSource::Staged("build-7.apk".to_string()))
    );
    assert_eq!(reloaded.session().modules[0].status, ModuleStatus::Completed);
}

/// Stopping a run fails the in-flight module, the aggregate signal reads
/// failure, and a late submission completion does not resurrect the run.
#[tokio::test]
async fn stop_fails_inflight_work_and_stays_down() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut dashboard = new_dashboard(&temp);

    dashboard.handle_event(DashboardEvent::Health(HealthUpdate::Driver { running: true }));
    dashboard.handle_event(DashboardEvent::Action(OperatorAction::SetSourceUrl(
        "https://example.com/build.apk".to_string(),
    )));
    dashboard.handle_event(DashboardEvent::Action(OperatorAction::Start));
    dashboard.handle_event(module_event("Login", ModuleStatus::Running, None));

    dashboard.handle_event(DashboardEvent::Action(OperatorAction::Stop));
    assert!(!dashboard.session().is_running);
    assert_eq!(dashboard.session().modules[0].status, ModuleStatus::Failed);
    assert_eq!(dashboard.console_status(), ConsoleStatus::Failure);

    // The submission settles after the stop; state must not come back up.
    dashboard.handle_event(DashboardEvent::RunSubmitted(Ok(accepted())));
    assert!(!dashboard.session().is_running);

    // Declining the partial-report prompt is inert.
    dashboard.handle_event(DashboardEvent::Action(OperatorAction::ConfirmPartialReport(
        false,
    )));
    assert!(!dashboard.session().has_opened_report);
}

/// Reset clears run-scoped fields but keeps the operator's selection, and the
/// cleared snapshot is what a reload sees.
#[tokio::test]
async fn reset_clears_persisted_state() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut dashboard = new_dashboard(&temp);

    dashboard.handle_event(DashboardEvent::Action(OperatorAction::ToggleSelection(1)));
    dashboard.handle_event(DashboardEvent::Action(OperatorAction::SetStagedPackage(
        "build-7.apk".to_string(),
    )));
    dashboard.handle_event(module_event("Login", ModuleStatus::Failed, Some("boom")));

    dashboard.handle_event(DashboardEvent::Action(OperatorAction::Reset));
    assert!(dashboard.session().logs.is_empty());
    assert_eq!(dashboard.session().source, None);
    assert_eq!(dashboard.session().modules[0].status, ModuleStatus::Pending);
    assert!(!dashboard.session().modules[1].selected);

    drop(dashboard);
    let reloaded = new_dashboard(&temp);
    assert!(reloaded.session().logs.is_empty());
    assert_eq!(reloaded.session().source, None);
    assert!(!reloaded.session().modules[1].selected);
}

/// Switching variants while idle replaces the module set; switching while a
/// run is live is ignored.
#[tokio::test]
async fn variant_switch_only_while_idle() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut dashboard = new_dashboard(&temp);

    dashboard.handle_event(DashboardEvent::Action(OperatorAction::SwitchVariant(
        "farmer".to_string(),
    )));
    assert_eq!(dashboard.session().variant, "farmer");

    dashboard.handle_event(module_event("Login", ModuleStatus::Running, None));
    dashboard.handle_event(DashboardEvent::Action(OperatorAction::SwitchVariant(
        "client".to_string(),
    )));
    assert_eq!(dashboard.session().variant, "farmer");
}
