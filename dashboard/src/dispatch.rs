//! The single logical event queue.
//!
//! Four sources feed one `mpsc` channel: the push-stream reader, the health
//! poller, REST completion callbacks, and operator actions. Each event is
//! applied fully (read, reduce, persist) before the next is processed, so the
//! reducer never observes a partial transition and no locking is needed.

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::controller::RunController;
use crate::core::reducer::{SessionEvent, reduce};
use crate::core::status::{ConsoleStatus, derive_console_status};
use crate::core::types::{PackageSource, RunSession};
use crate::core::wire::StreamMessage;
use crate::io::api::{ApiClient, ApiError, RunAccepted};
use crate::io::config::DashboardConfig;
use crate::io::poller::{self, HealthSnapshot, HealthUpdate, PollerHandle};
use crate::io::session_store::SessionStore;
use crate::io::stream;

/// Direct operator UI actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorAction {
    Start,
    Stop,
    Reset,
    ToggleSelection(usize),
    SwitchVariant(String),
    SetSourceUrl(String),
    SetStagedPackage(String),
    ClearSource,
    ConfirmPartialReport(bool),
    /// Ask the server to start or stop the automation driver.
    StartDriver,
    StopDriver,
    /// List packages already staged on the server.
    ListStagedPackages,
}

/// Everything that can enter the queue.
#[derive(Debug)]
pub enum DashboardEvent {
    /// Parsed push-stream message.
    Stream(StreamMessage),
    /// Operator action.
    Action(OperatorAction),
    /// Completion of an outstanding run submission.
    RunSubmitted(Result<RunAccepted, ApiError>),
    /// Synthetic log line from a best-effort call's completion.
    Log { message: String, severity: String },
    /// Health probe result.
    Health(HealthUpdate),
    /// Tear the dashboard down.
    Shutdown,
}

pub struct Dashboard {
    config: DashboardConfig,
    session: RunSession,
    health: HealthSnapshot,
    controller: RunController,
    store: SessionStore,
    api: ApiClient,
    tx: UnboundedSender<DashboardEvent>,
    rx: UnboundedReceiver<DashboardEvent>,
    poller: Option<PollerHandle>,
    stream_task: Option<JoinHandle<()>>,
    /// Console lines already printed; reset when the history is cleared.
    printed: usize,
    last_status: ConsoleStatus,
}

impl Dashboard {
    /// Build the dashboard, rehydrating the session from the store.
    ///
    /// A persisted snapshot is reused only when its variant matches the
    /// configured active variant; reloading with the same variant preserves
    /// selection and statuses, switching re-initializes from the catalog.
    pub fn new(config: DashboardConfig, store: SessionStore) -> Result<Self> {
        let active = config
            .variant(&config.active_variant)
            .with_context(|| format!("unknown active variant '{}'", config.active_variant))?
            .clone();

        let session = match store.load() {
            Some(saved) if saved.variant == active.id => {
                info!(variant = %active.id, "rehydrated session from snapshot");
                saved
            }
            _ => RunSession::for_variant(&active),
        };

        let api = ApiClient::new(config.base_url.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let last_status = derive_console_status(&session);
        Ok(Self {
            config,
            session,
            health: HealthSnapshot::default(),
            controller: RunController::new(),
            store,
            api,
            tx,
            rx,
            poller: None,
            stream_task: None,
            printed: 0,
            last_status,
        })
    }

    /// Sender for operator actions and background tasks.
    pub fn sender(&self) -> UnboundedSender<DashboardEvent> {
        self.tx.clone()
    }

    pub fn session(&self) -> &RunSession {
        &self.session
    }

    pub fn health(&self) -> HealthSnapshot {
        self.health
    }

    pub fn console_status(&self) -> ConsoleStatus {
        derive_console_status(&self.session)
    }

    /// Start the poller and stream reader feeding the queue.
    pub fn connect(&mut self) {
        let poll_interval = std::time::Duration::from_secs(self.config.poll_interval_secs);
        self.poller = Some(poller::spawn(
            self.api.clone(),
            poll_interval,
            self.tx.clone(),
        ));
        self.stream_task = Some(stream::spawn(
            self.config.base_url.clone(),
            std::time::Duration::from_secs(self.config.stream_reconnect_secs),
            self.tx.clone(),
        ));
    }

    /// Process events until shutdown.
    pub async fn run(&mut self) {
        while let Some(event) = self.rx.recv().await {
            if matches!(event, DashboardEvent::Shutdown) {
                break;
            }
            self.handle_event(event);
            self.render();
        }
        self.teardown();
    }

    /// Apply one event: read, reduce, persist.
    pub fn handle_event(&mut self, event: DashboardEvent) {
        let now = timestamp();
        match event {
            DashboardEvent::Stream(message) => self.handle_stream(message, &now),
            DashboardEvent::Action(action) => self.handle_action(action, &now),
            DashboardEvent::RunSubmitted(result) => {
                self.controller.finish_start(&mut self.session, result, &now);
                self.persist();
            }
            DashboardEvent::Log { message, severity } => {
                self.apply(&SessionEvent::Log { message, severity }, &now);
            }
            DashboardEvent::Health(update) => {
                // Presentation state only; not part of the persisted session.
                self.health.apply(update);
            }
            DashboardEvent::Shutdown => {}
        }
    }

    fn handle_stream(&mut self, message: StreamMessage, now: &str) {
        match message {
            StreamMessage::Log { message, status } => {
                self.apply(
                    &SessionEvent::Log {
                        message,
                        severity: status,
                    },
                    now,
                );
            }
            StreamMessage::Module {
                module,
                status,
                message,
            } => {
                self.apply(
                    &SessionEvent::ModuleStatus {
                        module,
                        status,
                        message,
                    },
                    now,
                );
            }
            // Consumed only by the chart widget, which is not part of this client.
            StreamMessage::Metric(_) => {}
            StreamMessage::RunComplete { report_url } => {
                let opened =
                    self.controller
                        .handle_run_complete(&mut self.session, report_url, now);
                if let Some(url) = opened {
                    info!(url = %url, "report ready");
                    println!("Report ready: {url}");
                }
                self.persist();
            }
        }
    }

    fn handle_action(&mut self, action: OperatorAction, now: &str) {
        match action {
            OperatorAction::Start => {
                match self
                    .controller
                    .begin_start(&mut self.session, self.health.driver_running, now)
                {
                    Ok(request) => {
                        self.persist();
                        let api = self.api.clone();
                        let tx = self.tx.clone();
                        tokio::spawn(async move {
                            let result = api.submit_run(&request).await;
                            let _ = tx.send(DashboardEvent::RunSubmitted(result));
                        });
                    }
                    Err(refusal) => {
                        warn!(%refusal, "start refused");
                        self.apply(
                            &SessionEvent::Log {
                                message: format!("Cannot start run: {refusal}"),
                                severity: "FAILED".to_string(),
                            },
                            now,
                        );
                    }
                }
            }
            OperatorAction::Stop => {
                let outcome = self.controller.stop(&mut self.session, now);
                self.persist();
                if outcome.offer_partial_report {
                    println!("Run stopped. Generate a partial report? (confirm via action)");
                }
                let api = self.api.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let (message, severity) = match api.stop_run().await {
                        Ok(body) => (format!("Stop request response: {}", body.trim()), "INFO"),
                        Err(err) => (format!("Stop request failed: {err}"), "FAILED"),
                    };
                    let _ = tx.send(DashboardEvent::Log {
                        message,
                        severity: severity.to_string(),
                    });
                });
            }
            OperatorAction::Reset => match self.controller.reset(&mut self.session) {
                Ok(()) => {
                    self.printed = 0;
                    self.persist();
                }
                Err(refusal) => warn!(%refusal, "reset refused"),
            },
            OperatorAction::ToggleSelection(index) => {
                self.apply(&SessionEvent::ToggleSelection { index }, now);
            }
            OperatorAction::SwitchVariant(id) => {
                let Some(variant) = self.config.variant(&id).cloned() else {
                    warn!(variant = %id, "unknown variant");
                    return;
                };
                self.apply(&SessionEvent::SwitchVariant { variant }, now);
            }
            OperatorAction::SetSourceUrl(url) => {
                self.apply(
                    &SessionEvent::SetSource {
                        source: Some(PackageSource::Url(url)),
                    },
                    now,
                );
            }
            OperatorAction::SetStagedPackage(name) => {
                self.apply(
                    &SessionEvent::SetSource {
                        source: Some(PackageSource::Staged(name)),
                    },
                    now,
                );
            }
            OperatorAction::ClearSource => {
                self.apply(&SessionEvent::SetSource { source: None }, now);
            }
            OperatorAction::StartDriver | OperatorAction::StopDriver => {
                let start = matches!(action, OperatorAction::StartDriver);
                let api = self.api.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = if start {
                        api.start_driver().await
                    } else {
                        api.stop_driver().await
                    };
                    let (message, severity) = match result {
                        Ok(status) => (format!("Automation driver status: {status}"), "INFO"),
                        Err(err) => (format!("Driver request failed: {err}"), "FAILED"),
                    };
                    let _ = tx.send(DashboardEvent::Log {
                        message,
                        severity: severity.to_string(),
                    });
                });
            }
            OperatorAction::ListStagedPackages => {
                let api = self.api.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let (message, severity) = match api.list_staged_packages().await {
                        Ok(apks) => (format!("Staged packages: {}", apks.join(", ")), "INFO"),
                        Err(err) => (format!("Could not list staged packages: {err}"), "FAILED"),
                    };
                    let _ = tx.send(DashboardEvent::Log {
                        message,
                        severity: severity.to_string(),
                    });
                });
            }
            OperatorAction::ConfirmPartialReport(accept) => {
                if self.controller.confirm_partial_report(accept) {
                    let api = self.api.clone();
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let (message, severity) = match api.generate_report().await {
                            Ok(()) => ("Partial report generation requested.".to_string(), "SUCCESS"),
                            Err(err) => (format!("Partial report request failed: {err}"), "FAILED"),
                        };
                        let _ = tx.send(DashboardEvent::Log {
                            message,
                            severity: severity.to_string(),
                        });
                    });
                }
            }
        }
    }

    /// Run one reducer transition and persist the committed state.
    fn apply(&mut self, event: &SessionEvent, now: &str) {
        match reduce(&self.session, event, now) {
            Ok(next) => {
                self.session = next;
                self.persist();
            }
            Err(rejection) => {
                warn!(%rejection, "event rejected");
            }
        }
    }

    fn persist(&mut self) {
        if let Err(err) = self.store.save(&self.session) {
            // Best-effort: a failed snapshot must never take the dashboard down.
            warn!(error = %err, "failed to persist session snapshot");
        }
    }

    /// Print console lines appended since the last event.
    fn render(&mut self) {
        if self.printed > self.session.logs.len() {
            self.printed = 0;
        }
        for entry in &self.session.logs[self.printed..] {
            println!("[{}] {}: {}", entry.timestamp, entry.severity, entry.message);
        }
        self.printed = self.session.logs.len();

        let status = self.console_status();
        if status != self.last_status {
            info!(?status, "console status changed");
            self.last_status = status;
        }
    }

    fn teardown(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Display-formatted wall-clock time stamped on log entries.
fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
