//! Health polling for the device and the automation driver.
//!
//! Two independent probes run on a fixed interval. Each probe's failure
//! domain is isolated: a transport error or non-success response degrades
//! that probe's flag and nothing else.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::dispatch::DashboardEvent;
use crate::io::api::ApiClient;

/// Result of one probe pass, fed into the event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthUpdate {
    Device { connected: bool },
    Driver { running: bool },
}

/// Latest known probe results. Presentation state, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub device_connected: bool,
    pub driver_running: bool,
}

impl HealthSnapshot {
    pub fn apply(&mut self, update: HealthUpdate) {
        match update {
            HealthUpdate::Device { connected } => self.device_connected = connected,
            HealthUpdate::Driver { running } => self.driver_running = running,
        }
    }
}

/// Handle to a running poller; dropping the dashboard must abort it so no
/// callbacks fire against a torn-down session.
#[derive(Debug)]
pub struct PollerHandle {
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling. Both probes run once immediately, then on each tick.
pub fn spawn(
    api: ApiClient,
    interval: Duration,
    events: UnboundedSender<DashboardEvent>,
) -> PollerHandle {
    let task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;

            let connected = match api.device_status().await {
                Ok(connected) => connected,
                Err(err) => {
                    debug!(error = %err, "device probe failed");
                    false
                }
            };
            if events
                .send(DashboardEvent::Health(HealthUpdate::Device { connected }))
                .is_err()
            {
                return;
            }

            let running = match api.driver_status().await {
                Ok(status) => status.eq_ignore_ascii_case("running"),
                Err(err) => {
                    debug!(error = %err, "driver probe failed");
                    false
                }
            };
            if events
                .send(DashboardEvent::Health(HealthUpdate::Driver { running }))
                .is_err()
            {
                return;
            }
        }
    });
    PollerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_updates_are_isolated_per_probe() {
        let mut snapshot = HealthSnapshot::default();

        snapshot.apply(HealthUpdate::Device { connected: true });
        assert!(snapshot.device_connected);
        assert!(!snapshot.driver_running);

        snapshot.apply(HealthUpdate::Driver { running: true });
        snapshot.apply(HealthUpdate::Device { connected: false });
        assert!(!snapshot.device_connected);
        assert!(snapshot.driver_running);
    }
}
