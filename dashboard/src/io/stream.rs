//! Push-stream reader.
//!
//! Consumes the server's event stream (one JSON envelope per line over a
//! long-lived HTTP response) and forwards parsed messages into the event
//! queue. The connection is re-established after any drop; reconnect replay
//! of messages is expected and handled downstream (reducer idempotence plus
//! the one-shot report gate).

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::wire;
use crate::dispatch::DashboardEvent;

const STREAM_PATH: &str = "/events/test-status";

/// Start the reader task. Aborted on teardown via the returned handle.
pub fn spawn(
    base_url: String,
    reconnect_delay: Duration,
    events: UnboundedSender<DashboardEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let http = reqwest::Client::new();
        let url = format!("{}{}", base_url.trim_end_matches('/'), STREAM_PATH);
        loop {
            match read_stream(&http, &url, &events).await {
                Ok(()) => info!("event stream closed by server"),
                Err(err) => warn!(error = %err, "event stream failed"),
            }
            if events.is_closed() {
                return;
            }
            tokio::time::sleep(reconnect_delay).await;
            debug!(url = %url, "reconnecting event stream");
        }
    })
}

/// Read one connection's worth of lines, forwarding each parsed envelope.
async fn read_stream(
    http: &reqwest::Client,
    url: &str,
    events: &UnboundedSender<DashboardEvent>,
) -> Result<(), reqwest::Error> {
    let response = http.get(url).send().await?.error_for_status()?;
    let mut chunks = response.bytes_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        buffer.extend_from_slice(&chunk);
        while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline).collect();
            forward_line(&line, events);
        }
    }
    // Trailing data without a newline still counts as a line.
    if !buffer.is_empty() {
        forward_line(&buffer, events);
    }
    Ok(())
}

fn forward_line(line: &[u8], events: &UnboundedSender<DashboardEvent>) {
    let Ok(text) = std::str::from_utf8(line) else {
        debug!("dropping non-utf8 stream line");
        return;
    };
    match wire::parse_line(text) {
        Some(message) => {
            let _ = events.send(DashboardEvent::Stream(message));
        }
        None => {
            if !text.trim().is_empty() {
                debug!(line = %text.trim(), "dropping unparseable stream line");
            }
        }
    }
}
