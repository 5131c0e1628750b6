//! Serde model for the inbound push-stream envelope.
//!
//! The server emits one JSON envelope per line: `{ "type": ..., "payload":
//! ... }`. Malformed lines are dropped by returning `None`; the stream reader
//! must never crash on junk input.

use serde::Deserialize;

use crate::core::types::ModuleStatus;

/// One message from the push stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StreamMessage {
    #[serde(rename = "LOG")]
    Log {
        message: String,
        #[serde(default = "default_log_status")]
        status: String,
    },
    #[serde(rename = "MODULE")]
    Module {
        module: String,
        status: ModuleStatus,
        #[serde(default)]
        message: Option<String>,
    },
    /// Profiler samples, consumed only by the chart widget (out of scope here).
    #[serde(rename = "METRIC")]
    Metric(serde_json::Value),
    #[serde(rename = "RUN_COMPLETE")]
    RunComplete {
        #[serde(default)]
        report_url: Option<String>,
    },
}

fn default_log_status() -> String {
    "INFO".to_string()
}

/// Parse one stream line. Blank or unparseable lines yield `None`.
pub fn parse_line(line: &str) -> Option<StreamMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
