//! Session snapshot storage.
//!
//! Two files under the state directory: `session.json` holds every non-log
//! field in full, `console_log.json` holds the most recent log entries up to
//! the retention bound. Splitting them keeps a noisy console from ever
//! failing the rest of the snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::types::{LogEntry, Module, PackageSource, RunSession};

/// Minimum log retention; configured values below this are raised to it.
pub const MIN_LOG_RETENTION: usize = 100;

/// Non-log session fields as persisted in `session.json`.
///
/// Field names are fixed; there is no versioning or migration path.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionSnapshot {
    variant: String,
    modules: Vec<Module>,
    is_running: bool,
    has_opened_report: bool,
    source: Option<PackageSource>,
    app_icon: Option<String>,
    app_title: Option<String>,
}

/// Store handle bound to one state directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    state_dir: PathBuf,
    log_retention: usize,
}

impl SessionStore {
    pub fn new(state_dir: impl Into<PathBuf>, log_retention: usize) -> Self {
        Self {
            state_dir: state_dir.into(),
            log_retention: log_retention.max(MIN_LOG_RETENTION),
        }
    }

    fn session_path(&self) -> PathBuf {
        self.state_dir.join("session.json")
    }

    fn log_path(&self) -> PathBuf {
        self.state_dir.join("console_log.json")
    }

    /// Persist the session, truncating log history to the retention bound.
    pub fn save(&self, session: &RunSession) -> Result<()> {
        let snapshot = SessionSnapshot {
            variant: session.variant.clone(),
            modules: session.modules.clone(),
            is_running: session.is_running,
            has_opened_report: session.has_opened_report,
            source: session.source.clone(),
            app_icon: session.app_icon.clone(),
            app_title: session.app_title.clone(),
        };
        write_json(&self.session_path(), &snapshot)?;

        let tail_start = session.logs.len().saturating_sub(self.log_retention);
        write_json(&self.log_path(), &session.logs[tail_start..])?;
        Ok(())
    }

    /// Load the persisted session, if a usable snapshot exists.
    ///
    /// Never fails: an absent or corrupt `session.json` yields `None` and the
    /// caller falls back to default initial state. A corrupt log file alone
    /// degrades to an empty history.
    pub fn load(&self) -> Option<RunSession> {
        let path = self.session_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "no session snapshot");
                return None;
            }
        };
        let snapshot: SessionSnapshot = match serde_json::from_str(&contents) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding corrupt session snapshot");
                return None;
            }
        };

        let logs = self.load_logs();
        Some(RunSession {
            variant: snapshot.variant,
            modules: snapshot.modules,
            is_running: snapshot.is_running,
            has_opened_report: snapshot.has_opened_report,
            source: snapshot.source,
            logs,
            app_icon: snapshot.app_icon,
            app_title: snapshot.app_title,
        })
    }

    fn load_logs(&self) -> Vec<LogEntry> {
        let path = self.log_path();
        let Ok(contents) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        match serde_json::from_str(&contents) {
            Ok(logs) => logs,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding corrupt console log");
                Vec::new()
            }
        }
    }
}

/// Atomically write pretty-printed JSON (temp file + rename).
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("snapshot path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(value).context("serialize snapshot")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp snapshot {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace snapshot {}", path.display()))?;
    Ok(())
}
