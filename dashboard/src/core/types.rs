//! Shared deterministic types for the dashboard core.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O; the reducer and aggregator operate on them
//! as plain values.

use serde::{Deserialize, Serialize};

/// Execution status of a single test module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ModuleStatus {
    /// Uppercase label used as a log severity when a module event carries a message.
    pub fn label(self) -> &'static str {
        match self {
            ModuleStatus::Pending => "PENDING",
            ModuleStatus::Running => "RUNNING",
            ModuleStatus::Completed => "COMPLETED",
            ModuleStatus::Failed => "FAILED",
        }
    }
}

/// A named test unit bound to an execution reference (e.g. a test-suite path).
///
/// Module names are unique under case-insensitive comparison; inbound status
/// updates address modules by case-insensitive name match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub path: String,
    pub status: ModuleStatus,
    pub selected: bool,
}

/// One line of the console history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Display-formatted wall-clock time, stamped by the dispatcher.
    pub timestamp: String,
    pub message: String,
    /// Free-form classification: INFO, SUCCESS, FAILED, PROGRESS, or a module status.
    pub severity: String,
}

/// Severity of entries that collapse in place instead of appending.
pub const PROGRESS: &str = "PROGRESS";

impl LogEntry {
    pub fn is_progress(&self) -> bool {
        self.severity.eq_ignore_ascii_case(PROGRESS)
    }
}

/// Where the package under test comes from.
///
/// The two references are mutually exclusive; modeling them as one enum makes
/// "setting one clears the other" structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageSource {
    /// Remote-fetch reference (the server downloads the package).
    Url(String),
    /// Name of a package already staged on the server.
    Staged(String),
}

/// Module definition inside a variant catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    pub path: String,
}

/// A named application configuration with its default module set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    pub name: String,
    pub modules: Vec<ModuleSpec>,
}

impl Variant {
    /// Fresh module list for this variant: every module pending and selected.
    pub fn default_modules(&self) -> Vec<Module> {
        self.modules
            .iter()
            .map(|spec| Module {
                name: spec.name.clone(),
                path: spec.path.clone(),
                status: ModuleStatus::Pending,
                selected: true,
            })
            .collect()
    }
}

/// Canonical run state, mutated exclusively through the reducer and controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSession {
    /// Id of the active application variant.
    pub variant: String,
    pub modules: Vec<Module>,
    pub is_running: bool,
    /// One-shot report gate: transitions false→true at most once per run.
    pub has_opened_report: bool,
    pub source: Option<PackageSource>,
    /// Console history. Not part of the untruncated snapshot; persisted
    /// separately with bounded retention.
    pub logs: Vec<LogEntry>,
    /// Display metadata returned by run submission.
    pub app_icon: Option<String>,
    pub app_title: Option<String>,
}

impl RunSession {
    /// Initialize a session from a variant's default module list.
    pub fn for_variant(variant: &Variant) -> Self {
        Self {
            variant: variant.id.clone(),
            modules: variant.default_modules(),
            is_running: false,
            has_opened_report: false,
            source: None,
            logs: Vec::new(),
            app_icon: None,
            app_title: None,
        }
    }

    /// Modules currently selected for execution.
    pub fn selected_modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter().filter(|module| module.selected)
    }

    /// Find a module by case-insensitive name match.
    pub fn module_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules
            .iter_mut()
            .find(|module| module.name.eq_ignore_ascii_case(name))
    }
}
