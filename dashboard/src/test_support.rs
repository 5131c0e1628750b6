//! Test-only helpers for constructing sessions and modules.

use crate::core::types::{Module, ModuleSpec, ModuleStatus, RunSession, Variant};

/// Create a module with the given status and selection.
pub fn module(name: &str, status: ModuleStatus, selected: bool) -> Module {
    Module {
        name: name.to_string(),
        path: format!("tests/{}.py", name.to_lowercase().replace(' ', "_")),
        status,
        selected,
    }
}

/// Create an idle session for the `client` variant with the given modules.
pub fn session_with_modules(modules: Vec<Module>) -> RunSession {
    RunSession {
        variant: "client".to_string(),
        modules,
        is_running: false,
        has_opened_report: false,
        source: None,
        logs: Vec::new(),
        app_icon: None,
        app_title: None,
    }
}

/// Create a variant whose modules are all derived from their names.
pub fn variant(id: &str, module_names: &[&str]) -> Variant {
    Variant {
        id: id.to_string(),
        name: format!("{id} variant"),
        modules: module_names
            .iter()
            .map(|name| ModuleSpec {
                name: (*name).to_string(),
                path: format!("tests/{}.py", name.to_lowercase().replace(' ', "_")),
            })
            .collect(),
    }
}
