//! Dashboard configuration (`dashboard.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::{ModuleSpec, Variant};

/// Dashboard configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the orchestration server.
    pub base_url: String,

    /// Health probe interval in seconds.
    pub poll_interval_secs: u64,

    /// Number of console log entries kept in the persisted snapshot.
    pub log_retention: usize,

    /// Id of the variant activated at startup.
    pub active_variant: String,

    /// Delay before the stream reader reconnects after a drop, in seconds.
    pub stream_reconnect_secs: u64,

    /// Variant catalog: each variant's default module set.
    pub variants: Vec<Variant>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            poll_interval_secs: 5,
            log_retention: 200,
            active_variant: "client".to_string(),
            stream_reconnect_secs: 2,
            variants: default_variants(),
        }
    }
}

fn default_variants() -> Vec<Variant> {
    vec![
        Variant {
            id: "client".to_string(),
            name: "Regular Client".to_string(),
            modules: vec![
                spec("Login", "tests/test_cases/regular_client_test_cases/test_login_pytest.py"),
                spec(
                    "Onboarding",
                    "tests/test_cases/regular_client_test_cases/test_onboarding_pytest.py",
                ),
            ],
        },
        Variant {
            id: "farmer".to_string(),
            name: "Regular Farmer".to_string(),
            modules: vec![
                spec("Login", "tests/test_cases/regular_farmer_test_cases/test_login_pytest.py"),
                spec(
                    "Onboarding",
                    "tests/test_cases/regular_farmer_test_cases/test_onboarding_pytest.py",
                ),
            ],
        },
    ]
}

fn spec(name: &str, path: &str) -> ModuleSpec {
    ModuleSpec {
        name: name.to_string(),
        path: path.to_string(),
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("base_url must be non-empty"));
        }
        if self.poll_interval_secs == 0 {
            return Err(anyhow!("poll_interval_secs must be > 0"));
        }
        if self.variants.is_empty() {
            return Err(anyhow!("variants must list at least one variant"));
        }
        if !self.variants.iter().any(|v| v.id == self.active_variant) {
            return Err(anyhow!(
                "active_variant '{}' is not in the variant catalog",
                self.active_variant
            ));
        }
        for variant in &self.variants {
            let mut names: Vec<String> = variant
                .modules
                .iter()
                .map(|module| module.name.to_lowercase())
                .collect();
            names.sort();
            names.dedup();
            if names.len() != variant.modules.len() {
                return Err(anyhow!(
                    "variant '{}' has duplicate module names (case-insensitive)",
                    variant.id
                ));
            }
        }
        Ok(())
    }

    /// Look up a variant by id.
    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|variant| variant.id == id)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DashboardConfig::default()`.
pub fn load_config(path: &Path) -> Result<DashboardConfig> {
    if !path.exists() {
        let cfg = DashboardConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DashboardConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, DashboardConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("dashboard.toml");
        let cfg = DashboardConfig::default();
        let contents = toml::to_string_pretty(&cfg).expect("serialize");
        fs::write(&path, contents).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn validate_rejects_unknown_active_variant() {
        let cfg = DashboardConfig {
            active_variant: "nope".to_string(),
            ..DashboardConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_module_names() {
        let mut cfg = DashboardConfig::default();
        cfg.variants[0]
            .modules
            .push(spec("login", "tests/other.py"));
        assert!(cfg.validate().is_err());
    }
}
