use crate::model::{AuditEntry, InteractiveElement, PageSetupScript};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_timeout_ms: Option<u64>,
}

fn is_default_settings(s: &AuditSettings) -> bool {
    s == &AuditSettings::default()
}

/// One audit configuration: the page under test, its setup scripts, and
/// the interactive elements to exercise, in declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default, rename = "configVersion", alias = "version")]
    pub version: u32,
    pub page: String,
    #[serde(default, skip_serializing_if = "is_default_settings")]
    pub settings: AuditSettings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<PageSetupScript>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactions: Vec<InteractiveElement>,
}

impl AuditConfig {
    /// Entries in declared configuration order. Sequence numbers of a
    /// run are deterministic given this order.
    ///
    /// Settings-level timeouts fill in steps and interactions that do
    /// not declare their own; explicit per-entry values win.
    pub fn entries(&self) -> Vec<AuditEntry> {
        let mut out: Vec<AuditEntry> = Vec::new();
        for s in &self.scripts {
            let mut s = s.clone();
            if let Some(ms) = self.settings.step_timeout_ms {
                for step in &mut s.steps {
                    step.timeout_ms.get_or_insert(ms);
                }
            }
            out.push(AuditEntry::Script(s));
        }
        for i in &self.interactions {
            let mut i = i.clone();
            if let Some(ms) = self.settings.wait_timeout_ms {
                i.wait_timeout_ms.get_or_insert(ms);
            }
            out.push(AuditEntry::Interaction(i));
        }
        out
    }
}

pub fn load_config(path: &Path, strict: bool) -> Result<AuditConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::HashSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);

    // serde_ignored wrapper to capture unknown fields
    let cfg: AuditConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    if !ignored_keys.is_empty() {
        let meaningful: Vec<_> = ignored_keys
            .iter()
            .filter(|k| *k != "definitions" && !k.starts_with('_') && !k.starts_with("x-"))
            .collect();
        if !meaningful.is_empty() {
            if strict {
                return Err(ConfigError(format!(
                    "Unknown fields detected in strict mode: {:?} (file: {})",
                    meaningful,
                    path.display()
                )));
            }
            eprintln!("WARN: Ignored unknown config fields: {:?}", meaningful);
        }
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }

    if cfg.page.trim().is_empty() {
        return Err(ConfigError("config has no page".into()));
    }

    for script in &cfg.scripts {
        if script.steps.is_empty() {
            return Err(ConfigError(format!(
                "script '{}' has no steps",
                script.id
            )));
        }
    }

    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r##"configVersion: 1
page: "https://example.test/checkout"
settings:
  compliance_level: "AA"
scripts:
  - id: dismiss-cookies
    name: "Dismiss cookie banner"
    trigger: once_per_session
    test_before: true
    test_after: true
    expected_hidden: ["#cookie-banner"]
    steps:
      - action: click
        selector: "#cookie-accept"
        timeout_ms: 3000
interactions:
  - selector: "#open-help"
    description: "help dialog"
    expected_visible: ["#help-dialog"]
"##,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
