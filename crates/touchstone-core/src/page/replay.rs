use super::fake::{ClickEffect, ElementSpec, FakePage, PageModel};
use crate::model::RawFinding;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized page snapshot for offline runs: which elements exist,
/// what clicking them does, and which findings they carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySnapshot {
    pub url: String,
    #[serde(default)]
    pub elements: Vec<ReplayElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayElement {
    pub selector: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appear_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_click: Vec<ReplayEffect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<RawFinding>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "effect", content = "target")]
pub enum ReplayEffect {
    Show(String),
    Hide(String),
    Remove(String),
    Navigate(String),
}

impl From<ReplayEffect> for ClickEffect {
    fn from(e: ReplayEffect) -> Self {
        match e {
            ReplayEffect::Show(t) => ClickEffect::Show(t),
            ReplayEffect::Hide(t) => ClickEffect::Hide(t),
            ReplayEffect::Remove(t) => ClickEffect::Remove(t),
            ReplayEffect::Navigate(t) => ClickEffect::Navigate(t),
        }
    }
}

impl ReplaySnapshot {
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("failed to read page snapshot '{}'", path.as_ref().display())
        })?;
        serde_json::from_str(&raw).with_context(|| {
            format!("failed to parse page snapshot '{}'", path.as_ref().display())
        })
    }

    pub fn into_page(self) -> FakePage {
        let mut model = PageModel::new(&self.url);
        for el in self.elements {
            let spec = ElementSpec {
                visible: el.visible,
                text: el.text,
                appear_after_ms: el.appear_after_ms,
                findings: el.findings,
            };
            model.elements.insert(el.selector.clone(), spec);
            if !el.on_click.is_empty() {
                model.on_click.insert(
                    el.selector,
                    el.on_click.into_iter().map(ClickEffect::from).collect(),
                );
            }
        }
        FakePage::new(model)
    }
}
