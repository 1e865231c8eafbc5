use super::PageHandle;
use crate::model::RawFinding;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One element in the scripted page model.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    /// Occupies a non-empty rendered box. An element can exist in the
    /// document while CSS-hidden (`visible: false`).
    pub visible: bool,
    pub text: Option<String>,
    /// Element is absent from the document until this many ms after
    /// load/reload. Models async widgets.
    pub appear_after_ms: Option<u64>,
    /// Findings the annotation suite reports while this element is
    /// visible.
    pub findings: Vec<RawFinding>,
}

impl ElementSpec {
    pub fn visible() -> Self {
        ElementSpec {
            visible: true,
            ..Default::default()
        }
    }

    pub fn hidden() -> Self {
        ElementSpec::default()
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_findings(mut self, findings: Vec<RawFinding>) -> Self {
        self.findings = findings;
        self
    }

    pub fn appearing_after_ms(mut self, ms: u64) -> Self {
        self.appear_after_ms = Some(ms);
        self
    }
}

/// Side effect of clicking an element.
#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// Give the target a rendered box (insert it if absent).
    Show(String),
    /// Keep the target in the document but collapse its rendered box.
    Hide(String),
    /// Remove the target from the document entirely.
    Remove(String),
    /// Navigate to a new URL.
    Navigate(String),
}

/// Scripted DOM-ish model behind [`FakePage`]. Shared with the
/// annotation detection suite so findings track visibility.
#[derive(Debug, Clone, Default)]
pub struct PageModel {
    pub url: String,
    pub elements: HashMap<String, ElementSpec>,
    pub on_click: HashMap<String, Vec<ClickEffect>>,
    /// Simulate an unreachable page on the next reload.
    pub fail_reload: bool,
    /// (selector, text) pairs recorded by `type_text`; survives reloads
    /// so tests can assert on what was actually typed.
    pub typed: Vec<(String, String)>,
    pub screenshots: Vec<String>,
    navigation_pending: bool,
}

impl PageModel {
    pub fn new(url: &str) -> Self {
        PageModel {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn element(mut self, selector: &str, spec: ElementSpec) -> Self {
        self.elements.insert(selector.to_string(), spec);
        self
    }

    pub fn on_click(mut self, selector: &str, effects: Vec<ClickEffect>) -> Self {
        self.on_click.insert(selector.to_string(), effects);
        self
    }

    fn in_document(&self, selector: &str, elapsed: Duration) -> bool {
        match self.elements.get(selector) {
            None => false,
            Some(spec) => match spec.appear_after_ms {
                Some(ms) => elapsed >= Duration::from_millis(ms),
                None => true,
            },
        }
    }

    /// Findings for everything currently rendered.
    pub fn visible_findings(&self, elapsed: Duration) -> Vec<RawFinding> {
        let mut out = Vec::new();
        let mut selectors: Vec<&String> = self.elements.keys().collect();
        selectors.sort();
        for sel in selectors {
            let spec = &self.elements[sel];
            if spec.visible && self.in_document(sel, elapsed) {
                out.extend(spec.findings.iter().cloned());
            }
        }
        out
    }
}

/// In-memory page handle for tests and offline replay runs.
#[derive(Clone)]
pub struct FakePage {
    baseline: Arc<PageModel>,
    model: Arc<Mutex<PageModel>>,
    loaded_at: Arc<Mutex<Instant>>,
}

impl FakePage {
    pub fn new(model: PageModel) -> Self {
        FakePage {
            baseline: Arc::new(model.clone()),
            model: Arc::new(Mutex::new(model)),
            loaded_at: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn model(&self) -> Arc<Mutex<PageModel>> {
        self.model.clone()
    }

    pub fn elapsed_since_load(&self) -> Duration {
        self.loaded_at.lock().unwrap().elapsed()
    }

    fn elapsed(&self) -> Duration {
        self.loaded_at.lock().unwrap().elapsed()
    }

    fn require_present(&self, selector: &str) -> anyhow::Result<()> {
        let m = self.model.lock().unwrap();
        if m.in_document(selector, self.elapsed()) {
            Ok(())
        } else {
            anyhow::bail!("no element matches selector '{}'", selector)
        }
    }

    fn apply_click_effects(&self, selector: &str) {
        let mut m = self.model.lock().unwrap();
        let effects = m.on_click.get(selector).cloned().unwrap_or_default();
        for effect in effects {
            match effect {
                ClickEffect::Show(target) => {
                    m.elements
                        .entry(target)
                        .or_insert_with(ElementSpec::hidden)
                        .visible = true;
                }
                ClickEffect::Hide(target) => {
                    if let Some(spec) = m.elements.get_mut(&target) {
                        spec.visible = false;
                    }
                }
                ClickEffect::Remove(target) => {
                    m.elements.remove(&target);
                }
                ClickEffect::Navigate(url) => {
                    m.url = url;
                    m.navigation_pending = true;
                }
            }
        }
    }
}

#[async_trait]
impl PageHandle for FakePage {
    fn page_ref(&self) -> String {
        self.model.lock().unwrap().url.clone()
    }

    async fn click(&self, selector: &str) -> anyhow::Result<()> {
        self.require_present(selector)?;
        self.apply_click_effects(selector);
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> anyhow::Result<()> {
        self.require_present(selector)?;
        self.model
            .lock()
            .unwrap()
            .typed
            .push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> anyhow::Result<()> {
        self.require_present(selector)?;
        self.model
            .lock()
            .unwrap()
            .typed
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn hover(&self, selector: &str) -> anyhow::Result<()> {
        self.require_present(selector)
    }

    async fn scroll_to(&self, selector: &str) -> anyhow::Result<()> {
        self.require_present(selector)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.require_present(selector).is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                anyhow::bail!(
                    "timed out after {}ms waiting for '{}'",
                    timeout.as_millis(),
                    selector
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut m = self.model.lock().unwrap();
                if m.navigation_pending {
                    m.navigation_pending = false;
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                anyhow::bail!("no navigation within {}ms", timeout.as_millis());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> anyhow::Result<()> {
        // The model has no network; one tick keeps ordering realistic.
        tokio::time::sleep(POLL_INTERVAL).await;
        Ok(())
    }

    async fn reload(&self) -> anyhow::Result<()> {
        {
            let mut m = self.model.lock().unwrap();
            if m.fail_reload {
                anyhow::bail!("net::ERR_CONNECTION_RESET while reloading {}", m.url);
            }
            let typed = std::mem::take(&mut m.typed);
            let screenshots = std::mem::take(&mut m.screenshots);
            *m = (*self.baseline).clone();
            m.typed = typed;
            m.screenshots = screenshots;
        }
        *self.loaded_at.lock().unwrap() = Instant::now();
        Ok(())
    }

    async fn screenshot(&self, label: &str) -> anyhow::Result<String> {
        let path = format!("artifacts/{}.png", label);
        self.model.lock().unwrap().screenshots.push(path.clone());
        Ok(path)
    }

    async fn exists(&self, selector: &str) -> anyhow::Result<bool> {
        let m = self.model.lock().unwrap();
        Ok(m.in_document(selector, self.elapsed()))
    }

    async fn is_visible(&self, selector: &str) -> anyhow::Result<bool> {
        let m = self.model.lock().unwrap();
        let elapsed = self.elapsed();
        Ok(m.in_document(selector, elapsed)
            && m.elements.get(selector).map(|s| s.visible).unwrap_or(false))
    }

    async fn text_content(&self, selector: &str) -> anyhow::Result<Option<String>> {
        let m = self.model.lock().unwrap();
        if !m.in_document(selector, self.elapsed()) {
            return Ok(None);
        }
        Ok(m.elements.get(selector).and_then(|s| s.text.clone()))
    }
}
