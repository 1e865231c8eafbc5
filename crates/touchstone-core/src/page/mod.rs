use async_trait::async_trait;
use std::time::Duration;

pub mod fake;
pub mod replay;

/// Handle on one live page, owned exclusively by one session.
///
/// Real implementations drive a browser; `fake::FakePage` drives an
/// in-memory model for tests and offline replay. Visibility is
/// rendered-box based: an element that exists but occupies no rendered
/// area is not visible.
#[async_trait]
pub trait PageHandle: Send + Sync {
    fn page_ref(&self) -> String;

    async fn click(&self, selector: &str) -> anyhow::Result<()>;
    async fn type_text(&self, selector: &str, text: &str) -> anyhow::Result<()>;
    async fn select_option(&self, selector: &str, value: &str) -> anyhow::Result<()>;
    async fn hover(&self, selector: &str) -> anyhow::Result<()>;
    async fn scroll_to(&self, selector: &str) -> anyhow::Result<()>;

    /// Wait until `selector` exists in the document, bounded by `timeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<()>;
    async fn wait_for_navigation(&self, timeout: Duration) -> anyhow::Result<()>;
    async fn wait_for_network_idle(&self, timeout: Duration) -> anyhow::Result<()>;

    /// Reload back to the clean baseline of the page.
    async fn reload(&self) -> anyhow::Result<()>;

    /// Best-effort screenshot; returns a path/URL into the external
    /// artifact area.
    async fn screenshot(&self, label: &str) -> anyhow::Result<String>;

    async fn exists(&self, selector: &str) -> anyhow::Result<bool>;
    async fn is_visible(&self, selector: &str) -> anyhow::Result<bool>;
    async fn text_content(&self, selector: &str) -> anyhow::Result<Option<String>>;
}
