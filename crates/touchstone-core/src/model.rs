use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Category buckets for findings. Mirrors what the detection suite
/// reports and what the store counts per result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Violation,
    Warning,
    Info,
    Discovery,
    Pass,
}

impl FindingCategory {
    pub const ALL: [FindingCategory; 5] = [
        FindingCategory::Violation,
        FindingCategory::Warning,
        FindingCategory::Info,
        FindingCategory::Discovery,
        FindingCategory::Pass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCategory::Violation => "violation",
            FindingCategory::Warning => "warning",
            FindingCategory::Info => "info",
            FindingCategory::Discovery => "discovery",
            FindingCategory::Pass => "pass",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "violation" => FindingCategory::Violation,
            "warning" => FindingCategory::Warning,
            "info" => FindingCategory::Info,
            "discovery" => FindingCategory::Discovery,
            "pass" => FindingCategory::Pass,
            // Unknown categories from newer suites degrade to info rather
            // than poisoning the whole result.
            _ => FindingCategory::Info,
        }
    }
}

/// One raw finding as emitted by the detection suite. Known fields are
/// typed; everything else the suite wants to attach rides in `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFinding {
    pub issue_id: String,
    pub category: FindingCategory,
    pub touchpoint: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One persisted finding, owned by exactly one result summary. `page`
/// and `tested_at` are denormalized from the summary so page-history
/// queries never need a join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub id: i64,
    pub result_id: i64,
    pub page: String,
    pub tested_at: String,
    pub category: FindingCategory,
    pub issue_id: String,
    pub touchpoint: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryCounts {
    pub violations: u32,
    pub warnings: u32,
    pub info: u32,
    pub discovery: u32,
    pub passes: u32,
}

impl CategoryCounts {
    pub fn from_findings(findings: &[RawFinding]) -> Self {
        let mut c = CategoryCounts::default();
        for f in findings {
            c.bump(f.category);
        }
        c
    }

    pub fn bump(&mut self, cat: FindingCategory) {
        self.bump_by(cat, 1);
    }

    pub fn bump_by(&mut self, cat: FindingCategory, n: u32) {
        match cat {
            FindingCategory::Violation => self.violations += n,
            FindingCategory::Warning => self.warnings += n,
            FindingCategory::Info => self.info += n,
            FindingCategory::Discovery => self.discovery += n,
            FindingCategory::Pass => self.passes += n,
        }
    }

    pub fn get(&self, cat: FindingCategory) -> u32 {
        match cat {
            FindingCategory::Violation => self.violations,
            FindingCategory::Warning => self.warnings,
            FindingCategory::Info => self.info,
            FindingCategory::Discovery => self.discovery,
            FindingCategory::Pass => self.passes,
        }
    }

    pub fn total(&self) -> u32 {
        self.violations + self.warnings + self.info + self.discovery + self.passes
    }
}

/// One interaction performed while reaching a state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub selector: String,
    pub description: String,
    pub timestamp: String,
}

/// How a given state was reached. Immutable once attached to a result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageState {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts_run: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactions: Vec<InteractionRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_visible: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_hidden: Vec<String>,
    pub captured_at: String,
}

impl PageState {
    pub fn initial_load() -> Self {
        PageState {
            description: "initial load".into(),
            captured_at: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }
}

/// One per-state result as handed back by the store. The category
/// arrays are reassembled from the item table (split shape) or from the
/// embedded arrays (legacy shape); callers never see the difference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub page: String,
    pub session_id: i64,
    pub seq: u32,
    pub state: PageState,
    pub tested_at: String,
    pub duration_ms: Option<u64>,
    pub counts: CategoryCounts,
    pub has_details: bool,
    #[serde(default)]
    pub siblings: Vec<i64>,
    #[serde(default)]
    pub violations: Vec<ResultItem>,
    #[serde(default)]
    pub warnings: Vec<ResultItem>,
    #[serde(default)]
    pub info: Vec<ResultItem>,
    #[serde(default)]
    pub discovery: Vec<ResultItem>,
    #[serde(default)]
    pub passes: Vec<ResultItem>,
}

impl TestResult {
    pub fn items(&self, cat: FindingCategory) -> &[ResultItem] {
        match cat {
            FindingCategory::Violation => &self.violations,
            FindingCategory::Warning => &self.warnings,
            FindingCategory::Info => &self.info,
            FindingCategory::Discovery => &self.discovery,
            FindingCategory::Pass => &self.passes,
        }
    }
}

/// Action kind for a single script step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Click,
    TypeText,
    Wait,
    WaitForElement,
    WaitForNavigation,
    WaitForNetworkIdle,
    ScrollTo,
    SelectOption,
    Hover,
    Screenshot,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Click => "click",
            StepAction::TypeText => "type_text",
            StepAction::Wait => "wait",
            StepAction::WaitForElement => "wait_for_element",
            StepAction::WaitForNavigation => "wait_for_navigation",
            StepAction::WaitForNetworkIdle => "wait_for_network_idle",
            StepAction::ScrollTo => "scroll_to",
            StepAction::SelectOption => "select_option",
            StepAction::Hover => "hover",
            StepAction::Screenshot => "screenshot",
        }
    }

    /// Actions that operate on a target element and therefore wait for
    /// the selector before acting.
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            StepAction::Click
                | StepAction::TypeText
                | StepAction::ScrollTo
                | StepAction::SelectOption
                | StepAction::Hover
                | StepAction::WaitForElement
        )
    }
}

/// One action within a setup script. `value` may carry exactly one
/// `${ENV:NAME}` placeholder; it is resolved at execution time and never
/// persisted resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    pub action: StepAction,
    #[serde(default)]
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Per-step bound. Unset steps inherit the config-level
    /// `step_timeout_ms` setting, then the built-in default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub delay_after_ms: u64,
    #[serde(default)]
    pub screenshot: bool,
}

impl ScriptStep {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_STEP_TIMEOUT_MS))
    }
}

/// Success/failure conditions evaluated after a script runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_selectors: Vec<String>,
}

impl ScriptValidation {
    pub fn is_empty(&self) -> bool {
        self.success_selector.is_none()
            && self.success_text.is_none()
            && self.failure_selectors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptScope {
    Page,
    Site,
}

impl Default for ScriptScope {
    fn default() -> Self {
        ScriptScope::Page
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Run once per session; re-applied after page reloads so its effect
    /// (e.g. a dismissed cookie banner) persists across later states.
    OncePerSession,
    EveryTest,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        TriggerPolicy::EveryTest
    }
}

fn default_true() -> bool {
    true
}

/// A named, ordered list of steps that brings a page into a condition
/// worth auditing (dismiss a banner, open a tab, log in).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSetupScript {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub scope: ScriptScope,
    #[serde(default)]
    pub trigger: TriggerPolicy,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub steps: Vec<ScriptStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ScriptValidation>,
    #[serde(default)]
    pub test_before: bool,
    #[serde(default = "default_true")]
    pub test_after: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_visible: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_hidden: Vec<String>,
}

/// Execution statistics for a script definition. Updated by the store
/// via commutative increments, exactly once per full execution attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptStats {
    pub success_count: u64,
    pub failure_count: u64,
    pub run_count: u64,
    pub total_duration_ms: u64,
    pub last_run_at: Option<String>,
}

impl ScriptStats {
    pub fn avg_duration_ms(&self) -> Option<f64> {
        if self.run_count == 0 {
            None
        } else {
            Some(self.total_duration_ms as f64 / self.run_count as f64)
        }
    }
}

/// A direct interaction entry: click one element, wait for the declared
/// condition, audit the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub selector: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_visible: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_hidden: Vec<String>,
    /// Unset entries inherit the config-level `wait_timeout_ms`
    /// setting, then the built-in default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_ms: Option<u64>,
}

impl InteractiveElement {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms.unwrap_or(DEFAULT_WAIT_TIMEOUT_MS))
    }
}

/// One configured entry of a multi-state run, in declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AuditEntry {
    Script(PageSetupScript),
    Interaction(InteractiveElement),
}

/// What a completed (or truncated) session produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionArtifacts {
    pub session_id: i64,
    pub page: String,
    pub result_ids: Vec<i64>,
    /// Set when a reload/navigation failure cut the run short; the
    /// states already produced remain valid.
    pub truncated: Option<String>,
}
