use serde::{Deserialize, Serialize};

/// Failure taxonomy for the audit core.
///
/// Step-, validation-, and script-level failures are recorded as data
/// ([`StepErrorKind`] on step logs, validation outcomes and the failed
/// step index on execution reports) rather than thrown, so the
/// orchestrator can always run detection against whatever condition
/// resulted. What callers see as `Err` is the storage path.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("result {result_id}: wrote {written} of {expected} items; detail flag left unset")]
    StorageWriteIncomplete {
        result_id: i64,
        written: usize,
        expected: usize,
    },
}

/// Error kind attached to a failed step log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    Timeout,
    SelectorNotFound,
    NavigationFailed,
    ActionFailed,
}

impl StepErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepErrorKind::Timeout => "timeout",
            StepErrorKind::SelectorNotFound => "selector_not_found",
            StepErrorKind::NavigationFailed => "navigation_failed",
            StepErrorKind::ActionFailed => "action_failed",
        }
    }
}
