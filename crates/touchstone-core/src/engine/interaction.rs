use crate::errors::StepErrorKind;
use crate::model::{PageSetupScript, ScriptStep, ScriptValidation, StepAction};
use crate::page::PageHandle;
use crate::secrets::SecretResolver;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Per-step execution record. `error` carries the failure message;
/// resolved secret values never appear here.
#[derive(Debug, Clone, Serialize)]
pub struct StepLog {
    pub index: usize,
    pub action: &'static str,
    pub selector: String,
    pub success: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<StepErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "selector")]
pub enum ValidationOutcome {
    Passed,
    SuccessConditionMissing,
    FailureConditionPresent(String),
}

/// Outcome of one full script execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub script_id: String,
    pub steps: Vec<StepLog>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOutcome>,
}

/// Replays a script's steps against a page, strictly in declared order,
/// each under its own bounded timeout. Failures are recorded, not
/// thrown; the engine never touches the result store.
#[derive(Clone)]
pub struct InteractionEngine {
    secrets: SecretResolver,
}

impl InteractionEngine {
    pub fn new(secrets: SecretResolver) -> Self {
        InteractionEngine { secrets }
    }

    pub async fn execute(&self, page: &dyn PageHandle, script: &PageSetupScript) -> ExecutionReport {
        let start = Instant::now();
        let mut steps = Vec::new();
        let mut screenshots = Vec::new();
        let mut failed_step = None;

        for (index, step) in script.steps.iter().enumerate() {
            let mut log = self.run_step(page, &script.id, index, step).await;

            if step.screenshot && log.screenshot.is_none() {
                // Best-effort: a missing artifact never changes the outcome.
                match page.screenshot(&format!("{}-step{}", script.id, index)).await {
                    Ok(path) => log.screenshot = Some(path),
                    Err(e) => warn!(script = %script.id, step = index, "debug screenshot failed: {e}"),
                }
            }
            if let Some(path) = &log.screenshot {
                screenshots.push(path.clone());
            }

            debug!(
                script = %script.id,
                step = index,
                action = log.action,
                selector = %log.selector,
                success = log.success,
                elapsed_ms = log.elapsed_ms,
                "step executed"
            );

            let ok = log.success;
            steps.push(log);
            if !ok {
                // Fail-fast: remaining steps are skipped, script is failed.
                failed_step = Some(index);
                break;
            }
            if step.delay_after_ms > 0 {
                tokio::time::sleep(Duration::from_millis(step.delay_after_ms)).await;
            }
        }

        let mut success = failed_step.is_none();

        let validation = match &script.validation {
            Some(rule) if !rule.is_empty() => {
                let outcome = evaluate_validation(page, rule).await;
                if outcome != ValidationOutcome::Passed {
                    success = false;
                }
                Some(outcome)
            }
            _ => None,
        };

        ExecutionReport {
            script_id: script.id.clone(),
            steps,
            success,
            failed_step,
            duration_ms: start.elapsed().as_millis() as u64,
            screenshots,
            validation,
        }
    }

    async fn run_step(
        &self,
        page: &dyn PageHandle,
        script_id: &str,
        index: usize,
        step: &ScriptStep,
    ) -> StepLog {
        let start = Instant::now();
        let bound = step.timeout();
        let action = step.action;

        let fail = |kind: StepErrorKind, msg: String, start: Instant| StepLog {
            index,
            action: action.as_str(),
            selector: step.selector.clone(),
            success: false,
            elapsed_ms: start.elapsed().as_millis() as u64,
            error_kind: Some(kind),
            error: Some(msg),
            screenshot: None,
        };

        // Secret placeholders resolve here and live only for this step.
        let value = match step.value.as_deref() {
            Some(template) => match self.secrets.resolve(template) {
                Ok(resolved) => Some(resolved.value),
                Err(e) => return fail(StepErrorKind::ActionFailed, e.to_string(), start),
            },
            None => None,
        };

        if action.needs_target() {
            if let Err(e) = page.wait_for_selector(&step.selector, bound).await {
                let kind = if action == StepAction::WaitForElement {
                    StepErrorKind::Timeout
                } else {
                    StepErrorKind::SelectorNotFound
                };
                return fail(kind, e.to_string(), start);
            }
        }

        let remaining = bound
            .checked_sub(start.elapsed())
            .unwrap_or(Duration::from_millis(1));

        let outcome: Result<(), (StepErrorKind, String)> = match action {
            StepAction::Click => bounded(page.click(&step.selector), remaining).await,
            StepAction::TypeText => {
                bounded(
                    page.type_text(&step.selector, value.as_deref().unwrap_or("")),
                    remaining,
                )
                .await
            }
            StepAction::SelectOption => {
                bounded(
                    page.select_option(&step.selector, value.as_deref().unwrap_or("")),
                    remaining,
                )
                .await
            }
            StepAction::Hover => bounded(page.hover(&step.selector), remaining).await,
            StepAction::ScrollTo => bounded(page.scroll_to(&step.selector), remaining).await,
            StepAction::Wait => {
                tokio::time::sleep(bound).await;
                Ok(())
            }
            // The wait above already proved the element is present.
            StepAction::WaitForElement => Ok(()),
            StepAction::WaitForNavigation => page
                .wait_for_navigation(bound)
                .await
                .map_err(|e| (StepErrorKind::NavigationFailed, e.to_string())),
            StepAction::WaitForNetworkIdle => page
                .wait_for_network_idle(bound)
                .await
                .map_err(|e| (StepErrorKind::Timeout, e.to_string())),
            StepAction::Screenshot => {
                let path = match page
                    .screenshot(&format!("{}-step{}", script_id, index))
                    .await
                {
                    Ok(p) => Some(p),
                    Err(e) => {
                        warn!(script = %script_id, step = index, "screenshot failed: {e}");
                        None
                    }
                };
                return StepLog {
                    index,
                    action: action.as_str(),
                    selector: step.selector.clone(),
                    success: true,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    error_kind: None,
                    error: None,
                    screenshot: path,
                };
            }
        };

        match outcome {
            Ok(()) => StepLog {
                index,
                action: action.as_str(),
                selector: step.selector.clone(),
                success: true,
                elapsed_ms: start.elapsed().as_millis() as u64,
                error_kind: None,
                error: None,
                screenshot: None,
            },
            Err((kind, msg)) => fail(kind, msg, start),
        }
    }
}

async fn bounded<F>(fut: F, bound: Duration) -> Result<(), (StepErrorKind, String)>
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    match timeout(bound, fut).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err((StepErrorKind::ActionFailed, e.to_string())),
        Err(_) => Err((
            StepErrorKind::Timeout,
            format!("action did not complete within {}ms", bound.as_millis()),
        )),
    }
}

async fn evaluate_validation(page: &dyn PageHandle, rule: &ScriptValidation) -> ValidationOutcome {
    for selector in &rule.failure_selectors {
        if page.is_visible(selector).await.unwrap_or(false) {
            return ValidationOutcome::FailureConditionPresent(selector.clone());
        }
    }

    if let Some(selector) = &rule.success_selector {
        if !page.is_visible(selector).await.unwrap_or(false) {
            return ValidationOutcome::SuccessConditionMissing;
        }
        if let Some(needle) = &rule.success_text {
            let text = page.text_content(selector).await.ok().flatten();
            if !text.map(|t| t.contains(needle.as_str())).unwrap_or(false) {
                return ValidationOutcome::SuccessConditionMissing;
            }
        }
    }

    ValidationOutcome::Passed
}
