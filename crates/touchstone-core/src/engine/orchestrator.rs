use crate::detect::{DetectOptions, DetectionSuite};
use crate::engine::interaction::{ExecutionReport, InteractionEngine};
use crate::engine::validator;
use crate::model::{
    AuditEntry, FindingCategory, InteractionRecord, InteractiveElement, PageSetupScript, PageState,
    RawFinding, SessionArtifacts, TriggerPolicy,
};
use crate::page::PageHandle;
use crate::storage::store::Store;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Sequences initial load, configured scripts, and configured
/// interactive elements into a series of states, runs the detection
/// suite once per state, and links the persisted results together.
///
/// The orchestrator is the sole writer to the result store; states
/// within a session execute strictly sequentially because each depends
/// on DOM side effects of the previous one.
pub struct Orchestrator {
    pub store: Store,
    pub suite: Arc<dyn DetectionSuite>,
    pub engine: InteractionEngine,
    pub options: DetectOptions,
}

impl Orchestrator {
    pub async fn run(
        &self,
        page: &dyn PageHandle,
        page_ref: &str,
        entries: &[AuditEntry],
    ) -> anyhow::Result<SessionArtifacts> {
        let session_id = self.store.create_session(page_ref)?;
        let mut result_ids: Vec<i64> = Vec::new();
        let mut seq: u32 = 0;
        let mut truncated: Option<String> = None;

        // State 0: the page exactly as loaded.
        let rid = self
            .capture_state(
                page,
                page_ref,
                session_id,
                &mut seq,
                PageState::initial_load(),
                Vec::new(),
            )
            .await?;
        result_ids.push(rid);

        // Whether the current page condition is already covered by the
        // previously persisted state; drives test_before dedup.
        let mut condition_covered = true;
        // Once-per-session scripts that succeeded; re-applied after
        // reloads so their effect persists across later states.
        let mut session_scripts: Vec<PageSetupScript> = Vec::new();

        for entry in entries {
            match entry {
                AuditEntry::Script(script) => {
                    if !script.enabled {
                        debug!(script = %script.id, "skipping disabled script");
                        continue;
                    }

                    if script.test_before && !condition_covered {
                        let state = PageState {
                            description: format!("before script '{}'", script.name),
                            captured_at: chrono::Utc::now().to_rfc3339(),
                            ..Default::default()
                        };
                        let rid = self
                            .capture_state(page, page_ref, session_id, &mut seq, state, Vec::new())
                            .await?;
                        result_ids.push(rid);
                    }

                    let report = self.engine.execute(page, script).await;
                    // Exactly one stat update per full execution attempt.
                    self.store
                        .bump_script_stats(script, report.success, report.duration_ms)?;

                    if script.trigger == TriggerPolicy::OncePerSession && report.success {
                        session_scripts.push(script.clone());
                    }

                    let discrepancies = validator::validate(
                        page,
                        &script.expected_visible,
                        &script.expected_hidden,
                    )
                    .await?;

                    if script.test_after {
                        let description = if report.success {
                            format!("after script '{}'", script.name)
                        } else {
                            format!("after script '{}' (execution failed)", script.name)
                        };

                        let mut extra: Vec<RawFinding> = discrepancies
                            .into_iter()
                            .map(|d| d.into_finding(&description))
                            .collect();
                        if !report.success {
                            // A failed setup is itself a reportable
                            // condition; detection still runs against it.
                            extra.push(script_failure_finding(script, &report));
                        }

                        let state = PageState {
                            description,
                            scripts_run: vec![script.id.clone()],
                            expected_visible: script.expected_visible.clone(),
                            expected_hidden: script.expected_hidden.clone(),
                            captured_at: chrono::Utc::now().to_rfc3339(),
                            ..Default::default()
                        };
                        let rid = self
                            .capture_state(page, page_ref, session_id, &mut seq, state, extra)
                            .await?;
                        result_ids.push(rid);
                        condition_covered = true;
                    } else {
                        if !discrepancies.is_empty() {
                            warn!(
                                script = %script.id,
                                count = discrepancies.len(),
                                "state discrepancies with no state to attach (test_after=false)"
                            );
                        }
                        condition_covered = false;
                    }
                }

                AuditEntry::Interaction(element) => {
                    // Direct interactions start from a clean baseline.
                    if let Err(e) = page.reload().await {
                        truncated =
                            Some(format!("reload before '{}' failed: {}", element.selector, e));
                        warn!(selector = %element.selector, "aborting remaining entries: {e}");
                        break;
                    }
                    for script in &session_scripts {
                        let report = self.engine.execute(page, script).await;
                        self.store
                            .bump_script_stats(script, report.success, report.duration_ms)?;
                        if !report.success {
                            warn!(script = %script.id, "session script re-application failed");
                        }
                    }

                    let rid = self
                        .run_interaction(page, page_ref, session_id, &mut seq, element)
                        .await?;
                    result_ids.push(rid);
                    condition_covered = true;
                }
            }
        }

        self.store.link_session_results(&result_ids)?;
        self.store
            .finalize_session(session_id, truncated.as_deref())?;

        Ok(SessionArtifacts {
            session_id,
            page: page_ref.to_string(),
            result_ids,
            truncated,
        })
    }

    async fn run_interaction(
        &self,
        page: &dyn PageHandle,
        page_ref: &str,
        session_id: i64,
        seq: &mut u32,
        element: &InteractiveElement,
    ) -> anyhow::Result<i64> {
        let bound = element.wait_timeout();
        let mut extra: Vec<RawFinding> = Vec::new();

        let clicked = match page.wait_for_selector(&element.selector, bound).await {
            Ok(()) => match page.click(&element.selector).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(selector = %element.selector, "interaction click failed: {e}");
                    false
                }
            },
            Err(e) => {
                warn!(selector = %element.selector, "interaction target unavailable: {e}");
                false
            }
        };

        if clicked {
            // Bounded wait for the declared condition; anything still
            // missing surfaces as a validator discrepancy below.
            for selector in &element.expected_visible {
                let _ = page.wait_for_selector(selector, bound).await;
            }
        } else {
            extra.push(interaction_failure_finding(element));
        }

        let label = if element.description.is_empty() {
            element.selector.clone()
        } else {
            element.description.clone()
        };
        let description = format!("after interacting with '{}'", label);

        let discrepancies =
            validator::validate(page, &element.expected_visible, &element.expected_hidden).await?;
        extra.extend(
            discrepancies
                .into_iter()
                .map(|d| d.into_finding(&description)),
        );

        let now = chrono::Utc::now().to_rfc3339();
        let state = PageState {
            description,
            interactions: vec![InteractionRecord {
                selector: element.selector.clone(),
                description: element.description.clone(),
                timestamp: now.clone(),
            }],
            expected_visible: element.expected_visible.clone(),
            expected_hidden: element.expected_hidden.clone(),
            captured_at: now,
            ..Default::default()
        };

        self.capture_state(page, page_ref, session_id, seq, state, extra)
            .await
    }

    /// Runs detection against the current condition and persists the
    /// next state in sequence. `extra` carries validator discrepancies
    /// and failure findings to merge into the same result.
    async fn capture_state(
        &self,
        page: &dyn PageHandle,
        page_ref: &str,
        session_id: i64,
        seq: &mut u32,
        state: PageState,
        extra: Vec<RawFinding>,
    ) -> anyhow::Result<i64> {
        let start = Instant::now();
        let mut findings = self.suite.detect(page, &self.options).await?;
        findings.extend(extra);
        let duration_ms = start.elapsed().as_millis() as u64;

        let result_id = self.store.create_result(
            page_ref,
            session_id,
            *seq,
            &state,
            Some(duration_ms),
            &findings,
        )?;
        debug!(
            session = session_id,
            seq = *seq,
            result = result_id,
            findings = findings.len(),
            state = %state.description,
            "state persisted"
        );
        *seq += 1;
        Ok(result_id)
    }
}

fn script_failure_finding(script: &PageSetupScript, report: &ExecutionReport) -> RawFinding {
    RawFinding {
        issue_id: "setup-script/execution-failed".to_string(),
        category: FindingCategory::Warning,
        touchpoint: "setup-script".to_string(),
        location: script.id.clone(),
        snippet: String::new(),
        metadata: serde_json::json!({
            "script": script.name,
            "failed_step": report.failed_step,
            "validation": report.validation,
        }),
    }
}

fn interaction_failure_finding(element: &InteractiveElement) -> RawFinding {
    RawFinding {
        issue_id: "interaction/element-unavailable".to_string(),
        category: FindingCategory::Warning,
        touchpoint: "interaction".to_string(),
        location: element.selector.clone(),
        snippet: String::new(),
        metadata: serde_json::Value::Null,
    }
}
