use std::collections::HashMap;
use std::sync::Arc;

use touchstone_core::detect::annotations::AnnotationSuite;
use touchstone_core::detect::DetectOptions;
use touchstone_core::engine::interaction::InteractionEngine;
use touchstone_core::engine::orchestrator::Orchestrator;
use touchstone_core::model::{
    AuditEntry, FindingCategory, InteractiveElement, PageSetupScript, RawFinding, ScriptStep,
    StepAction,
};
use touchstone_core::page::fake::{ClickEffect, ElementSpec, FakePage, PageModel};
use touchstone_core::secrets::SecretResolver;
use touchstone_core::storage::store::Store;

fn violation(issue_id: &str, location: &str) -> RawFinding {
    RawFinding {
        issue_id: issue_id.to_string(),
        category: FindingCategory::Violation,
        touchpoint: issue_id.split('/').next().unwrap_or("misc").to_string(),
        location: location.to_string(),
        snippet: String::new(),
        metadata: serde_json::Value::Null,
    }
}

fn click_step(selector: &str) -> ScriptStep {
    ScriptStep {
        action: StepAction::Click,
        selector: selector.to_string(),
        value: None,
        timeout_ms: Some(1_000),
        delay_after_ms: 0,
        screenshot: false,
    }
}

fn script(id: &str, steps: Vec<ScriptStep>) -> PageSetupScript {
    PageSetupScript {
        id: id.to_string(),
        name: id.to_string(),
        scope: Default::default(),
        trigger: Default::default(),
        enabled: true,
        steps,
        validation: None,
        test_before: false,
        test_after: true,
        expected_visible: vec![],
        expected_hidden: vec![],
    }
}

fn orchestrator(store: &Store, page: &FakePage) -> Orchestrator {
    Orchestrator {
        store: store.clone(),
        suite: Arc::new(AnnotationSuite::new(page.clone())),
        engine: InteractionEngine::new(SecretResolver::fixed(HashMap::new())),
        options: DetectOptions::default(),
    }
}

/// A storefront with a cookie banner carrying its own violations, a main
/// region with unrelated ones, and two widgets that only exist after a
/// click.
fn storefront() -> PageModel {
    PageModel::new("https://shop.test")
        .element(
            "#cookie-banner",
            ElementSpec::visible().with_findings(vec![
                violation("banner/low-contrast", "#cookie-banner"),
                violation("banner/low-contrast", "#cookie-banner .legal"),
                violation("banner/no-label", "#cookie-banner button:nth-child(1)"),
                violation("banner/no-label", "#cookie-banner button:nth-child(2)"),
                violation("banner/focus-trap", "#cookie-banner"),
            ]),
        )
        .element("#cookie-accept", ElementSpec::visible())
        .on_click(
            "#cookie-accept",
            vec![ClickEffect::Hide("#cookie-banner".to_string())],
        )
        .element(
            "main",
            ElementSpec::visible().with_findings(vec![
                violation("img/missing-alt", "main img#hero"),
                violation("img/missing-alt", "main img#promo"),
                violation("form/unlabeled", "main input#search"),
            ]),
        )
        .element("#open-help", ElementSpec::visible())
        .on_click(
            "#open-help",
            vec![ClickEffect::Show("#help-dialog".to_string())],
        )
        .element(
            "#help-dialog",
            ElementSpec::hidden().with_findings(vec![violation(
                "dialog/no-accessible-name",
                "#help-dialog",
            )]),
        )
        .element("#toggle-nav", ElementSpec::visible())
        .on_click(
            "#toggle-nav",
            vec![ClickEffect::Show("#nav-menu".to_string())],
        )
        .element("#nav-menu", ElementSpec::hidden())
}

fn dismiss_cookies() -> PageSetupScript {
    let mut s = script("dismiss-cookies", vec![click_step("#cookie-accept")]);
    s.trigger = touchstone_core::model::TriggerPolicy::OncePerSession;
    // test_before is subsumed by state 0, which already covers the
    // pristine page condition.
    s.test_before = true;
    s.expected_hidden = vec!["#cookie-banner".to_string()];
    s
}

#[tokio::test]
async fn full_session_produces_linked_sequential_states() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let page = FakePage::new(storefront());
    let orch = orchestrator(&store, &page);

    let entries = vec![
        AuditEntry::Script(dismiss_cookies()),
        AuditEntry::Interaction(InteractiveElement {
            selector: "#open-help".to_string(),
            description: "open help dialog".to_string(),
            expected_visible: vec!["#help-dialog".to_string()],
            expected_hidden: vec![],
            wait_timeout_ms: Some(1_000),
        }),
        AuditEntry::Interaction(InteractiveElement {
            selector: "#toggle-nav".to_string(),
            description: String::new(),
            expected_visible: vec!["#nav-menu".to_string()],
            expected_hidden: vec![],
            wait_timeout_ms: Some(1_000),
        }),
    ];

    let artifacts = orch.run(&page, "https://shop.test", &entries).await?;
    assert!(artifacts.truncated.is_none());
    assert_eq!(artifacts.result_ids.len(), 4);

    let results: Vec<_> = artifacts
        .result_ids
        .iter()
        .map(|id| store.get_result(*id))
        .collect::<anyhow::Result<_>>()?;

    // Strictly sequential states, all in one session.
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r.seq, i as u32);
        assert_eq!(r.session_id, artifacts.session_id);
        // Each result links every other result of the session.
        let mut expected: Vec<i64> = artifacts
            .result_ids
            .iter()
            .copied()
            .filter(|id| *id != r.id)
            .collect();
        let mut got = r.siblings.clone();
        expected.sort_unstable();
        got.sort_unstable();
        assert_eq!(got, expected);
    }

    // State 0: banner (5) + main (3).
    assert_eq!(results[0].counts.violations, 8);
    assert_eq!(results[0].state.description, "initial load");

    // State 1: banner dismissed, its violations gone, main's untouched.
    assert_eq!(results[1].counts.violations, 3);
    assert_eq!(results[1].counts.warnings, 0);
    assert_eq!(results[1].state.scripts_run, vec!["dismiss-cookies"]);
    let issues: Vec<&str> = results[1]
        .violations
        .iter()
        .map(|i| i.issue_id.as_str())
        .collect();
    assert!(issues.iter().all(|i| !i.starts_with("banner/")));
    assert!(issues.contains(&"img/missing-alt"));

    // State 2: reload restored the banner, the once-per-session script
    // re-dismissed it, and the help dialog brought one new violation.
    assert_eq!(results[2].counts.violations, 4);
    assert_eq!(results[2].counts.warnings, 0);
    assert_eq!(results[2].state.interactions.len(), 1);
    assert_eq!(results[2].state.interactions[0].selector, "#open-help");
    assert!(results[2]
        .violations
        .iter()
        .any(|i| i.issue_id == "dialog/no-accessible-name"));

    // State 3: nav menu has no annotations of its own.
    assert_eq!(results[3].counts.violations, 3);
    assert!(results[3]
        .state
        .description
        .contains("#toggle-nav"));

    // One stat bump per execution: initial run plus two re-applications.
    let stats = store.get_script_stats("dismiss-cookies")?.unwrap();
    assert_eq!(stats.run_count, 3);
    assert_eq!(stats.success_count, 3);
    assert_eq!(stats.failure_count, 0);

    let session = store.get_session(artifacts.session_id)?;
    assert!(!session.truncated);
    Ok(())
}

#[tokio::test]
async fn test_before_state_appears_only_when_condition_uncovered() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let page = FakePage::new(
        PageModel::new("https://flow.test").element("#widget", ElementSpec::visible()),
    );
    let orch = orchestrator(&store, &page);

    // First script mutates without capturing (test_after=false), so the
    // second script's test_before must insert a state of its own.
    let mut quiet = script("quiet-setup", vec![click_step("#widget")]);
    quiet.test_after = false;

    let mut observed = script("observed-setup", vec![click_step("#widget")]);
    observed.test_before = true;

    let artifacts = orch
        .run(
            &page,
            "https://flow.test",
            &[
                AuditEntry::Script(quiet.clone()),
                AuditEntry::Script(observed.clone()),
            ],
        )
        .await?;

    // initial + before-observed + after-observed; nothing for quiet.
    assert_eq!(artifacts.result_ids.len(), 3);
    let descriptions: Vec<String> = artifacts
        .result_ids
        .iter()
        .map(|id| store.get_result(*id).map(|r| r.state.description))
        .collect::<anyhow::Result<_>>()?;
    assert_eq!(descriptions[0], "initial load");
    assert!(descriptions[1].starts_with("before script"));
    assert!(descriptions[2].starts_with("after script"));

    // When the page condition is still covered by the previous state,
    // test_before is deduplicated away.
    let artifacts2 = orch
        .run(&page, "https://flow.test", &[AuditEntry::Script(observed)])
        .await?;
    assert_eq!(artifacts2.result_ids.len(), 2);
    Ok(())
}

#[tokio::test]
async fn script_failure_still_captures_a_state_with_a_warning() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let page = FakePage::new(
        PageModel::new("https://broken.test").element(
            "main",
            ElementSpec::visible().with_findings(vec![violation("img/missing-alt", "img")]),
        ),
    );
    let orch = orchestrator(&store, &page);

    let mut bad = script("bad-setup", vec![click_step("#does-not-exist")]);
    bad.steps[0].timeout_ms = Some(100);

    let artifacts = orch
        .run(&page, "https://broken.test", &[AuditEntry::Script(bad)])
        .await?;
    assert_eq!(artifacts.result_ids.len(), 2);

    let after = store.get_result(artifacts.result_ids[1])?;
    assert!(after.state.description.contains("execution failed"));
    assert_eq!(after.counts.violations, 1);
    assert_eq!(after.counts.warnings, 1);
    assert_eq!(after.warnings[0].issue_id, "setup-script/execution-failed");

    let stats = store.get_script_stats("bad-setup")?.unwrap();
    assert_eq!(stats.run_count, 1);
    assert_eq!(stats.failure_count, 1);
    Ok(())
}

#[tokio::test]
async fn state_discrepancies_surface_as_warnings() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    // The script expects a confirmation toast that never shows up.
    let page = FakePage::new(
        PageModel::new("https://expect.test").element("#save", ElementSpec::visible()),
    );
    let orch = orchestrator(&store, &page);

    let mut saving = script("save-settings", vec![click_step("#save")]);
    saving.expected_visible = vec!["#toast".to_string()];

    let artifacts = orch
        .run(&page, "https://expect.test", &[AuditEntry::Script(saving)])
        .await?;
    let after = store.get_result(artifacts.result_ids[1])?;
    assert_eq!(after.counts.warnings, 1);
    assert_eq!(
        after.warnings[0].issue_id,
        "state-validation/expected-element-missing"
    );
    assert_eq!(after.warnings[0].location, "#toast");
    Ok(())
}

#[tokio::test]
async fn reload_failure_truncates_but_keeps_earlier_states() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let mut model = PageModel::new("https://flaky.test").element(
        "main",
        ElementSpec::visible().with_findings(vec![violation("img/missing-alt", "img")]),
    );
    model.fail_reload = true;
    let page = FakePage::new(model);
    let orch = orchestrator(&store, &page);

    let entries = vec![
        AuditEntry::Interaction(InteractiveElement {
            selector: "#never-reached".to_string(),
            description: String::new(),
            expected_visible: vec![],
            expected_hidden: vec![],
            wait_timeout_ms: Some(100),
        }),
        AuditEntry::Interaction(InteractiveElement {
            selector: "#also-never".to_string(),
            description: String::new(),
            expected_visible: vec![],
            expected_hidden: vec![],
            wait_timeout_ms: Some(100),
        }),
    ];

    let artifacts = orch.run(&page, "https://flaky.test", &entries).await?;

    // The initial state stands; both interactions were abandoned.
    assert_eq!(artifacts.result_ids.len(), 1);
    let reason = artifacts.truncated.expect("truncation reason");
    assert!(reason.contains("#never-reached"));

    let session = store.get_session(artifacts.session_id)?;
    assert!(session.truncated);
    assert!(session.truncated_reason.unwrap().contains("reload"));

    let initial = store.get_result(artifacts.result_ids[0])?;
    assert_eq!(initial.counts.violations, 1);
    assert!(initial.siblings.is_empty());
    Ok(())
}

#[tokio::test]
async fn unclickable_interaction_records_a_warning_state() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let page = FakePage::new(
        PageModel::new("https://missing.test").element("main", ElementSpec::visible()),
    );
    let orch = orchestrator(&store, &page);

    let artifacts = orch
        .run(
            &page,
            "https://missing.test",
            &[AuditEntry::Interaction(InteractiveElement {
                selector: "#ghost".to_string(),
                description: "ghost button".to_string(),
                expected_visible: vec![],
                expected_hidden: vec![],
                wait_timeout_ms: Some(100),
            })],
        )
        .await?;

    assert_eq!(artifacts.result_ids.len(), 2);
    assert!(artifacts.truncated.is_none());

    let state = store.get_result(artifacts.result_ids[1])?;
    assert!(state
        .warnings
        .iter()
        .any(|w| w.issue_id == "interaction/element-unavailable"));
    Ok(())
}

#[tokio::test]
async fn disabled_scripts_are_skipped_entirely() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let page = FakePage::new(
        PageModel::new("https://off.test").element("#widget", ElementSpec::visible()),
    );
    let orch = orchestrator(&store, &page);

    let mut off = script("disabled-one", vec![click_step("#widget")]);
    off.enabled = false;

    let artifacts = orch
        .run(&page, "https://off.test", &[AuditEntry::Script(off)])
        .await?;
    assert_eq!(artifacts.result_ids.len(), 1);
    assert!(store.get_script_stats("disabled-one")?.is_none());
    Ok(())
}
