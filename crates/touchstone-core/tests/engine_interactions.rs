use std::collections::HashMap;
use std::time::Instant;

use touchstone_core::engine::interaction::{InteractionEngine, ValidationOutcome};
use touchstone_core::errors::StepErrorKind;
use touchstone_core::model::{
    PageSetupScript, ScriptStep, ScriptValidation, StepAction,
};
use touchstone_core::page::fake::{ClickEffect, ElementSpec, FakePage, PageModel};
use touchstone_core::secrets::SecretResolver;
use touchstone_core::storage::store::Store;

fn step(action: StepAction, selector: &str) -> ScriptStep {
    ScriptStep {
        action,
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

fn engine() -> InteractionEngine {
    InteractionEngine::new(SecretResolver::fixed(HashMap::new()))
}

#[tokio::test]
async fn missing_selector_fails_within_the_step_timeout() {
    let page = FakePage::new(PageModel::new("https://t.test"));
    let mut s = script("login", vec![step(StepAction::Click, "#submit")]);
    s.steps[0].timeout_ms = Some(500);

    let started = Instant::now();
    let report = engine().execute(&page, &s).await;
    let elapsed = started.elapsed().as_millis() as u64;

    assert!(!report.success);
    assert_eq!(report.failed_step, Some(0));
    assert_eq!(report.steps.len(), 1);
    let log = &report.steps[0];
    assert_eq!(log.action, "click");
    assert_eq!(log.selector, "#submit");
    assert_eq!(log.error_kind, Some(StepErrorKind::SelectorNotFound));
    // Bounded by the configured timeout, with a little poll slack.
    assert!(elapsed >= 450, "gave up too early: {}ms", elapsed);
    assert!(elapsed < 900, "overran the bound: {}ms", elapsed);
}

#[tokio::test]
async fn steps_after_a_failure_are_skipped() {
    let page = FakePage::new(
        PageModel::new("https://t.test").element("#ok", ElementSpec::visible()),
    );
    let mut s = script(
        "multi",
        vec![
            step(StepAction::Click, "#ok"),
            step(StepAction::Click, "#missing"),
            step(StepAction::Click, "#ok"),
        ],
    );
    s.steps[1].timeout_ms = Some(100);

    let report = engine().execute(&page, &s).await;
    assert!(!report.success);
    assert_eq!(report.failed_step, Some(1));
    assert_eq!(report.steps.len(), 2);
    assert!(report.steps[0].success);
    assert!(!report.steps[1].success);
}

#[tokio::test]
async fn element_appearing_late_is_awaited() {
    let page = FakePage::new(
        PageModel::new("https://t.test")
            .element("#lazy", ElementSpec::visible().appearing_after_ms(150)),
    );
    let s = script("lazy", vec![step(StepAction::WaitForElement, "#lazy")]);

    let report = engine().execute(&page, &s).await;
    assert!(report.success, "{:?}", report.steps);
    assert!(report.steps[0].elapsed_ms >= 140);
}

#[tokio::test]
async fn secret_reaches_the_page_but_never_the_report_or_store() -> anyhow::Result<()> {
    let page = FakePage::new(
        PageModel::new("https://login.test").element("#password", ElementSpec::visible()),
    );
    let mut m = HashMap::new();
    m.insert("LOGIN_PASSWORD".to_string(), "hunter2".to_string());
    let engine = InteractionEngine::new(SecretResolver::fixed(m));

    let mut s = script("login", vec![step(StepAction::TypeText, "#password")]);
    s.steps[0].value = Some("${ENV:LOGIN_PASSWORD}".to_string());

    let report = engine.execute(&page, &s).await;
    assert!(report.success);

    // The page received the resolved value...
    let typed = page.model().lock().unwrap().typed.clone();
    assert_eq!(typed, vec![("#password".to_string(), "hunter2".to_string())]);

    // ...but the execution report only ever carries the template.
    let report_json = serde_json::to_string(&report)?;
    assert!(!report_json.contains("hunter2"));

    // And so does the persisted script definition.
    let store = Store::memory()?;
    store.init_schema()?;
    store.bump_script_stats(&s, report.success, report.duration_ms)?;
    let definition: String = {
        let conn = store.conn.lock().unwrap();
        conn.query_row(
            "SELECT definition_json FROM scripts WHERE id = 'login'",
            [],
            |r| r.get(0),
        )?
    };
    assert!(definition.contains("${ENV:LOGIN_PASSWORD}"));
    assert!(!definition.contains("hunter2"));
    Ok(())
}

#[tokio::test]
async fn unresolvable_secret_fails_the_step_not_the_process() {
    let page = FakePage::new(
        PageModel::new("https://login.test").element("#password", ElementSpec::visible()),
    );
    let mut s = script("login", vec![step(StepAction::TypeText, "#password")]);
    s.steps[0].value = Some("${ENV:NOT_SET_ANYWHERE}".to_string());

    let report = engine().execute(&page, &s).await;
    assert!(!report.success);
    assert_eq!(
        report.steps[0].error_kind,
        Some(StepErrorKind::ActionFailed)
    );
    let msg = report.steps[0].error.as_deref().unwrap_or("");
    assert!(msg.contains("NOT_SET_ANYWHERE"));
}

#[tokio::test]
async fn validation_failure_selector_overrides_step_success() {
    // Clicking login works, but the page shows an error box.
    let page = FakePage::new(
        PageModel::new("https://login.test")
            .element("#submit", ElementSpec::visible())
            .on_click("#submit", vec![ClickEffect::Show(".error-box".to_string())]),
    );
    let mut s = script("login", vec![step(StepAction::Click, "#submit")]);
    s.validation = Some(ScriptValidation {
        success_selector: None,
        success_text: None,
        failure_selectors: vec![".error-box".to_string()],
    });

    let report = engine().execute(&page, &s).await;
    assert!(!report.success);
    assert_eq!(report.failed_step, None);
    assert_eq!(
        report.validation,
        Some(ValidationOutcome::FailureConditionPresent(
            ".error-box".to_string()
        ))
    );
}

#[tokio::test]
async fn validation_success_selector_and_text_must_both_hold() {
    let page = FakePage::new(
        PageModel::new("https://login.test")
            .element("#submit", ElementSpec::visible())
            .element(
                "#greeting",
                ElementSpec::visible().with_text("Welcome back, sam"),
            ),
    );

    let mut s = script("login", vec![step(StepAction::Click, "#submit")]);
    s.validation = Some(ScriptValidation {
        success_selector: Some("#greeting".to_string()),
        success_text: Some("Welcome back".to_string()),
        failure_selectors: vec![],
    });
    let report = engine().execute(&page, &s).await;
    assert!(report.success);
    assert_eq!(report.validation, Some(ValidationOutcome::Passed));

    let mut s2 = s.clone();
    s2.validation.as_mut().unwrap().success_text = Some("Signed out".to_string());
    let report2 = engine().execute(&page, &s2).await;
    assert!(!report2.success);
    assert_eq!(
        report2.validation,
        Some(ValidationOutcome::SuccessConditionMissing)
    );
}

#[tokio::test]
async fn screenshot_step_and_debug_screenshots_collect_artifacts() {
    let page = FakePage::new(
        PageModel::new("https://t.test").element("#widget", ElementSpec::visible()),
    );
    let mut s = script(
        "shots",
        vec![
            step(StepAction::Click, "#widget"),
            step(StepAction::Screenshot, ""),
        ],
    );
    s.steps[0].screenshot = true;

    let report = engine().execute(&page, &s).await;
    assert!(report.success);
    assert_eq!(report.screenshots.len(), 2);
    assert!(report.screenshots[0].contains("shots-step0"));
    assert!(report.screenshots[1].contains("shots-step1"));
}

#[tokio::test]
async fn wait_step_honors_its_duration() {
    let page = FakePage::new(PageModel::new("https://t.test"));
    let mut s = script("pause", vec![step(StepAction::Wait, "")]);
    s.steps[0].timeout_ms = Some(150);

    let started = Instant::now();
    let report = engine().execute(&page, &s).await;
    assert!(report.success);
    assert!(started.elapsed().as_millis() >= 140);
}

#[tokio::test]
async fn delay_after_runs_between_steps() {
    let page = FakePage::new(
        PageModel::new("https://t.test").element("#a", ElementSpec::visible()),
    );
    let mut s = script(
        "delayed",
        vec![step(StepAction::Click, "#a"), step(StepAction::Click, "#a")],
    );
    s.steps[0].delay_after_ms = 120;

    let started = Instant::now();
    let report = engine().execute(&page, &s).await;
    assert!(report.success);
    assert!(started.elapsed().as_millis() >= 110);
}
