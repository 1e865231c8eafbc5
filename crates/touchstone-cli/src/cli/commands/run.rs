use super::exit_codes;
use crate::cli::args::RunArgs;
use anyhow::{Context, Result};
use std::sync::Arc;

use touchstone_core::config::load_config;
use touchstone_core::detect::annotations::AnnotationSuite;
use touchstone_core::detect::DetectOptions;
use touchstone_core::engine::interaction::InteractionEngine;
use touchstone_core::engine::orchestrator::Orchestrator;
use touchstone_core::model::TestResult;
use touchstone_core::page::replay::ReplaySnapshot;
use touchstone_core::report::console;
use touchstone_core::secrets::SecretResolver;
use touchstone_core::storage::store::Store;

pub async fn cmd_run(args: RunArgs) -> Result<i32> {
    let cfg = load_config(&args.config, args.strict).map_err(|e| anyhow::anyhow!("{e}"))?;

    let page = ReplaySnapshot::from_path(&args.snapshot)?.into_page();

    if let Some(dir) = args.db.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
    }
    let store = Store::open(&args.db)?;
    store.init_schema()?;

    let orchestrator = Orchestrator {
        store: store.clone(),
        suite: Arc::new(AnnotationSuite::new(page.clone())),
        engine: InteractionEngine::new(SecretResolver::from_env()),
        options: DetectOptions {
            compliance_level: cfg.settings.compliance_level.clone(),
            config: serde_json::Value::Null,
        },
    };

    let artifacts = orchestrator.run(&page, &cfg.page, &cfg.entries()).await?;

    let results: Vec<TestResult> = artifacts
        .result_ids
        .iter()
        .map(|id| store.get_result(*id))
        .collect::<Result<_>>()?;

    match args.format.as_str() {
        "json" => {
            let out = serde_json::json!({
                "session_id": artifacts.session_id,
                "page": artifacts.page,
                "result_ids": artifacts.result_ids,
                "truncated": artifacts.truncated,
                "states": results,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        _ => console::print_session(&artifacts, &results),
    }

    if artifacts.truncated.is_some() {
        return Ok(exit_codes::INCOMPLETE);
    }
    Ok(exit_codes::OK)
}
