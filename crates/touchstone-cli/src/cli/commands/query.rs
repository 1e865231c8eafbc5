use super::{exit_codes, parse_category};
use crate::cli::args::{QueryArgs, QuerySub};
use anyhow::Result;
use touchstone_core::storage::store::Store;

pub fn cmd_query(args: QueryArgs) -> Result<i32> {
    let store = Store::open(&args.db)?;
    store.init_schema()?;

    match args.cmd {
        QuerySub::ByIssue { result, category } => {
            let category = category.as_deref().map(parse_category).transpose()?;
            let counts = store.count_items_by_issue(result, category)?;
            let out: serde_json::Map<String, serde_json::Value> = counts
                .into_iter()
                .map(|(issue, n)| (issue, serde_json::Value::from(n)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        QuerySub::ByTouchpoint { result } => {
            let counts = store.count_items_by_touchpoint(result)?;
            let out: serde_json::Map<String, serde_json::Value> = counts
                .into_iter()
                .map(|(tp, n)| (tp, serde_json::Value::from(n)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        QuerySub::Sample {
            result,
            category,
            issue,
            limit,
        } => {
            let category = parse_category(&category)?;
            let items = store.sample_items_for_issue(result, category, &issue, limit)?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }
    Ok(exit_codes::OK)
}
