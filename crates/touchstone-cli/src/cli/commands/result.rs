use super::{exit_codes, parse_category};
use crate::cli::args::ResultArgs;
use anyhow::Result;
use touchstone_core::storage::store::Store;

pub fn cmd_result(args: ResultArgs) -> Result<i32> {
    let store = Store::open(&args.db)?;
    store.init_schema()?;

    let category = args.category.as_deref().map(parse_category).transpose()?;
    let result = store.get_result_filtered(args.id, category)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(exit_codes::OK)
}
