use anyhow::Result;

use crate::cli::args::{Cli, Command};

mod init;
mod query;
mod result;
mod run;
mod stats;

pub mod exit_codes {
    pub const OK: i32 = 0;
    /// The session was truncated or a setup script failed.
    pub const INCOMPLETE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> Result<i32> {
    match cli.cmd {
        Command::Init(args) => init::cmd_init(args),
        Command::Run(args) => run::cmd_run(args).await,
        Command::Result(args) => result::cmd_result(args),
        Command::Query(args) => query::cmd_query(args),
        Command::Stats(args) => stats::cmd_stats(args),
        Command::Version => {
            println!("touchstone {}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

/// Strict category parsing for CLI flags; the store's lenient parse
/// would silently turn typos into `info`.
pub(crate) fn parse_category(
    s: &str,
) -> Result<touchstone_core::model::FindingCategory> {
    use touchstone_core::model::FindingCategory;
    for cat in FindingCategory::ALL {
        if cat.as_str() == s {
            return Ok(cat);
        }
    }
    anyhow::bail!(
        "unknown category '{}' (expected one of: violation, warning, info, discovery, pass)",
        s
    )
}
