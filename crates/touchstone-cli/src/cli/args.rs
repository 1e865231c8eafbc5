use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "touchstone",
    version,
    about = "Multi-state accessibility audit runner"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scaffold a sample audit config and page snapshot
    Init(InitArgs),
    /// Run a full audit session against a page snapshot
    Run(RunArgs),
    /// Print one stored result as JSON
    Result(ResultArgs),
    /// Aggregate queries over a stored result's items
    Query(QueryArgs),
    /// Store and script execution statistics
    Stats(StatsArgs),
    Version,
}

#[derive(Parser, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = "audit.yaml")]
    pub config: PathBuf,

    #[arg(long, default_value = "page.snapshot.json")]
    pub snapshot: PathBuf,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "audit.yaml")]
    pub config: PathBuf,

    #[arg(long, default_value = ".touchstone/audit.db")]
    pub db: PathBuf,

    /// Page snapshot to replay the session against
    #[arg(long, default_value = "page.snapshot.json")]
    pub snapshot: PathBuf,

    /// Reject configs with unknown fields
    #[arg(long)]
    pub strict: bool,

    /// text | json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Parser, Clone)]
pub struct ResultArgs {
    /// Result id as reported by `run`
    pub id: i64,

    #[arg(long, default_value = ".touchstone/audit.db")]
    pub db: PathBuf,

    /// Only load one category: violation|warning|info|discovery|pass
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Parser, Clone)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub cmd: QuerySub,

    #[arg(long, default_value = ".touchstone/audit.db")]
    pub db: PathBuf,
}

#[derive(Subcommand, Clone)]
pub enum QuerySub {
    /// Count items per issue id within one result
    ByIssue {
        #[arg(long)]
        result: i64,
        #[arg(long)]
        category: Option<String>,
    },
    /// Count items per touchpoint within one result
    ByTouchpoint {
        #[arg(long)]
        result: i64,
    },
    /// Fetch up to N example items for one issue
    Sample {
        #[arg(long)]
        result: i64,
        #[arg(long, default_value = "violation")]
        category: String,
        #[arg(long)]
        issue: String,
        #[arg(long, default_value_t = 5)]
        limit: u32,
    },
}

#[derive(Parser, Clone)]
pub struct StatsArgs {
    #[arg(long, default_value = ".touchstone/audit.db")]
    pub db: PathBuf,

    /// Also show execution stats for this script id
    #[arg(long)]
    pub script: Option<String>,
}
