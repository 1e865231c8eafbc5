use super::exit_codes;
use crate::cli::args::StatsArgs;
use anyhow::Result;
use touchstone_core::storage::store::Store;

pub fn cmd_stats(args: StatsArgs) -> Result<i32> {
    let store = Store::open(&args.db)?;
    store.init_schema()?;

    let stats = store.stats_best_effort()?;
    let fmt = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_else(|| "?".into());
    println!("sessions:      {}", fmt(stats.sessions));
    println!("results:       {}", fmt(stats.results));
    println!("result items:  {}", fmt(stats.items));
    println!(
        "schema version: {}",
        stats.version.as_deref().unwrap_or("?")
    );
    if let Some(id) = stats.last_session_id {
        println!(
            "last session:  #{} at {}",
            id,
            stats.last_session_at.as_deref().unwrap_or("?")
        );
    }

    if let Some(script_id) = &args.script {
        match store.get_script_stats(script_id)? {
            Some(s) => {
                println!("\nscript '{}':", script_id);
                println!("  runs:      {}", s.run_count);
                println!("  successes: {}", s.success_count);
                println!("  failures:  {}", s.failure_count);
                if let Some(avg) = s.avg_duration_ms() {
                    println!("  avg time:  {:.0}ms", avg);
                }
                if let Some(at) = &s.last_run_at {
                    println!("  last run:  {}", at);
                }
            }
            None => println!("\nscript '{}': never executed", script_id),
        }
    }
    Ok(exit_codes::OK)
}
