use super::exit_codes;
use crate::cli::args::InitArgs;
use crate::templates;
use anyhow::{Context, Result};
use std::fs;

pub fn cmd_init(args: InitArgs) -> Result<i32> {
    if !args.force && args.config.exists() {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.config.display()
        );
    }
    if !args.force && args.snapshot.exists() {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.snapshot.display()
        );
    }

    touchstone_core::config::write_sample_config(&args.config)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    fs::write(&args.snapshot, templates::SAMPLE_SNAPSHOT)
        .with_context(|| format!("failed to write {}", args.snapshot.display()))?;

    println!("Wrote {}", args.config.display());
    println!("Wrote {}", args.snapshot.display());
    println!("Next: touchstone run --config {}", args.config.display());
    Ok(exit_codes::OK)
}
