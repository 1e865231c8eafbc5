use crate::model::{SessionArtifacts, TestResult};

/// Console echo of a completed session, one line per state.
pub fn print_session(artifacts: &SessionArtifacts, results: &[TestResult]) {
    eprintln!(
        "\nSession #{} — {} ({} states)",
        artifacts.session_id,
        artifacts.page,
        results.len()
    );

    for r in results {
        let duration = r
            .duration_ms
            .map(|d| format!("({:.1}s)", d as f64 / 1000.0))
            .unwrap_or_default();
        let icon = if r.counts.violations > 0 { "❌" } else { "✅" };
        eprintln!(
            "{} state {:<2} {:<40} {} violations, {} warnings, {} passes {}",
            icon,
            r.seq,
            truncate(&r.state.description, 40),
            r.counts.violations,
            r.counts.warnings,
            r.counts.passes,
            duration
        );
    }

    if let Some(reason) = &artifacts.truncated {
        eprintln!("⚠️  run cut short: {}", reason);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
