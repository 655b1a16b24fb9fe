//! `examlens check-config`

use std::path::Path;

use anyhow::Result;
use examlens_config::{load_and_prepare, redact};

/// Print the effective config and its validation report.
/// Returns whether the config is valid.
pub async fn run(path: &Path) -> Result<bool> {
    println!("Config file: {}", path.display());
    if !path.exists() {
        println!("  (not found; using defaults and environment)");
    }

    let (config, report) = load_and_prepare(path).await?;
    println!("{}", serde_json::to_string_pretty(&redact(&config))?);
    println!();

    for w in &report.warnings {
        println!("  warning  {}: {}", w.path, w.message);
    }
    for e in &report.errors {
        println!("  error    {}: {}", e.path, e.message);
    }

    if report.is_valid() {
        println!("Config OK ({} warning(s))", report.warnings.len());
    } else {
        println!("Config has {} error(s)", report.errors.len());
    }
    Ok(report.is_valid())
}
