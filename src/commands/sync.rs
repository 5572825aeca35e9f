//! Sync command implementation
//!
//! The sync command runs the full reconciliation:
//! 1. Load the run configuration and resolve credentials
//! 2. Load the roster CSV
//! 3. Construct the configured hosting backend
//! 4. Drive every group through the reconciler's ensure steps
//! 5. Print per-group failures and the final summary line

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use course_repo::output::OutputStyle;

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Path to config file
    #[arg(short, long, value_name = "PATH", env = "COURSE_REPO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the roster CSV (as written by `course-repo hooks`)
    #[arg(short, long, value_name = "PATH")]
    pub roster: Option<PathBuf>,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the sync command
pub fn execute(args: SyncArgs, style: &OutputStyle) -> Result<()> {
    use course_repo::{config, gateway, reconciler::Reconciler, roster};
    use std::time::Instant;

    let start_time = Instant::now();

    let config_path = args
        .config
        .unwrap_or_else(|| PathBuf::from("course-repo.yaml"));
    if !config_path.exists() {
        anyhow::bail!("Configuration file not found: {}", config_path.display());
    }

    let roster_path = args.roster.unwrap_or_else(|| PathBuf::from("webhooks.csv"));
    if !roster_path.exists() {
        anyhow::bail!("Roster file not found: {}", roster_path.display());
    }

    let config = config::from_file(&config_path)?;
    let records = roster::from_file(&roster_path)?;

    if !args.quiet {
        println!(
            "{} Syncing {} group(s) against {}",
            style.marker("🔄", "[SYNC]"),
            records.len(),
            config.organization
        );
        println!();
    }

    let credentials = config.credentials.resolve()?;
    let gateway = gateway::from_config(&config, &credentials);

    let report = Reconciler::new(gateway.as_ref(), &config).run(&records)?;

    let duration = start_time.elapsed();
    if !args.quiet {
        println!();
        for entry in &report.entries {
            match &entry.outcome {
                course_repo::report::Outcome::Success => {}
                course_repo::report::Outcome::Failed(detail) => {
                    println!(
                        "{} {} failed at {}: {}",
                        style.marker("❌", "[FAIL]"),
                        entry.identifier,
                        entry.step,
                        detail
                    );
                }
            }
        }
        println!(
            "{} {} ({:.2}s)",
            style.marker("✅", "[DONE]"),
            report.summary(),
            duration.as_secs_f64()
        );
    }

    if report.groups_failed > 0 {
        anyhow::bail!("{} group(s) failed to converge", report.groups_failed);
    }
    Ok(())
}
