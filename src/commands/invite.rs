//! Invite command implementation
//!
//! Checks which roster members are already members of the hosting
//! organization and invites the rest. Invitations are per-account and
//! independent: one rejected invitation does not stop the remaining ones.

use anyhow::Result;
use clap::Args;
use std::collections::BTreeSet;
use std::path::PathBuf;

use log::warn;

use course_repo::output::OutputStyle;

/// Arguments for the invite command
#[derive(Args, Debug)]
pub struct InviteArgs {
    /// Path to config file
    #[arg(short, long, value_name = "PATH", env = "COURSE_REPO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the roster CSV
    #[arg(short, long, value_name = "PATH")]
    pub roster: Option<PathBuf>,

    /// Show who would be invited without sending invitations
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the invite command
pub fn execute(args: InviteArgs, style: &OutputStyle) -> Result<()> {
    use course_repo::{config, gateway, roster};

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
    let credentials = config.credentials.resolve()?;
    let gateway = gateway::from_config(&config, &credentials);

    let members: BTreeSet<String> = gateway.list_members()?.into_iter().collect();
    // Dedup across groups: a student can appear in several records.
    let wanted: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.members.iter().map(String::as_str))
        .collect();

    let mut already = 0;
    let mut invited = 0;
    let mut errors = 0;
    for account in wanted {
        if members.contains(account) {
            already += 1;
            continue;
        }
        if args.dry_run {
            if !args.quiet {
                println!(
                    "{} would invite {}",
                    style.marker("✉️", "[INVITE]"),
                    account
                );
            }
            invited += 1;
            continue;
        }
        match gateway.invite_member(account) {
            Ok(()) => {
                if !args.quiet {
                    println!("{} invited {}", style.marker("✉️", "[INVITE]"), account);
                }
                invited += 1;
            }
            Err(error) => {
                warn!("inviting {} failed: {}", account, error);
                errors += 1;
            }
        }
    }

    if !args.quiet {
        println!(
            "{} {} member(s) found; {} invitation(s) {}; {} error(s).",
            style.marker("✅", "[DONE]"),
            already,
            invited,
            if args.dry_run { "pending (dry run)" } else { "sent" },
            errors
        );
    }
    if errors > 0 {
        anyhow::bail!("{} invitation(s) failed", errors);
    }
    Ok(())
}
