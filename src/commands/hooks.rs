//! Hooks command implementation
//!
//! Fetches the git webhook settings for every group (or student) of an
//! assignment from the grading platform and writes the roster CSV the
//! `sync` command consumes. The mapping from grading-platform usernames to
//! hosting-platform accounts comes from a local usernames CSV
//! (`cg_name,cg_user,gl_name,gl_user`).

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use course_repo::output::OutputStyle;

/// Arguments for the hooks command
#[derive(Args, Debug)]
pub struct HooksArgs {
    /// Grading platform base URL (e.g. https://uni.codegra.de)
    #[arg(long, value_name = "URL", env = "CODEGRADE_HOST")]
    pub host: String,

    /// Grading platform username
    #[arg(long, value_name = "NAME", env = "CODEGRADE_USER")]
    pub username: String,

    /// Grading platform password
    #[arg(long, value_name = "PASS", env = "CODEGRADE_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Course id on the grading platform
    #[arg(long, value_name = "ID")]
    pub course: u64,

    /// Assignment id on the grading platform
    #[arg(long, value_name = "ID")]
    pub assignment: u64,

    /// Username mapping CSV (cg_name,cg_user,gl_name,gl_user)
    #[arg(long, value_name = "PATH", default_value = "usernames.csv")]
    pub usernames: PathBuf,

    /// Output roster CSV
    #[arg(short, long, value_name = "PATH", default_value = "webhooks.csv")]
    pub output: PathBuf,

    /// One record per student instead of per group
    #[arg(long)]
    pub individual: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the hooks command
pub fn execute(args: HooksArgs, style: &OutputStyle) -> Result<()> {
    use course_repo::codegrade;

    if !args.usernames.exists() {
        anyhow::bail!("Username mapping not found: {}", args.usernames.display());
    }
    let git_ids = codegrade::read_username_mapping(&args.usernames)?;

    if !args.quiet {
        println!(
            "{} Retrieving webhook settings from {}",
            style.marker("🌐", "[CG]"),
            args.host
        );
    }
    let client = codegrade::CodegradeClient::login(&args.host, &args.username, &args.password)?;

    let entries = if args.individual {
        codegrade::individual_entries(&client, args.assignment, args.course, &git_ids)?
    } else {
        codegrade::group_entries(&client, args.assignment, &git_ids)?
    };

    codegrade::write_roster(&args.output, &entries)?;

    if !args.quiet {
        println!(
            "{} Wrote {} record(s) to {}",
            style.marker("✅", "[DONE]"),
            entries.len(),
            args.output.display()
        );
    }
    Ok(())
}
