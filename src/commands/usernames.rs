//! Usernames command implementation
//!
//! Bootstraps the username-mapping CSV the `hooks` command consumes: lists
//! every user enrolled in the course on the grading platform and writes one
//! row per user (`cg_name,cg_user,gl_name,gl_user`), with the
//! hosting-platform columns left blank for manual completion.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use course_repo::output::OutputStyle;

/// Arguments for the usernames command
#[derive(Args, Debug)]
pub struct UsernamesArgs {
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

    /// Output mapping CSV
    #[arg(short, long, value_name = "PATH", default_value = "usernames.csv")]
    pub output: PathBuf,

    /// Overwrite an existing mapping file
    #[arg(long)]
    pub force: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the usernames command
pub fn execute(args: UsernamesArgs, style: &OutputStyle) -> Result<()> {
    use course_repo::codegrade;

    // A half-filled mapping represents manual work; never clobber it silently.
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "Mapping file already exists: {} (use --force to overwrite)",
            args.output.display()
        );
    }

    if !args.quiet {
        println!(
            "{} Retrieving course users from {}",
            style.marker("🌐", "[CG]"),
            args.host
        );
    }
    let client = codegrade::CodegradeClient::login(&args.host, &args.username, &args.password)?;
    let users = client.course_users(args.course)?;
    codegrade::write_username_skeleton(&args.output, &users)?;

    if !args.quiet {
        println!(
            "{} Wrote {} user(s) to {}; fill in the git account columns before running `hooks`",
            style.marker("✅", "[DONE]"),
            users.len(),
            args.output.display()
        );
    }
    Ok(())
}
