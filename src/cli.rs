//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::commands;
use course_repo::output::OutputStyle;

/// Course Repository - Provision and reconcile classroom git repositories
#[derive(Parser, Debug)]
#[command(name = "course-repo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile every roster group's repository with the desired state
    Sync(commands::sync::SyncArgs),

    /// Fetch webhook settings from the grading platform and write the roster
    Hooks(commands::hooks::HooksArgs),

    /// Write a username-mapping skeleton from the course enrolment
    Usernames(commands::usernames::UsernamesArgs),

    /// Invite roster members that are not yet organization members
    Invite(commands::invite::InviteArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let style = OutputStyle::from_flag(&self.color);

        match self.command {
            Commands::Sync(args) => commands::sync::execute(args, &style),
            Commands::Hooks(args) => commands::hooks::execute(args, &style),
            Commands::Usernames(args) => commands::usernames::execute(args, &style),
            Commands::Invite(args) => commands::invite::execute(args, &style),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Initialize env_logger from the --log-level flag, letting RUST_LOG
/// override it when set.
fn init_logging(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(filter)
        .format_timestamp(None)
        .try_init()
        .ok();
}
