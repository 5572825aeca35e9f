//! Completions command implementation
//!
//! Writes a completion script for the chosen shell to stdout; users redirect
//! it to wherever their shell expects completion files.

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::Shell;
use std::io;

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the `completions` command.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    clap_complete::generate(args.shell, &mut Cli::command(), "course-repo", &mut io::stdout());
    Ok(())
}
