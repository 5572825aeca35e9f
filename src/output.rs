//! Terminal styling for command output.
//!
//! Commands mark their progress lines with an emoji when the terminal is
//! capable and a plain-text tag otherwise. The global `--color` flag forces
//! either mode; `auto` respects `NO_COLOR` (<https://no-color.org/>),
//! `CLICOLOR=0`, `CLICOLOR_FORCE` and the capabilities `console` reports
//! for stdout.

use std::env;

/// Whether command output is decorated.
#[derive(Debug, Clone, Copy)]
pub struct OutputStyle {
    decorated: bool,
}

impl OutputStyle {
    /// Build the style from the `--color=always|never|auto` flag.
    pub fn from_flag(color_flag: &str) -> Self {
        let decorated = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => detect(),
        };
        Self { decorated }
    }

    /// The emoji marker when decoration is on, the plain tag otherwise.
    pub fn marker<'a>(&self, emoji: &'a str, plain: &'a str) -> &'a str {
        if self.decorated {
            emoji
        } else {
            plain
        }
    }
}

fn detect() -> bool {
    // NO_COLOR disables decoration by its mere presence
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| !v.is_empty() && v != "0") {
        return true;
    }
    console::Term::stdout().features().colors_supported()
}
