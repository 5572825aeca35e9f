//! # Course Repository Library
//!
//! This library provides the core functionality for provisioning and
//! maintaining per-group (or per-student) git repositories for a classroom.
//! It is designed to be used by the `course-repo` command-line tool but can
//! also be integrated into other applications that drive classroom
//! repository management.
//!
//! ## Quick Example
//!
//! ```
//! use course_repo::resolve;
//!
//! // A group's repository identifier is derived deterministically from the
//! // assignment template slug and the group's display name.
//! let id = resolve::resolve("Exercise_1", "Team A!");
//! assert_eq!(id, "Exercise_1-Team_A_");
//! ```
//!
//! ## Core Concepts
//!
//! - **Roster (`roster`)**: the desired state — one [`roster::GroupRecord`]
//!   per group, with members, deploy key, and webhook settings.
//! - **Name Resolution (`resolve`)**: pure, deterministic mapping from
//!   display names to platform-safe repository identifiers.
//! - **Hosting Gateway (`gateway`)**: the capability interface over a remote
//!   hosting provider, with GitHub and GitLab backends.
//! - **Reconciler (`reconciler`)**: the state machine that drives each
//!   group through its ordered, idempotent ensure steps, isolating failures
//!   so one bad record never aborts the batch.
//! - **Run Report (`report`)**: the aggregate counters and per-group
//!   diagnostics of one run.
//! - **Grading Platform (`codegrade`)**: client used to assemble the roster
//!   from assignment webhook settings.
//!
//! ## Execution Flow
//!
//! A `sync` run loads the configuration and roster, constructs the backend
//! named by the configuration, and hands both to
//! [`reconciler::Reconciler::run`], which processes the roster sequentially
//! (remote rate limits make serial the safe default) and returns the
//! [`report::RunReport`] for display.

pub mod codegrade;
pub mod config;
pub mod error;
pub mod gateway;
pub mod output;
pub mod reconciler;
pub mod report;
pub mod resolve;
pub mod roster;

#[cfg(test)]
mod resolve_proptest;
