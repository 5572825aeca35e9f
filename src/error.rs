//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `course-repo` application. It uses the `thiserror` library to create a
//! comprehensive `Error` enum that covers all anticipated failure modes,
//! providing clear and descriptive error messages.
//!
//! The taxonomy distinguishes failures that are fatal for a single roster
//! group from failures that are recoverable at step or member granularity:
//!
//! - **`TemplateNotFound`** and **`RepositoryLookupFailed`** abort the
//!   remaining steps for the affected group only.
//! - **`RemoteOperation`** covers any non-success response from the hosting
//!   platform; the reconciler catches it at the step (or, for collaborator
//!   additions, member) boundary and continues with the rest of the batch.
//! - Load-time errors (`ConfigParse`, `RosterParse`, `CredentialsMissing`,
//!   `DuplicateIdentifier`) fail the run before any remote call is made.
//!
//! The `Result<T>` alias is used throughout the library to keep signatures
//! short and propagation with `?` uniform.

use thiserror::Error;

/// Main error type for course-repo operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while parsing the run configuration file.
    ///
    /// Includes the specific parsing issue and optionally a hint about how
    /// to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The roster file could not be read or a row was malformed.
    #[error("Roster parsing error: {message}")]
    RosterParse { message: String },

    /// Two roster rows resolved to the same repository identifier.
    ///
    /// Identifier collisions would make two groups fight over one
    /// repository, so they are a configuration error rather than something
    /// to merge silently.
    #[error("Duplicate repository identifier: {identifier} (check roster group names)")]
    DuplicateIdentifier { identifier: String },

    /// No repository matched the configured template slug.
    ///
    /// Fatal for the affected group: without a template there is nothing to
    /// clone, so no later step has a repository to act on.
    #[error("Template repository not found: {slug}\n  hint: check the spelling of the `template` setting")]
    TemplateNotFound { slug: String },

    /// A repository that was just created cannot subsequently be found.
    ///
    /// Indicates an inconsistency in the hosting platform; fatal for the
    /// affected group.
    #[error("Repository lookup failed after creation: {repo}")]
    RepositoryLookupFailed { repo: String },

    /// A remote call returned a non-success status.
    ///
    /// Recoverable at step or member granularity; never retried within a
    /// single run. Re-running the whole batch is the documented recovery
    /// path.
    #[error("Remote operation failed: {operation}{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    RemoteOperation {
        operation: String,
        /// HTTP status code, when the failure carries one
        status: Option<u16>,
        message: String,
    },

    /// The configured credentials source yielded no usable token.
    #[error("Credentials missing: {source_desc}")]
    CredentialsMissing { source_desc: String },

    /// An error returned by the grading platform API.
    #[error("Grading platform request failed: {operation}: {message}")]
    GradingPlatform { operation: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A CSV parsing error, wrapped from `csv::Error`.
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Whether this error ends processing for the whole group (as opposed
    /// to a single step or member).
    pub fn is_fatal_for_group(&self) -> bool {
        matches!(
            self,
            Error::TemplateNotFound { .. } | Error::RepositoryLookupFailed { .. }
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
