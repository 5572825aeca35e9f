//! # Hosting Platform Gateway
//!
//! This module provides the [`HostingGateway`] trait, the single
//! side-effecting boundary between the reconciler and a remote git hosting
//! provider.
//!
//! ## Design
//!
//! The reconciler is built around a trait-based design that separates the
//! reconciliation logic from the concrete platform implementation. GitHub
//! and GitLab expose materially different primitives (template-clone vs.
//! fork, team grants vs. group shares), so each backend adapts its own API
//! to this one capability interface:
//!
//! - **`github::GithubGateway`**: GitHub REST v3.
//! - **`gitlab::GitlabGateway`**: GitLab REST v4.
//!
//! This design also allows the gateway to be swapped out in tests: the
//! reconciler scenario tests run against an in-memory implementation that
//! records every call, without performing real network operations.
//!
//! ## Contract
//!
//! Every `list_*` operation is a fresh read; the gateway never caches remote
//! state, and neither does the reconciler, so each ensure step decides on
//! current data. The gateway provides no atomic upsert: ensure steps are
//! check-then-act, and a create that races a concurrent run and comes back
//! as a conflict is reported as success, not failure.

pub mod github;
pub mod gitlab;

use crate::config::{Credentials, Platform, RunConfig};
use crate::error::Result;

/// Construct the backend named by the run configuration.
pub fn from_config(config: &RunConfig, credentials: &Credentials) -> Box<dyn HostingGateway> {
    match config.platform {
        Platform::Github => Box::new(github::GithubGateway::new(
            &config.host,
            &config.organization,
            credentials,
        )),
        Platform::Gitlab => Box::new(gitlab::GitlabGateway::new(
            &config.host,
            &config.organization,
            &config.staff_team,
            config.template_in_staff_group,
            credentials,
        )),
    }
}

/// Permission level granted to a collaborator or team.
///
/// Backends translate these to their own vocabulary (GitHub role strings,
/// GitLab numeric access levels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Read-only access (GitHub `pull`, GitLab Reporter).
    Read,
    /// Push access without settings control (GitHub `maintain`, GitLab
    /// Maintainer).
    Maintain,
    /// Full administrative access (GitHub `admin`, GitLab Owner).
    Admin,
}

/// Opaque handle to a repository the gateway can act on.
///
/// `locator` is backend-specific (a `owner/name` pair on GitHub, a numeric
/// project id on GitLab); `name` is the resolved repository identifier it
/// was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    pub locator: String,
    pub name: String,
}

/// Capability interface over a remote git hosting provider.
///
/// All operations are synchronous and blocking; request timeouts live in
/// the backend and surface as `Error::RemoteOperation`.
pub trait HostingGateway: Send + Sync {
    /// Look up a repository by its resolved identifier.
    fn find_repository(&self, name: &str) -> Result<Option<RepoHandle>>;

    /// Whether a repository with this identifier exists.
    fn repository_exists(&self, name: &str) -> Result<bool> {
        Ok(self.find_repository(name)?.is_some())
    }

    /// Create a repository named `name` from the template repository
    /// matching `template_slug`.
    ///
    /// Fails with `Error::TemplateNotFound` when no repository matches the
    /// slug. A conflict caused by a concurrent run having already created
    /// the repository is success.
    fn create_repository_from_template(
        &self,
        name: &str,
        template_slug: &str,
    ) -> Result<RepoHandle>;

    /// Account names that currently have collaborator access.
    fn list_collaborators(&self, repo: &RepoHandle) -> Result<Vec<String>>;

    /// Grant one account collaborator access at the given permission.
    fn add_collaborator(&self, repo: &RepoHandle, account: &str, permission: Permission)
        -> Result<()>;

    /// Titles of the deploy keys currently installed.
    fn list_deploy_keys(&self, repo: &RepoHandle) -> Result<Vec<String>>;

    /// Install a deploy key under `title`.
    fn add_deploy_key(&self, repo: &RepoHandle, title: &str, payload: &str) -> Result<()>;

    /// Delivery URLs of the webhooks currently configured.
    fn list_webhooks(&self, repo: &RepoHandle) -> Result<Vec<String>>;

    /// Configure a webhook delivering the given events to `url`.
    fn add_webhook(&self, repo: &RepoHandle, url: &str, secret: &str, events: &[&str])
        -> Result<()>;

    /// Whether the named team already has access to the repository.
    fn team_has_repo(&self, team: &str, repo: &RepoHandle) -> Result<bool>;

    /// Grant the named team access at the given permission.
    fn grant_team_repo(&self, team: &str, repo: &RepoHandle, permission: Permission)
        -> Result<()>;

    /// Branch names that currently carry a protection rule.
    fn list_protected_branches(&self, repo: &RepoHandle) -> Result<Vec<String>>;

    /// Remove the protection rule from one branch.
    fn unprotect_branch(&self, repo: &RepoHandle, branch: &str) -> Result<()>;

    /// Account names that are already members of the organization.
    fn list_members(&self) -> Result<Vec<String>>;

    /// Invite one account into the organization.
    fn invite_member(&self, account: &str) -> Result<()>;
}
