//! # Reconciler
//!
//! The core state machine: converge every roster record to its desired
//! remote state and report the outcome, isolating each group from the rest
//! of the batch.
//!
//! ## Per-group step sequence
//!
//! 1. Resolve the repository identifier (pure, cannot fail).
//! 2. Ensure the repository exists, creating it from the template when
//!    missing. The one unrecoverable failure for a group: without a
//!    repository no later step has a target.
//! 3. Remove default branch protections (when configured), repeating while
//!    the protected list is non-empty because removing one rule can reveal
//!    another default rule.
//! 4. Ensure every member is a collaborator. Members are attempted
//!    independently: one failed addition is logged and counted but stops
//!    neither the remaining members nor the later steps, since partial
//!    collaborator coverage is recoverable on a future run.
//! 5. Ensure the staff team has administrative access.
//! 6. Ensure the student team has read access (only when configured).
//! 7. Ensure the deploy key titled `codegrade-key` is installed.
//! 8. Ensure a webhook delivering push events to the record's payload URL.
//!
//! Every step is check-then-act against freshly queried remote state, so a
//! re-run against a converged remote performs zero mutating calls. A step
//! failure marks the group failed at that step and skips its remaining
//! steps; the run always continues with the next group. There is no
//! rollback: re-running the whole batch is the recovery path.

use std::collections::HashSet;

use log::{info, warn};

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::gateway::{HostingGateway, Permission, RepoHandle};
use crate::report::{RunReport, Step};
use crate::resolve::resolve;
use crate::roster::GroupRecord;

/// Reserved title of the grading-platform deploy key.
///
/// The title is the sole de-duplication key: a key with this title but a
/// different payload is treated as already present and never rotated. This
/// is an accepted staleness, kept deliberately so already-distributed keys
/// are not disrupted.
pub const DEPLOY_KEY_TITLE: &str = "codegrade-key";

/// Events every group webhook subscribes to.
pub const WEBHOOK_EVENTS: &[&str] = &["push"];

/// Rounds of protection removal before concluding the platform keeps
/// re-protecting behind our back.
const MAX_UNPROTECT_ROUNDS: u32 = 10;

/// A step-level failure: which step, and what went wrong.
type StepError = (Step, Error);

pub struct Reconciler<'a> {
    gateway: &'a dyn HostingGateway,
    config: &'a RunConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(gateway: &'a dyn HostingGateway, config: &'a RunConfig) -> Self {
        Self { gateway, config }
    }

    /// Converge the whole roster, one group at a time.
    ///
    /// Fails before any remote call when two records resolve to the same
    /// repository identifier; afterwards, failures stay inside their group
    /// and the returned report carries the tally.
    pub fn run(&self, roster: &[GroupRecord]) -> Result<RunReport> {
        self.check_identifier_collisions(roster)?;

        let mut report = RunReport::new();
        for record in roster {
            let identifier = resolve(&self.config.template, &record.display_name);
            info!("processing {}", identifier);
            match self.converge_group(record, &identifier, &mut report) {
                Ok(()) => report.record_success(&identifier, Step::EnsureWebhook),
                Err((step, error)) => {
                    warn!("{}: {} failed: {}", identifier, step, error);
                    report.record_failure(&identifier, step, error.to_string());
                }
            }
        }
        Ok(report)
    }

    fn check_identifier_collisions(&self, roster: &[GroupRecord]) -> Result<()> {
        let mut seen = HashSet::new();
        for record in roster {
            let identifier = resolve(&self.config.template, &record.display_name);
            if !seen.insert(identifier.clone()) {
                return Err(Error::DuplicateIdentifier { identifier });
            }
        }
        Ok(())
    }

    /// Steps 2-8 for one group, inside its failure boundary.
    fn converge_group(
        &self,
        record: &GroupRecord,
        identifier: &str,
        report: &mut RunReport,
    ) -> std::result::Result<(), StepError> {
        let repo = self
            .ensure_repository(identifier)
            .map_err(|e| (Step::EnsureRepository, e))?;

        // The source system flip-flopped on whether protections come off
        // before or after collaborators are granted; both orders are valid
        // on some platform, so it stays configurable.
        if self.config.unprotect_before_collaborators {
            self.remove_branch_protections(&repo)
                .map_err(|e| (Step::RemoveBranchProtections, e))?;
            self.ensure_collaborators(record, &repo, report)
                .map_err(|e| (Step::EnsureCollaborators, e))?;
        } else {
            self.ensure_collaborators(record, &repo, report)
                .map_err(|e| (Step::EnsureCollaborators, e))?;
            self.remove_branch_protections(&repo)
                .map_err(|e| (Step::RemoveBranchProtections, e))?;
        }

        self.ensure_staff_grant(&repo)
            .map_err(|e| (Step::EnsureStaffGrant, e))?;
        self.ensure_student_grant(&repo)
            .map_err(|e| (Step::EnsureStudentGrant, e))?;
        self.ensure_deploy_key(record, &repo)
            .map_err(|e| (Step::EnsureDeployKey, e))?;
        self.ensure_webhook(record, &repo)
            .map_err(|e| (Step::EnsureWebhook, e))?;
        Ok(())
    }

    fn ensure_repository(&self, identifier: &str) -> Result<RepoHandle> {
        if !self.gateway.repository_exists(identifier)? {
            info!(
                "{}: repository does not exist yet, creating from template {}",
                identifier, self.config.template
            );
            self.gateway
                .create_repository_from_template(identifier, &self.config.template)?;
        }
        // Re-query rather than trusting the create response: a handle for a
        // repository the platform cannot find again is useless to every
        // later step.
        self.gateway
            .find_repository(identifier)?
            .ok_or_else(|| Error::RepositoryLookupFailed {
                repo: identifier.to_string(),
            })
    }

    fn remove_branch_protections(&self, repo: &RepoHandle) -> Result<()> {
        if !self.config.remove_branch_protections {
            return Ok(());
        }
        for _ in 0..MAX_UNPROTECT_ROUNDS {
            let protected = self.gateway.list_protected_branches(repo)?;
            if protected.is_empty() {
                return Ok(());
            }
            for branch in &protected {
                info!("{}: removing protection on branch {}", repo.name, branch);
                self.gateway.unprotect_branch(repo, branch)?;
            }
        }
        Err(Error::RemoteOperation {
            operation: "remove_branch_protections".to_string(),
            status: None,
            message: format!(
                "protected branches remain after {} rounds",
                MAX_UNPROTECT_ROUNDS
            ),
        })
    }

    fn ensure_collaborators(
        &self,
        record: &GroupRecord,
        repo: &RepoHandle,
        report: &mut RunReport,
    ) -> Result<()> {
        let current = self.gateway.list_collaborators(repo)?;
        for member in &record.members {
            if current.contains(member) {
                info!("{}: collaborator {} already present", repo.name, member);
                continue;
            }
            // Member granularity: one rejected account must not cost the
            // rest of the group its access.
            match self
                .gateway
                .add_collaborator(repo, member, Permission::Maintain)
            {
                Ok(()) => info!("{}: added collaborator {}", repo.name, member),
                Err(error) => {
                    warn!("{}: adding collaborator {} failed: {}", repo.name, member, error);
                    report.record_member_failure();
                }
            }
        }
        Ok(())
    }

    fn ensure_staff_grant(&self, repo: &RepoHandle) -> Result<()> {
        let staff = &self.config.staff_team;
        if self.gateway.team_has_repo(staff, repo)? {
            info!("{}: staff team already has access", repo.name);
            return Ok(());
        }
        info!("{}: granting staff team admin access", repo.name);
        self.gateway.grant_team_repo(staff, repo, Permission::Admin)
    }

    fn ensure_student_grant(&self, repo: &RepoHandle) -> Result<()> {
        if !self.config.student_readable {
            return Ok(());
        }
        let students = self.config.student_team_required()?;
        if self.gateway.team_has_repo(students, repo)? {
            info!("{}: student team can already see the repository", repo.name);
            return Ok(());
        }
        info!("{}: granting student team read access", repo.name);
        self.gateway
            .grant_team_repo(students, repo, Permission::Read)
    }

    fn ensure_deploy_key(&self, record: &GroupRecord, repo: &RepoHandle) -> Result<()> {
        let titles = self.gateway.list_deploy_keys(repo)?;
        if titles.iter().any(|title| title == DEPLOY_KEY_TITLE) {
            info!("{}: deploy key found", repo.name);
            return Ok(());
        }
        info!("{}: adding deploy key", repo.name);
        self.gateway
            .add_deploy_key(repo, DEPLOY_KEY_TITLE, &record.public_key)
    }

    fn ensure_webhook(&self, record: &GroupRecord, repo: &RepoHandle) -> Result<()> {
        let urls = self.gateway.list_webhooks(repo)?;
        if urls
            .iter()
            .any(|url| url == &record.webhook_payload_url)
        {
            info!("{}: webhook found", repo.name);
            return Ok(());
        }
        info!("{}: adding webhook", repo.name);
        self.gateway.add_webhook(
            repo,
            &record.webhook_payload_url,
            &record.webhook_secret,
            WEBHOOK_EVENTS,
        )
    }
}
