//! # Run Report
//!
//! The aggregate outcome of one reconciliation run: counters plus an ordered
//! list of per-group diagnostic entries. The report is created at run start,
//! appended to by the reconciler, and consumed by the caller after the run —
//! it is never read back during the run.

use std::fmt;

/// The named steps of the per-group reconciliation sequence, in order.
///
/// Identifier resolution has no variant: it is pure and cannot fail, so no
/// report entry ever points at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    EnsureRepository,
    RemoveBranchProtections,
    EnsureCollaborators,
    EnsureStaffGrant,
    EnsureStudentGrant,
    EnsureDeployKey,
    EnsureWebhook,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::EnsureRepository => "ensure_repository",
            Step::RemoveBranchProtections => "remove_branch_protections",
            Step::EnsureCollaborators => "ensure_collaborators",
            Step::EnsureStaffGrant => "ensure_staff_grant",
            Step::EnsureStudentGrant => "ensure_student_grant",
            Step::EnsureDeployKey => "ensure_deploy_key",
            Step::EnsureWebhook => "ensure_webhook",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a group's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Failed with the error's rendered message.
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// One diagnostic entry per group: the resolved identifier, the step the
/// group reached last, and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub identifier: String,
    pub step: Step,
    pub outcome: Outcome,
}

/// Aggregate result of a reconciliation run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Groups that converged fully.
    pub groups_processed: u32,
    /// Groups that failed at some step.
    pub groups_failed: u32,
    /// Individual collaborator additions that failed inside otherwise
    /// continuing groups.
    pub members_failed: u32,
    /// Ordered per-group diagnostics, one entry per group.
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, identifier: &str, step: Step) {
        self.groups_processed += 1;
        self.entries.push(ReportEntry {
            identifier: identifier.to_string(),
            step,
            outcome: Outcome::Success,
        });
    }

    pub fn record_failure(&mut self, identifier: &str, step: Step, detail: String) {
        self.groups_failed += 1;
        self.entries.push(ReportEntry {
            identifier: identifier.to_string(),
            step,
            outcome: Outcome::Failed(detail),
        });
    }

    pub fn record_member_failure(&mut self) {
        self.members_failed += 1;
    }

    /// The one-line summary printed at the end of a run.
    pub fn summary(&self) -> String {
        if self.members_failed > 0 {
            format!(
                "Processed {} group(s); {} group error(s); {} member error(s).",
                self.groups_processed, self.groups_failed, self.members_failed
            )
        } else {
            format!(
                "Processed {} group(s); {} group error(s).",
                self.groups_processed, self.groups_failed
            )
        }
    }
}
