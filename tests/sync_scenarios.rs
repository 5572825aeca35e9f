//! Reconciler scenario tests against an in-memory gateway.
//!
//! The mock gateway keeps the remote state of every repository in memory
//! and records each mutating call in order, which lets these tests assert
//! the exact call sequence, idempotence of re-runs, and failure isolation
//! between groups without touching a network.

use std::collections::BTreeMap;
use std::sync::Mutex;

use course_repo::config::{CredentialsSource, Platform, RunConfig};
use course_repo::error::{Error, Result};
use course_repo::gateway::{HostingGateway, Permission, RepoHandle};
use course_repo::reconciler::Reconciler;
use course_repo::report::{Outcome, Step};
use course_repo::roster::GroupRecord;

#[derive(Default)]
struct RepoState {
    collaborators: Vec<String>,
    key_titles: Vec<String>,
    hook_urls: Vec<String>,
    teams: Vec<String>,
    protected: Vec<String>,
    /// Branches whose default protection only shows up after the previous
    /// one is removed.
    reveal_queue: Vec<String>,
}

#[derive(Default)]
struct MockGateway {
    repos: Mutex<BTreeMap<String, RepoState>>,
    /// Ordered log of mutating calls.
    calls: Mutex<Vec<String>>,
    template_exists: bool,
    /// Repository names whose creation fails with `TemplateNotFound`.
    fail_create_for: Vec<String>,
    /// Accounts whose collaborator addition fails.
    fail_members: Vec<String>,
    /// Branches protecting newly created repositories.
    initial_protected: Vec<String>,
    org_members: Vec<String>,
}

impl MockGateway {
    fn with_template() -> Self {
        Self {
            template_exists: true,
            ..Self::default()
        }
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn seed_repo(&self, name: &str, state: RepoState) {
        self.repos.lock().unwrap().insert(name.to_string(), state);
    }
}

impl HostingGateway for MockGateway {
    fn find_repository(&self, name: &str) -> Result<Option<RepoHandle>> {
        Ok(self.repos.lock().unwrap().get(name).map(|_| RepoHandle {
            locator: name.to_string(),
            name: name.to_string(),
        }))
    }

    fn create_repository_from_template(
        &self,
        name: &str,
        template_slug: &str,
    ) -> Result<RepoHandle> {
        if !self.template_exists || self.fail_create_for.iter().any(|n| n == name) {
            return Err(Error::TemplateNotFound {
                slug: template_slug.to_string(),
            });
        }
        self.log(format!("create_from_template({})", name));
        self.repos.lock().unwrap().insert(
            name.to_string(),
            RepoState {
                protected: self.initial_protected.clone(),
                ..RepoState::default()
            },
        );
        Ok(RepoHandle {
            locator: name.to_string(),
            name: name.to_string(),
        })
    }

    fn list_collaborators(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        Ok(self.repos.lock().unwrap()[&repo.name].collaborators.clone())
    }

    fn add_collaborator(
        &self,
        repo: &RepoHandle,
        account: &str,
        _permission: Permission,
    ) -> Result<()> {
        if self.fail_members.iter().any(|m| m == account) {
            return Err(Error::RemoteOperation {
                operation: "add_collaborator".to_string(),
                status: Some(403),
                message: format!("cannot add {}", account),
            });
        }
        self.log(format!("add_collaborator({}, {})", repo.name, account));
        self.repos
            .lock()
            .unwrap()
            .get_mut(&repo.name)
            .unwrap()
            .collaborators
            .push(account.to_string());
        Ok(())
    }

    fn list_deploy_keys(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        Ok(self.repos.lock().unwrap()[&repo.name].key_titles.clone())
    }

    fn add_deploy_key(&self, repo: &RepoHandle, title: &str, _payload: &str) -> Result<()> {
        self.log(format!("add_deploy_key({}, {})", repo.name, title));
        self.repos
            .lock()
            .unwrap()
            .get_mut(&repo.name)
            .unwrap()
            .key_titles
            .push(title.to_string());
        Ok(())
    }

    fn list_webhooks(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        Ok(self.repos.lock().unwrap()[&repo.name].hook_urls.clone())
    }

    fn add_webhook(
        &self,
        repo: &RepoHandle,
        url: &str,
        _secret: &str,
        _events: &[&str],
    ) -> Result<()> {
        self.log(format!("add_webhook({}, {})", repo.name, url));
        self.repos
            .lock()
            .unwrap()
            .get_mut(&repo.name)
            .unwrap()
            .hook_urls
            .push(url.to_string());
        Ok(())
    }

    fn team_has_repo(&self, team: &str, repo: &RepoHandle) -> Result<bool> {
        Ok(self.repos.lock().unwrap()[&repo.name]
            .teams
            .iter()
            .any(|t| t == team))
    }

    fn grant_team_repo(
        &self,
        team: &str,
        repo: &RepoHandle,
        _permission: Permission,
    ) -> Result<()> {
        self.log(format!("grant_team_repo({}, {})", repo.name, team));
        self.repos
            .lock()
            .unwrap()
            .get_mut(&repo.name)
            .unwrap()
            .teams
            .push(team.to_string());
        Ok(())
    }

    fn list_protected_branches(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        Ok(self.repos.lock().unwrap()[&repo.name].protected.clone())
    }

    fn unprotect_branch(&self, repo: &RepoHandle, branch: &str) -> Result<()> {
        self.log(format!("unprotect_branch({}, {})", repo.name, branch));
        let mut repos = self.repos.lock().unwrap();
        let state = repos.get_mut(&repo.name).unwrap();
        state.protected.retain(|b| b != branch);
        if let Some(revealed) = state.reveal_queue.pop() {
            state.protected.push(revealed);
        }
        Ok(())
    }

    fn list_members(&self) -> Result<Vec<String>> {
        Ok(self.org_members.clone())
    }

    fn invite_member(&self, account: &str) -> Result<()> {
        self.log(format!("invite_member({})", account));
        Ok(())
    }
}

fn test_config() -> RunConfig {
    RunConfig {
        platform: Platform::Gitlab,
        host: "https://git.example.edu".to_string(),
        organization: "course-2025".to_string(),
        staff_team: "staff".to_string(),
        student_team: Some("students".to_string()),
        template: "Ex1".to_string(),
        student_readable: false,
        remove_branch_protections: true,
        unprotect_before_collaborators: true,
        template_in_staff_group: true,
        credentials: CredentialsSource {
            token_env: None,
            token_file: None,
        },
    }
}

fn team_a() -> GroupRecord {
    GroupRecord {
        display_name: "Team A!".to_string(),
        members: vec!["alice".to_string(), "bob".to_string()],
        public_key: "ssh-key-x".to_string(),
        webhook_payload_url: "https://cg/hooks/1".to_string(),
        webhook_secret: "s3cr3t".to_string(),
    }
}

#[test]
fn test_new_group_performs_exact_call_order() {
    let gateway = MockGateway {
        initial_protected: vec!["main".to_string()],
        ..MockGateway::with_template()
    };
    let config = test_config();

    let report = Reconciler::new(&gateway, &config)
        .run(&[team_a()])
        .unwrap();

    assert_eq!(report.groups_processed, 1);
    assert_eq!(report.groups_failed, 0);
    assert_eq!(
        gateway.calls(),
        vec![
            "create_from_template(Ex1-Team_A_)",
            "unprotect_branch(Ex1-Team_A_, main)",
            "add_collaborator(Ex1-Team_A_, alice)",
            "add_collaborator(Ex1-Team_A_, bob)",
            "grant_team_repo(Ex1-Team_A_, staff)",
            "add_deploy_key(Ex1-Team_A_, codegrade-key)",
            "add_webhook(Ex1-Team_A_, https://cg/hooks/1)",
        ]
    );
}

#[test]
fn test_rerun_against_converged_state_mutates_nothing() {
    let gateway = MockGateway::with_template();
    let config = test_config();
    let roster = [team_a()];

    Reconciler::new(&gateway, &config).run(&roster).unwrap();
    gateway.clear_calls();

    let report = Reconciler::new(&gateway, &config).run(&roster).unwrap();
    assert!(gateway.calls().is_empty(), "re-run made mutating calls: {:?}", gateway.calls());
    assert_eq!(report.groups_processed, 1);
    assert_eq!(report.entries.len(), 1);
    assert!(report.entries[0].outcome.is_success());
}

#[test]
fn test_converged_remote_state_is_reported_as_success() {
    let gateway = MockGateway::with_template();
    gateway.seed_repo(
        "Ex1-Team_A_",
        RepoState {
            collaborators: vec!["alice".to_string(), "bob".to_string()],
            key_titles: vec!["codegrade-key".to_string()],
            hook_urls: vec!["https://cg/hooks/1".to_string()],
            teams: vec!["staff".to_string()],
            ..RepoState::default()
        },
    );
    let config = test_config();

    let report = Reconciler::new(&gateway, &config)
        .run(&[team_a()])
        .unwrap();

    assert!(gateway.calls().is_empty());
    assert_eq!(report.groups_processed, 1);
}

#[test]
fn test_missing_template_fails_group_but_not_batch() {
    let mut gateway = MockGateway::with_template();
    gateway.fail_create_for = vec!["Ex1-Team_B_".to_string()];
    let config = test_config();

    let roster = [
        team_a(),
        GroupRecord {
            display_name: "Team B!".to_string(),
            members: vec!["carol".to_string()],
            public_key: "ssh-key-y".to_string(),
            webhook_payload_url: "https://cg/hooks/2".to_string(),
            webhook_secret: "s2".to_string(),
        },
        GroupRecord {
            display_name: "Team C!".to_string(),
            members: vec!["dave".to_string()],
            public_key: "ssh-key-z".to_string(),
            webhook_payload_url: "https://cg/hooks/3".to_string(),
            webhook_secret: "s3".to_string(),
        },
    ];

    let report = Reconciler::new(&gateway, &config).run(&roster).unwrap();

    assert_eq!(report.groups_processed, 2);
    assert_eq!(report.groups_failed, 1);
    assert_eq!(report.entries.len(), 3);

    assert!(report.entries[0].outcome.is_success());
    assert_eq!(report.entries[1].step, Step::EnsureRepository);
    assert!(matches!(report.entries[1].outcome, Outcome::Failed(_)));
    assert!(report.entries[2].outcome.is_success());

    // The neighbors reached the webhook step.
    let calls = gateway.calls();
    assert!(calls.contains(&"add_webhook(Ex1-Team_A_, https://cg/hooks/1)".to_string()));
    assert!(calls.contains(&"add_webhook(Ex1-Team_C_, https://cg/hooks/3)".to_string()));
    assert!(!calls.iter().any(|call| call.contains("Ex1-Team_B_")));
}

#[test]
fn test_partial_collaborator_failure_does_not_stop_the_group() {
    let mut gateway = MockGateway::with_template();
    gateway.fail_members = vec!["m1".to_string()];
    let config = test_config();

    let roster = [GroupRecord {
        display_name: "Trio".to_string(),
        members: vec!["m1".to_string(), "m2".to_string(), "m3".to_string()],
        public_key: "ssh-key-x".to_string(),
        webhook_payload_url: "https://cg/hooks/9".to_string(),
        webhook_secret: "s9".to_string(),
    }];

    let report = Reconciler::new(&gateway, &config).run(&roster).unwrap();

    assert_eq!(report.members_failed, 1);
    assert_eq!(report.groups_processed, 1);
    assert_eq!(report.groups_failed, 0);

    let calls = gateway.calls();
    assert!(calls.contains(&"add_collaborator(Ex1-Trio, m2)".to_string()));
    assert!(calls.contains(&"add_collaborator(Ex1-Trio, m3)".to_string()));
    // Steps 5-8 still ran.
    assert!(calls.contains(&"grant_team_repo(Ex1-Trio, staff)".to_string()));
    assert!(calls.contains(&"add_deploy_key(Ex1-Trio, codegrade-key)".to_string()));
    assert!(calls.contains(&"add_webhook(Ex1-Trio, https://cg/hooks/9)".to_string()));
}

#[test]
fn test_duplicate_identifiers_abort_before_any_remote_call() {
    let gateway = MockGateway::with_template();
    let config = test_config();

    // Different display names, same sanitized identifier.
    let roster = [
        team_a(),
        GroupRecord {
            display_name: "Team A?".to_string(),
            members: vec!["eve".to_string()],
            public_key: "k".to_string(),
            webhook_payload_url: "https://cg/hooks/4".to_string(),
            webhook_secret: "s4".to_string(),
        },
    ];

    let error = Reconciler::new(&gateway, &config).run(&roster).unwrap_err();
    assert!(matches!(error, Error::DuplicateIdentifier { .. }));
    assert!(gateway.calls().is_empty());
}

#[test]
fn test_student_readable_grants_student_team() {
    let gateway = MockGateway::with_template();
    let mut config = test_config();
    config.student_readable = true;

    Reconciler::new(&gateway, &config)
        .run(&[team_a()])
        .unwrap();

    let calls = gateway.calls();
    let staff = calls
        .iter()
        .position(|c| c == "grant_team_repo(Ex1-Team_A_, staff)")
        .unwrap();
    let students = calls
        .iter()
        .position(|c| c == "grant_team_repo(Ex1-Team_A_, students)")
        .unwrap();
    assert!(staff < students);
}

#[test]
fn test_deploy_key_matched_by_title_only() {
    let gateway = MockGateway::with_template();
    // Same title, arbitrary (stale) payload: must be left alone.
    gateway.seed_repo(
        "Ex1-Team_A_",
        RepoState {
            collaborators: vec!["alice".to_string(), "bob".to_string()],
            key_titles: vec!["codegrade-key".to_string()],
            hook_urls: vec!["https://cg/hooks/1".to_string()],
            teams: vec!["staff".to_string()],
            ..RepoState::default()
        },
    );
    let config = test_config();

    Reconciler::new(&gateway, &config)
        .run(&[team_a()])
        .unwrap();

    assert!(!gateway
        .calls()
        .iter()
        .any(|call| call.starts_with("add_deploy_key")));
}

#[test]
fn test_unprotect_repeats_until_no_protection_remains() {
    let gateway = MockGateway::with_template();
    gateway.seed_repo(
        "Ex1-Team_A_",
        RepoState {
            collaborators: vec!["alice".to_string(), "bob".to_string()],
            key_titles: vec!["codegrade-key".to_string()],
            hook_urls: vec!["https://cg/hooks/1".to_string()],
            teams: vec!["staff".to_string()],
            protected: vec!["main".to_string()],
            reveal_queue: vec!["develop".to_string()],
        },
    );
    let config = test_config();

    let report = Reconciler::new(&gateway, &config)
        .run(&[team_a()])
        .unwrap();

    assert_eq!(report.groups_processed, 1);
    let calls = gateway.calls();
    assert!(calls.contains(&"unprotect_branch(Ex1-Team_A_, main)".to_string()));
    assert!(calls.contains(&"unprotect_branch(Ex1-Team_A_, develop)".to_string()));
}

#[test]
fn test_unprotect_after_collaborators_order_flag() {
    let gateway = MockGateway {
        initial_protected: vec!["main".to_string()],
        ..MockGateway::with_template()
    };
    let mut config = test_config();
    config.unprotect_before_collaborators = false;

    Reconciler::new(&gateway, &config)
        .run(&[team_a()])
        .unwrap();

    let calls = gateway.calls();
    let collaborator = calls
        .iter()
        .position(|c| c.starts_with("add_collaborator"))
        .unwrap();
    let unprotect = calls
        .iter()
        .position(|c| c.starts_with("unprotect_branch"))
        .unwrap();
    assert!(collaborator < unprotect);
}

#[test]
fn test_remove_branch_protections_can_be_disabled() {
    let gateway = MockGateway {
        initial_protected: vec!["main".to_string()],
        ..MockGateway::with_template()
    };
    let mut config = test_config();
    config.remove_branch_protections = false;

    Reconciler::new(&gateway, &config)
        .run(&[team_a()])
        .unwrap();

    assert!(!gateway
        .calls()
        .iter()
        .any(|call| call.starts_with("unprotect_branch")));
}
