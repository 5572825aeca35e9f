//! GitLab backend for the hosting gateway.
//!
//! Talks to the GitLab REST v4 API over a blocking `ureq` agent. The
//! configured host is the instance URL (`https://git.example.edu`);
//! repositories are projects under the root group, "teams" are subgroups of
//! the root group and a grant is a project share at an access level, and
//! creating from a template is forking the template project under a new
//! name and path.

use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::gateway::{HostingGateway, Permission, RepoHandle};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PER_PAGE: usize = 100;

/// GitLab access levels (Guest 10, Reporter 20, Developer 30, Maintainer 40,
/// Owner 50).
fn access_level(permission: Permission) -> u8 {
    match permission {
        Permission::Read => 20,
        Permission::Maintain => 40,
        Permission::Admin => 50,
    }
}

pub struct GitlabGateway {
    agent: ureq::Agent,
    api: String,
    /// Root group path owning all course projects.
    group: String,
    /// Staff subgroup searched for the template when
    /// `template_in_staff_group` is set.
    staff_group: String,
    template_in_staff_group: bool,
    token: String,
}

impl GitlabGateway {
    pub fn new(
        host: &str,
        group: &str,
        staff_group: &str,
        template_in_staff_group: bool,
        credentials: &Credentials,
    ) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            api: format!("{}/api/v4", host.trim_end_matches('/')),
            group: group.to_string(),
            staff_group: staff_group.to_string(),
            template_in_staff_group,
            token: credentials.token.clone(),
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}{}", self.api, path))
            .set("PRIVATE-TOKEN", &self.token)
    }

    fn get_optional(&self, operation: &str, path: &str) -> Result<Option<Value>> {
        match self.request("GET", path).call() {
            Ok(response) => {
                let body = response
                    .into_json::<Value>()
                    .map_err(|e| remote_error(operation, None, &e.to_string()))?;
                Ok(Some(body))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(map_ureq(operation, e)),
        }
    }

    fn get_paged(&self, operation: &str, path: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let sep = if path.contains('?') { '&' } else { '?' };
            let paged = format!("{}{}per_page={}&page={}", path, sep, PER_PAGE, page);
            let response = self
                .request("GET", &paged)
                .call()
                .map_err(|e| map_ureq(operation, e))?;
            let batch: Vec<Value> = response
                .into_json()
                .map_err(|e| remote_error(operation, None, &e.to_string()))?;
            let short = batch.len() < PER_PAGE;
            items.extend(batch);
            if short {
                return Ok(items);
            }
            page += 1;
        }
    }

    /// POST that treats a conflict as already-present.
    fn post_idempotent(&self, operation: &str, path: &str, body: Value) -> Result<()> {
        match self.request("POST", path).send_json(body) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(409, _)) => Ok(()),
            Err(e) => Err(map_ureq(operation, e)),
        }
    }

    /// Resolve an account name to its numeric user id.
    fn user_id(&self, operation: &str, account: &str) -> Result<u64> {
        let users = self.get_paged(operation, &format!("/users?username={}", account))?;
        users
            .first()
            .and_then(|user| user["id"].as_u64())
            .ok_or_else(|| remote_error(operation, None, &format!("no such user: {}", account)))
    }

    /// Resolve a subgroup path under the root group to its numeric id.
    fn group_id(&self, operation: &str, subgroup: &str) -> Result<u64> {
        let full_path = format!("{}/{}", self.group, subgroup);
        let body = self
            .get_optional(operation, &format!("/groups/{}", encode_path(&full_path)))?
            .ok_or_else(|| remote_error(operation, None, &format!("no such group: {}", full_path)))?;
        body["id"]
            .as_u64()
            .ok_or_else(|| remote_error(operation, None, "group response missing id"))
    }

    /// Locate the template project by path, either in the staff subgroup
    /// (including its subgroups) or among the token owner's own projects.
    fn find_template(&self, template_slug: &str) -> Result<Option<u64>> {
        let path = if self.template_in_staff_group {
            format!(
                "/groups/{}/projects?search={}&include_subgroups=true",
                encode_path(&format!("{}/{}", self.group, self.staff_group)),
                template_slug
            )
        } else {
            format!("/projects?owned=true&search={}", template_slug)
        };
        let projects = self.get_paged("find_template", &path)?;
        Ok(projects
            .iter()
            .find(|project| project["path"].as_str() == Some(template_slug))
            .and_then(|project| project["id"].as_u64()))
    }
}

impl HostingGateway for GitlabGateway {
    fn find_repository(&self, name: &str) -> Result<Option<RepoHandle>> {
        let full_path = format!("{}/{}", self.group, name);
        let body = self.get_optional("find_repository", &format!("/projects/{}", encode_path(&full_path)))?;
        Ok(body.and_then(|project| {
            project["id"].as_u64().map(|id| RepoHandle {
                locator: id.to_string(),
                name: name.to_string(),
            })
        }))
    }

    fn create_repository_from_template(
        &self,
        name: &str,
        template_slug: &str,
    ) -> Result<RepoHandle> {
        let template_id = self
            .find_template(template_slug)?
            .ok_or_else(|| Error::TemplateNotFound {
                slug: template_slug.to_string(),
            })?;
        self.post_idempotent(
            "create_repository_from_template",
            &format!("/projects/{}/fork", template_id),
            json!({
                "name": name,
                "path": name,
                "namespace_path": self.group,
            }),
        )?;
        // Forking is asynchronous on GitLab; the project record itself is
        // visible immediately, so look it up for the handle.
        self.find_repository(name)?
            .ok_or_else(|| Error::RepositoryLookupFailed {
                repo: format!("{}/{}", self.group, name),
            })
    }

    fn list_collaborators(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let items = self.get_paged(
            "list_collaborators",
            &format!("/projects/{}/members/all", repo.locator),
        )?;
        Ok(string_fields(&items, "username"))
    }

    fn add_collaborator(
        &self,
        repo: &RepoHandle,
        account: &str,
        permission: Permission,
    ) -> Result<()> {
        let user_id = self.user_id("add_collaborator", account)?;
        self.post_idempotent(
            "add_collaborator",
            &format!("/projects/{}/members", repo.locator),
            json!({
                "user_id": user_id,
                "access_level": access_level(permission),
            }),
        )
    }

    fn list_deploy_keys(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let items = self.get_paged(
            "list_deploy_keys",
            &format!("/projects/{}/deploy_keys", repo.locator),
        )?;
        Ok(string_fields(&items, "title"))
    }

    fn add_deploy_key(&self, repo: &RepoHandle, title: &str, payload: &str) -> Result<()> {
        self.post_idempotent(
            "add_deploy_key",
            &format!("/projects/{}/deploy_keys", repo.locator),
            json!({ "title": title, "key": payload, "can_push": false }),
        )
    }

    fn list_webhooks(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let items = self.get_paged("list_webhooks", &format!("/projects/{}/hooks", repo.locator))?;
        Ok(string_fields(&items, "url"))
    }

    fn add_webhook(
        &self,
        repo: &RepoHandle,
        url: &str,
        secret: &str,
        events: &[&str],
    ) -> Result<()> {
        let mut body = json!({
            "url": url,
            "token": secret,
            "enable_ssl_verification": true,
        });
        for event in events {
            body[format!("{}_events", event)] = json!(true);
        }
        self.post_idempotent(
            "add_webhook",
            &format!("/projects/{}/hooks", repo.locator),
            body,
        )
    }

    fn team_has_repo(&self, team: &str, repo: &RepoHandle) -> Result<bool> {
        let body = self
            .get_optional("team_has_repo", &format!("/projects/{}", repo.locator))?
            .ok_or_else(|| remote_error("team_has_repo", None, "project vanished"))?;
        let full_path = format!("{}/{}", self.group, team);
        let shared = body["shared_with_groups"]
            .as_array()
            .map(|groups| {
                groups.iter().any(|share| {
                    share["group_full_path"].as_str() == Some(full_path.as_str())
                })
            })
            .unwrap_or(false);
        // The owning namespace needs no share.
        let owned = body["namespace"]["full_path"].as_str() == Some(full_path.as_str());
        Ok(shared || owned)
    }

    fn grant_team_repo(
        &self,
        team: &str,
        repo: &RepoHandle,
        permission: Permission,
    ) -> Result<()> {
        let group_id = self.group_id("grant_team_repo", team)?;
        self.post_idempotent(
            "grant_team_repo",
            &format!("/projects/{}/share", repo.locator),
            json!({
                "group_id": group_id,
                "group_access": access_level(permission),
            }),
        )
    }

    fn list_protected_branches(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let items = self.get_paged(
            "list_protected_branches",
            &format!("/projects/{}/protected_branches", repo.locator),
        )?;
        Ok(string_fields(&items, "name"))
    }

    fn unprotect_branch(&self, repo: &RepoHandle, branch: &str) -> Result<()> {
        let path = format!(
            "/projects/{}/protected_branches/{}",
            repo.locator,
            encode_path(branch)
        );
        match self.request("DELETE", &path).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(404, _)) => Ok(()),
            Err(e) => Err(map_ureq("unprotect_branch", e)),
        }
    }

    fn list_members(&self) -> Result<Vec<String>> {
        let items = self.get_paged(
            "list_members",
            &format!("/groups/{}/members/all", encode_path(&self.group)),
        )?;
        Ok(string_fields(&items, "username"))
    }

    fn invite_member(&self, account: &str) -> Result<()> {
        let user_id = self.user_id("invite_member", account)?;
        // Guest at the root group; the per-repository grants carry the
        // actual access.
        self.post_idempotent(
            "invite_member",
            &format!("/groups/{}/members", encode_path(&self.group)),
            json!({ "user_id": user_id, "access_level": 10 }),
        )
    }
}

/// Percent-encode a namespace path for use as a single URL segment.
///
/// GitLab accepts project and group paths in place of numeric ids when the
/// `/` separators are encoded. Paths here only ever contain sanitized
/// identifier characters, `.` and `/`.
fn encode_path(path: &str) -> String {
    path.replace('/', "%2F").replace('.', "%2E")
}

fn string_fields(items: &[Value], field: &str) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item[field].as_str().map(str::to_string))
        .collect()
}

fn remote_error(operation: &str, status: Option<u16>, message: &str) -> Error {
    Error::RemoteOperation {
        operation: operation.to_string(),
        status,
        message: message.to_string(),
    }
}

fn map_ureq(operation: &str, error: ureq::Error) -> Error {
    match error {
        ureq::Error::Status(status, response) => {
            let message = response.into_string().unwrap_or_default();
            remote_error(operation, Some(status), &message)
        }
        ureq::Error::Transport(transport) => {
            remote_error(operation, None, &transport.to_string())
        }
    }
}
