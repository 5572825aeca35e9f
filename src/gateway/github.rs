//! GitHub backend for the hosting gateway.
//!
//! Talks to the GitHub REST v3 API over a blocking `ureq` agent. The
//! configured host is the API base URL (`https://api.github.com`, or
//! `https://ghe.example.edu/api/v3` for an enterprise install); repositories
//! live in one organization, teams are org teams, and the template is a
//! template repository in the same organization.

use std::time::Duration;

use serde_json::{json, Value};

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::gateway::{HostingGateway, Permission, RepoHandle};

/// Requests hanging longer than this indicate a stuck platform, not a slow
/// one.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PER_PAGE: usize = 100;

pub struct GithubGateway {
    agent: ureq::Agent,
    api: String,
    org: String,
    token: String,
}

impl GithubGateway {
    pub fn new(host: &str, organization: &str, credentials: &Credentials) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            api: host.trim_end_matches('/').to_string(),
            org: organization.to_string(),
            token: credentials.token.clone(),
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}{}", self.api, path))
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "course-repo")
    }

    /// GET returning the parsed body, or `None` on 404.
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

    /// GET a paginated collection, following `page=` until a short page.
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

    /// Send a mutating request, treating already-exists conflicts as
    /// success (a concurrent run got there first).
    fn send_idempotent(&self, operation: &str, method: &str, path: &str, body: Value) -> Result<()> {
        match self.request(method, path).send_json(body) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(409, _)) => Ok(()),
            Err(ureq::Error::Status(422, response)) => {
                let detail = response.into_string().unwrap_or_default();
                if detail.contains("already exists") {
                    Ok(())
                } else {
                    Err(remote_error(operation, Some(422), &detail))
                }
            }
            Err(e) => Err(map_ureq(operation, e)),
        }
    }
}

impl HostingGateway for GithubGateway {
    fn find_repository(&self, name: &str) -> Result<Option<RepoHandle>> {
        let path = format!("/repos/{}/{}", self.org, name);
        Ok(self
            .get_optional("find_repository", &path)?
            .map(|_| RepoHandle {
                locator: format!("{}/{}", self.org, name),
                name: name.to_string(),
            }))
    }

    fn create_repository_from_template(
        &self,
        name: &str,
        template_slug: &str,
    ) -> Result<RepoHandle> {
        let template_path = format!("/repos/{}/{}", self.org, template_slug);
        if self
            .get_optional("find_template", &template_path)?
            .is_none()
        {
            return Err(Error::TemplateNotFound {
                slug: template_slug.to_string(),
            });
        }
        self.send_idempotent(
            "create_repository_from_template",
            "POST",
            &format!("{}/generate", template_path),
            json!({
                "owner": self.org,
                "name": name,
                "private": true,
            }),
        )?;
        Ok(RepoHandle {
            locator: format!("{}/{}", self.org, name),
            name: name.to_string(),
        })
    }

    fn list_collaborators(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let items = self.get_paged(
            "list_collaborators",
            &format!("/repos/{}/collaborators", repo.locator),
        )?;
        Ok(string_fields(&items, "login"))
    }

    fn add_collaborator(
        &self,
        repo: &RepoHandle,
        account: &str,
        permission: Permission,
    ) -> Result<()> {
        self.send_idempotent(
            "add_collaborator",
            "PUT",
            &format!("/repos/{}/collaborators/{}", repo.locator, account),
            json!({ "permission": role(permission) }),
        )
    }

    fn list_deploy_keys(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let items = self.get_paged("list_deploy_keys", &format!("/repos/{}/keys", repo.locator))?;
        Ok(string_fields(&items, "title"))
    }

    fn add_deploy_key(&self, repo: &RepoHandle, title: &str, payload: &str) -> Result<()> {
        self.send_idempotent(
            "add_deploy_key",
            "POST",
            &format!("/repos/{}/keys", repo.locator),
            json!({ "title": title, "key": payload, "read_only": false }),
        )
    }

    fn list_webhooks(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let items = self.get_paged("list_webhooks", &format!("/repos/{}/hooks", repo.locator))?;
        Ok(items
            .iter()
            .filter_map(|hook| hook["config"]["url"].as_str().map(str::to_string))
            .collect())
    }

    fn add_webhook(
        &self,
        repo: &RepoHandle,
        url: &str,
        secret: &str,
        events: &[&str],
    ) -> Result<()> {
        self.send_idempotent(
            "add_webhook",
            "POST",
            &format!("/repos/{}/hooks", repo.locator),
            json!({
                "name": "web",
                "active": true,
                "events": events,
                "config": {
                    "url": url,
                    "content_type": "json",
                    "secret": secret,
                },
            }),
        )
    }

    fn team_has_repo(&self, team: &str, repo: &RepoHandle) -> Result<bool> {
        let path = format!("/orgs/{}/teams/{}/repos/{}", self.org, team, repo.locator);
        match self.request("GET", &path).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(e) => Err(map_ureq("team_has_repo", e)),
        }
    }

    fn grant_team_repo(
        &self,
        team: &str,
        repo: &RepoHandle,
        permission: Permission,
    ) -> Result<()> {
        self.send_idempotent(
            "grant_team_repo",
            "PUT",
            &format!("/orgs/{}/teams/{}/repos/{}", self.org, team, repo.locator),
            json!({ "permission": role(permission) }),
        )
    }

    fn list_protected_branches(&self, repo: &RepoHandle) -> Result<Vec<String>> {
        let items = self.get_paged(
            "list_protected_branches",
            &format!("/repos/{}/branches?protected=true", repo.locator),
        )?;
        Ok(string_fields(&items, "name"))
    }

    fn unprotect_branch(&self, repo: &RepoHandle, branch: &str) -> Result<()> {
        let path = format!("/repos/{}/branches/{}/protection", repo.locator, branch);
        match self.request("DELETE", &path).call() {
            Ok(_) => Ok(()),
            // Already unprotected, most likely by a concurrent run.
            Err(ureq::Error::Status(404, _)) => Ok(()),
            Err(e) => Err(map_ureq("unprotect_branch", e)),
        }
    }

    fn list_members(&self) -> Result<Vec<String>> {
        let items = self.get_paged("list_members", &format!("/orgs/{}/members", self.org))?;
        Ok(string_fields(&items, "login"))
    }

    fn invite_member(&self, account: &str) -> Result<()> {
        self.send_idempotent(
            "invite_member",
            "PUT",
            &format!("/orgs/{}/memberships/{}", self.org, account),
            json!({ "role": "member" }),
        )
    }
}

fn role(permission: Permission) -> &'static str {
    match permission {
        Permission::Read => "pull",
        Permission::Maintain => "maintain",
        Permission::Admin => "admin",
    }
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
