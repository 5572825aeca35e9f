//! # Grading Platform Client
//!
//! Minimal client for the CodeGrade API, used to assemble the roster file
//! the reconciler consumes. For every group (or student) in an assignment
//! it retrieves the git webhook settings — payload URL, shared secret and
//! deploy key — and pairs them with the hosting-platform account names from
//! a local username mapping.
//!
//! Only the handful of endpoints the `hooks` command needs are covered:
//! login, course users, assignment metadata, group-set groups, and webhook
//! settings.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use log::warn;
use serde_json::{json, Value};

use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One output row of the `hooks` command, matching the roster CSV columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub git_ids: Vec<String>,
    pub payload_url: String,
    pub secret: String,
    pub public_key: String,
}

/// Authenticated session against one CodeGrade instance.
pub struct CodegradeClient {
    agent: ureq::Agent,
    base: String,
    token: String,
}

impl CodegradeClient {
    /// Log in with username and password, returning an authenticated
    /// client.
    pub fn login(host: &str, username: &str, password: &str) -> Result<Self> {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        let base = host.trim_end_matches('/').to_string();
        let response = agent
            .post(&format!("{}/api/v1/login", base))
            .send_json(json!({ "username": username, "password": password }))
            .map_err(|e| platform_error("login", e))?;
        let body: Value = response
            .into_json()
            .map_err(|e| Error::GradingPlatform {
                operation: "login".to_string(),
                message: e.to_string(),
            })?;
        let token = body["access_token"]
            .as_str()
            .ok_or_else(|| Error::GradingPlatform {
                operation: "login".to_string(),
                message: "response carried no access_token".to_string(),
            })?
            .to_string();
        Ok(Self { agent, base, token })
    }

    fn get(&self, operation: &str, path: &str) -> Result<Value> {
        self.agent
            .get(&format!("{}{}", self.base, path))
            .set("Authorization", &format!("Bearer {}", self.token))
            .call()
            .map_err(|e| platform_error(operation, e))?
            .into_json()
            .map_err(|e| Error::GradingPlatform {
                operation: operation.to_string(),
                message: e.to_string(),
            })
    }

    fn post(&self, operation: &str, path: &str) -> Result<Value> {
        self.agent
            .post(&format!("{}{}", self.base, path))
            .set("Authorization", &format!("Bearer {}", self.token))
            .call()
            .map_err(|e| platform_error(operation, e))?
            .into_json()
            .map_err(|e| Error::GradingPlatform {
                operation: operation.to_string(),
                message: e.to_string(),
            })
    }

    /// `(id, username, full name)` for every user enrolled in the course.
    pub fn course_users(&self, course_id: u64) -> Result<Vec<(u64, String, String)>> {
        let body = self.get("course_users", &format!("/api/v1/courses/{}/users/", course_id))?;
        let users = body.as_array().cloned().unwrap_or_default();
        Ok(users
            .iter()
            .filter_map(|entry| {
                let user = &entry["User"];
                Some((
                    user["id"].as_u64()?,
                    user["username"].as_str()?.to_string(),
                    user["name"].as_str().unwrap_or_default().to_string(),
                ))
            })
            .collect())
    }

    /// The group set attached to an assignment, if any.
    pub fn assignment_group_set(&self, assignment_id: u64) -> Result<Option<u64>> {
        let body = self.get(
            "assignment_group_set",
            &format!("/api/v1/assignments/{}", assignment_id),
        )?;
        Ok(body["group_set"]["id"].as_u64())
    }

    /// Groups of a group set: `(name, member (id, username) pairs)`.
    pub fn group_set_groups(&self, group_set_id: u64) -> Result<Vec<(String, Vec<(u64, String)>)>> {
        let body = self.get(
            "group_set_groups",
            &format!("/api/v1/group_sets/{}/groups/", group_set_id),
        )?;
        let groups = body.as_array().cloned().unwrap_or_default();
        Ok(groups
            .iter()
            .filter_map(|group| {
                let name = group["name"].as_str()?.to_string();
                let members = group["members"]
                    .as_array()?
                    .iter()
                    .filter_map(|member| {
                        Some((member["id"].as_u64()?, member["username"].as_str()?.to_string()))
                    })
                    .collect();
                Some((name, members))
            })
            .collect())
    }

    /// Git webhook settings for one author within an assignment:
    /// `(payload_url, secret, public_key)`.
    pub fn webhook_settings(&self, assignment_id: u64, author_id: u64) -> Result<(String, String, String)> {
        let body = self.post(
            "webhook_settings",
            &format!(
                "/api/v1/assignments/{}/webhook_settings?webhook_type=git&author={}",
                assignment_id, author_id
            ),
        )?;
        let id = body["id"].as_str().map(str::to_string).or_else(|| {
            body["id"].as_u64().map(|n| n.to_string())
        });
        match (id, body["secret"].as_str(), body["public_key"].as_str()) {
            (Some(id), Some(secret), Some(key)) => Ok((
                format!("{}/api/v1/webhooks/{}", self.base, id),
                secret.to_string(),
                key.to_string(),
            )),
            _ => Err(Error::GradingPlatform {
                operation: "webhook_settings".to_string(),
                message: "response missing id, secret or public_key".to_string(),
            }),
        }
    }
}

/// Build roster entries for a group assignment.
///
/// Groups whose members are not all present in the username mapping are
/// skipped with a warning, as are empty groups: the reconciler requires
/// every record to have at least one resolvable account.
pub fn group_entries(
    client: &CodegradeClient,
    assignment_id: u64,
    git_ids: &HashMap<String, String>,
) -> Result<Vec<RosterEntry>> {
    let group_set = client
        .assignment_group_set(assignment_id)?
        .ok_or_else(|| Error::GradingPlatform {
            operation: "assignment_group_set".to_string(),
            message: "assignment has no group set; use --individual".to_string(),
        })?;

    let mut entries = Vec::new();
    for (name, members) in client.group_set_groups(group_set)? {
        if members.is_empty() {
            warn!("group {:?} is empty, skipping", name);
            continue;
        }
        if !members.iter().all(|(_, username)| git_ids.contains_key(username)) {
            warn!("group {:?} has members without a git account mapping, skipping", name);
            continue;
        }
        // The webhook belongs to the group; any member works as author.
        let (payload_url, secret, public_key) =
            client.webhook_settings(assignment_id, members[0].0)?;
        entries.push(RosterEntry {
            name,
            git_ids: members
                .iter()
                .map(|(_, username)| git_ids[username].clone())
                .collect(),
            payload_url,
            secret,
            public_key,
        });
    }
    Ok(entries)
}

/// Build roster entries for an individual assignment, one per mapped
/// course user.
pub fn individual_entries(
    client: &CodegradeClient,
    assignment_id: u64,
    course_id: u64,
    git_ids: &HashMap<String, String>,
) -> Result<Vec<RosterEntry>> {
    let mut entries = Vec::new();
    for (id, username, name) in client.course_users(course_id)? {
        let Some(git_id) = git_ids.get(&username) else {
            continue;
        };
        let (payload_url, secret, public_key) = client.webhook_settings(assignment_id, id)?;
        entries.push(RosterEntry {
            name: if name.is_empty() { username } else { name },
            git_ids: vec![git_id.clone()],
            payload_url,
            secret,
            public_key,
        });
    }
    Ok(entries)
}

/// Read the grading-to-hosting username mapping
/// (`cg_name,cg_user,gl_name,gl_user`).
pub fn read_username_mapping(path: &Path) -> Result<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| Error::RosterParse {
        message: format!("{}: {}", path.display(), e),
    })?;
    let mut mapping = HashMap::new();
    for row in reader.records() {
        let row = row?;
        let (Some(cg_user), Some(git_user)) = (row.get(1), row.get(3)) else {
            return Err(Error::RosterParse {
                message: format!("{}: expected 4 columns per row", path.display()),
            });
        };
        if git_user.is_empty() {
            warn!("no git account for {:?}, skipping", cg_user);
            continue;
        }
        mapping.insert(cg_user.to_string(), git_user.to_string());
    }
    Ok(mapping)
}

/// Write the username-mapping skeleton (`cg_name,cg_user,gl_name,gl_user`),
/// one row per course user with the hosting-platform columns left blank for
/// manual completion. `read_username_mapping` skips rows until the git
/// account column is filled in.
pub fn write_username_skeleton(path: &Path, users: &[(u64, String, String)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::RosterParse {
        message: format!("{}: {}", path.display(), e),
    })?;
    writer.write_record(["cg_name", "cg_user", "gl_name", "gl_user"])?;
    for (_, username, name) in users {
        writer.write_record([name.as_str(), username.as_str(), "", ""])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write roster entries as the CSV the `sync` command consumes.
pub fn write_roster(path: &Path, entries: &[RosterEntry]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::RosterParse {
        message: format!("{}: {}", path.display(), e),
    })?;
    writer.write_record(["name", "git_ids", "payload_url", "secret", "public_key"])?;
    for entry in entries {
        writer.write_record([
            entry.name.as_str(),
            &entry.git_ids.join(" "),
            entry.payload_url.as_str(),
            entry.secret.as_str(),
            entry.public_key.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn platform_error(operation: &str, error: ureq::Error) -> Error {
    let message = match error {
        ureq::Error::Status(status, response) => {
            // CodeGrade error bodies carry a human-readable `message`.
            let detail = response
                .into_json::<Value>()
                .ok()
                .and_then(|body| body["message"].as_str().map(str::to_string))
                .unwrap_or_default();
            format!("HTTP {}: {}", status, detail)
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    };
    Error::GradingPlatform {
        operation: operation.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_username_mapping() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "cg_name,cg_user,gl_name,gl_user\n\
             Alice A,alice,Alice A,alice-gl\n\
             Bob B,bob,,\n"
        )
        .unwrap();
        let mapping = read_username_mapping(file.path()).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["alice"], "alice-gl");
    }

    #[test]
    fn test_username_skeleton_round_trips_through_mapping_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usernames.csv");
        let users = vec![
            (1, "alice".to_string(), "Alice A".to_string()),
            (2, "bob".to_string(), "Bob B".to_string()),
        ];
        write_username_skeleton(&path, &users).unwrap();

        // Blank git columns: every row is skipped until filled in by hand.
        let mapping = read_username_mapping(&path).unwrap();
        assert!(mapping.is_empty());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("cg_name,cg_user,gl_name,gl_user"));
        assert!(content.contains("Alice A,alice,,"));
    }

    #[test]
    fn test_write_roster_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webhooks.csv");
        let entries = vec![RosterEntry {
            name: "Team A".to_string(),
            git_ids: vec!["alice".to_string(), "bob".to_string()],
            payload_url: "https://cg/hooks/1".to_string(),
            secret: "s3cr3t".to_string(),
            public_key: "ssh-key-x".to_string(),
        }];
        write_roster(&path, &entries).unwrap();

        let records = crate::roster::from_file(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].members, vec!["alice", "bob"]);
        assert_eq!(records[0].webhook_secret, "s3cr3t");
    }
}
