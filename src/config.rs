//! # Run Configuration
//!
//! Defines the data structures that represent the `course-repo.yaml`
//! configuration file and the logic for loading it.
//!
//! A run configuration names the hosting platform and organization, the
//! template repository to clone for each group, the staff and student teams,
//! and the behavioral flags of the reconciliation run. Credentials are
//! resolved at load time into an explicit [`Credentials`] value that is
//! passed into the gateway constructor; no process-wide state is involved.
//!
//! ```yaml
//! platform: gitlab
//! host: https://git.example.edu
//! organization: geoscripting-2025
//! staff_team: staff
//! student_team: students
//! template: Exercise_1_Starter
//! student_readable: false
//! remove_branch_protections: true
//! credentials:
//!   token_env: COURSE_REPO_TOKEN
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Which hosting backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
    Gitlab,
}

/// Where the credential token comes from. Exactly one source per config.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsSource {
    /// Environment variable holding the token.
    #[serde(default)]
    pub token_env: Option<String>,
    /// File whose first line is the token.
    #[serde(default)]
    pub token_file: Option<String>,
}

/// A resolved API token, ready to hand to a gateway constructor.
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    // Never print the token.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

impl CredentialsSource {
    /// Resolve the source into a concrete token.
    pub fn resolve(&self) -> Result<Credentials> {
        if let Some(var) = &self.token_env {
            let token = std::env::var(var).map_err(|_| Error::CredentialsMissing {
                source_desc: format!("environment variable {} is not set", var),
            })?;
            return Ok(Credentials { token });
        }
        if let Some(path) = &self.token_file {
            let content = fs::read_to_string(path).map_err(|e| Error::CredentialsMissing {
                source_desc: format!("token file {}: {}", path, e),
            })?;
            let token = content
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            if token.is_empty() {
                return Err(Error::CredentialsMissing {
                    source_desc: format!("token file {} is empty", path),
                });
            }
            return Ok(Credentials { token });
        }
        Err(Error::CredentialsMissing {
            source_desc: "set either credentials.token_env or credentials.token_file".to_string(),
        })
    }
}

/// The full run configuration, one per assignment sync.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Hosting backend to talk to.
    pub platform: Platform,
    /// Base URL of the hosting platform API host.
    pub host: String,
    /// Organization (GitHub) or root group path (GitLab) owning the
    /// repositories.
    pub organization: String,
    /// Team/subgroup that gets administrative access to every repository.
    pub staff_team: String,
    /// Team/subgroup that gets read access when `student_readable` is set.
    #[serde(default)]
    pub student_team: Option<String>,
    /// Slug of the template repository cloned for each group.
    pub template: String,
    /// Grant the student team read access to every repository.
    #[serde(default)]
    pub student_readable: bool,
    /// Strip default branch protections from each repository.
    #[serde(default = "default_true")]
    pub remove_branch_protections: bool,
    /// Remove protections before granting collaborators. The source system
    /// did both orders across revisions; this keeps it a choice.
    #[serde(default = "default_true")]
    pub unprotect_before_collaborators: bool,
    /// Look for the template in the staff group rather than among the
    /// token owner's own projects (GitLab only).
    #[serde(default = "default_true")]
    pub template_in_staff_group: bool,
    /// Credential source for the hosting platform token.
    pub credentials: CredentialsSource,
}

fn default_true() -> bool {
    true
}

impl RunConfig {
    /// The student team is only needed when student visibility is on.
    pub fn student_team_required(&self) -> Result<&str> {
        match &self.student_team {
            Some(team) => Ok(team),
            None => Err(Error::ConfigParse {
                message: "student_readable is set but student_team is missing".to_string(),
                hint: Some("add `student_team: <name>` or unset student_readable".to_string()),
            }),
        }
    }
}

/// Parse a configuration from a YAML string.
pub fn parse(content: &str) -> Result<RunConfig> {
    let config: RunConfig = serde_yaml::from_str(content).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: hint_for(&e.to_string()),
    })?;
    url::Url::parse(&config.host)?;
    if config.student_readable {
        config.student_team_required()?;
    }
    Ok(config)
}

/// Load a configuration from a YAML file.
pub fn from_file(path: &Path) -> Result<RunConfig> {
    let content = fs::read_to_string(path)?;
    parse(&content)
}

/// Map common serde messages onto actionable hints.
fn hint_for(message: &str) -> Option<String> {
    if message.contains("missing field") {
        Some("see course-repo.yaml.example for the full list of settings".to_string())
    } else if message.contains("unknown variant") {
        Some("platform must be `github` or `gitlab`".to_string())
    } else {
        None
    }
}
