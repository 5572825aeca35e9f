//! # Roster Model and Loading
//!
//! The roster is the authoritative list of groups (or individuals) for an
//! assignment, one [`GroupRecord`] per row. Records are loaded once per run
//! and are read-only thereafter; everything the reconciler does is derived
//! from them.
//!
//! The on-disk format is the CSV produced by the `hooks` command:
//!
//! ```csv
//! name,git_ids,payload_url,secret,public_key
//! Team A,alice bob,https://cg.example/api/v1/webhooks/1,s3cr3t,ssh-rsa AAAA...
//! ```
//!
//! `git_ids` is a space-separated list of hosting-platform account names.
//! Rows with an empty member list are filtered out here with a warning so
//! the core never sees an empty-member record.

use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::error::{Error, Result};

/// One desired-state record: a group (or single student) and everything
/// needed to provision its repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Human-readable group or student name; may contain arbitrary
    /// characters and need not be unique.
    pub display_name: String,
    /// Hosting-platform account names; never empty.
    pub members: Vec<String>,
    /// Deploy-key payload (opaque, platform-specific format).
    pub public_key: String,
    /// Absolute URL the webhook should deliver to.
    pub webhook_payload_url: String,
    /// Shared secret for the webhook.
    pub webhook_secret: String,
}

/// Raw CSV row as written by the `hooks` command.
#[derive(Debug, Deserialize)]
struct RosterRow {
    name: String,
    git_ids: String,
    payload_url: String,
    secret: String,
    public_key: String,
}

/// Load the roster from a CSV file.
///
/// Rows with no members are skipped with a warning; rows missing any other
/// required field fail the load.
pub fn from_file(path: &Path) -> Result<Vec<GroupRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| Error::RosterParse {
        message: format!("{}: {}", path.display(), e),
    })?;

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<RosterRow>().enumerate() {
        let row = row.map_err(|e| Error::RosterParse {
            message: format!("{} row {}: {}", path.display(), index + 1, e),
        })?;
        match record_from_row(row, index + 1)? {
            Some(record) => records.push(record),
            None => continue,
        }
    }
    Ok(records)
}

fn record_from_row(row: RosterRow, row_number: usize) -> Result<Option<GroupRecord>> {
    let members: Vec<String> = row
        .git_ids
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if members.is_empty() {
        warn!(
            "roster row {} ({:?}) has no members, skipping",
            row_number, row.name
        );
        return Ok(None);
    }

    for (field, value) in [
        ("name", &row.name),
        ("payload_url", &row.payload_url),
        ("secret", &row.secret),
        ("public_key", &row.public_key),
    ] {
        if value.trim().is_empty() {
            return Err(Error::RosterParse {
                message: format!("row {}: missing required field `{}`", row_number, field),
            });
        }
    }

    Ok(Some(GroupRecord {
        display_name: row.name,
        members,
        public_key: row.public_key,
        webhook_payload_url: row.payload_url,
        webhook_secret: row.secret,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_roster(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_roster_two_groups() {
        let file = write_roster(
            "name,git_ids,payload_url,secret,public_key\n\
             Team A,alice bob,https://cg/hooks/1,s1,ssh-key-a\n\
             Team B,carol,https://cg/hooks/2,s2,ssh-key-b\n",
        );
        let records = from_file(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].display_name, "Team A");
        assert_eq!(records[0].members, vec!["alice", "bob"]);
        assert_eq!(records[1].members, vec!["carol"]);
        assert_eq!(records[1].webhook_payload_url, "https://cg/hooks/2");
    }

    #[test]
    fn test_empty_member_row_is_skipped() {
        let file = write_roster(
            "name,git_ids,payload_url,secret,public_key\n\
             Ghost Team,,https://cg/hooks/1,s1,ssh-key-a\n\
             Team B,carol,https://cg/hooks/2,s2,ssh-key-b\n",
        );
        let records = from_file(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name, "Team B");
    }

    #[test]
    fn test_missing_secret_fails() {
        let file = write_roster(
            "name,git_ids,payload_url,secret,public_key\n\
             Team A,alice,https://cg/hooks/1,,ssh-key-a\n",
        );
        let err = from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("secret"));
    }

    #[test]
    fn test_missing_file_fails() {
        let err = from_file(Path::new("/nonexistent/roster.csv")).unwrap_err();
        assert!(err.to_string().contains("Roster parsing error"));
    }
}
