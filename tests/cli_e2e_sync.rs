//! End-to-end tests for the `course-repo` CLI
//!
//! These tests invoke the actual CLI binary and validate its behavior
//! from a user's perspective.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Test that --help flag shows help information
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_sync_help() {
    let mut cmd = cargo_bin_cmd!("course-repo");

    cmd.arg("sync")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Reconcile every roster group's repository",
        ));
}

/// Test that missing config file produces an error
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_sync_missing_config() {
    let mut cmd = cargo_bin_cmd!("course-repo");

    cmd.arg("sync")
        .arg("--config")
        .arg("/nonexistent/course-repo.yaml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

/// Test that missing default config file produces an error
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_sync_missing_default_config() {
    let temp = assert_fs::TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("course-repo");

    cmd.current_dir(temp.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("course-repo.yaml"));
}

/// Test that a config pointing at a missing roster produces an error
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_sync_missing_roster() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config_file = temp.child("course-repo.yaml");
    config_file
        .write_str(
            r#"
platform: gitlab
host: https://git.example.edu
organization: course-2025
staff_team: staff
template: Ex1
credentials:
  token_env: COURSE_REPO_TOKEN
"#,
        )
        .unwrap();

    let mut cmd = cargo_bin_cmd!("course-repo");

    cmd.current_dir(temp.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Roster file not found"));
}

/// Test that a malformed config is reported with a parse error
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_sync_invalid_config() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config_file = temp.child("course-repo.yaml");
    config_file.write_str("platform: bitbucket\n").unwrap();
    let roster_file = temp.child("webhooks.csv");
    roster_file
        .write_str("name,git_ids,payload_url,secret,public_key\n")
        .unwrap();

    let mut cmd = cargo_bin_cmd!("course-repo");

    cmd.current_dir(temp.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration parsing error"));
}

/// Test that unresolvable credentials fail before any remote work
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_sync_missing_credentials() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config_file = temp.child("course-repo.yaml");
    config_file
        .write_str(
            r#"
platform: gitlab
host: https://git.example.edu
organization: course-2025
staff_team: staff
template: Ex1
credentials:
  token_env: COURSE_REPO_E2E_UNSET_TOKEN
"#,
        )
        .unwrap();
    let roster_file = temp.child("webhooks.csv");
    roster_file
        .write_str(
            "name,git_ids,payload_url,secret,public_key\n\
             Team A,alice,https://cg/hooks/1,s1,ssh-key-a\n",
        )
        .unwrap();

    let mut cmd = cargo_bin_cmd!("course-repo");

    cmd.current_dir(temp.path())
        .arg("sync")
        .arg("--quiet")
        .env_remove("COURSE_REPO_E2E_UNSET_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Credentials missing"));
}

/// Test that completions can be generated for bash
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_completions_bash() {
    let mut cmd = cargo_bin_cmd!("course-repo");

    cmd.arg("completions")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("course-repo"));
}

/// Test that the usernames command refuses to overwrite an existing mapping
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_usernames_existing_mapping() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("usernames.csv")
        .write_str("cg_name,cg_user,gl_name,gl_user\n")
        .unwrap();

    let mut cmd = cargo_bin_cmd!("course-repo");

    cmd.current_dir(temp.path())
        .arg("usernames")
        .arg("--host")
        .arg("https://cg.example")
        .arg("--username")
        .arg("u")
        .arg("--password")
        .arg("p")
        .arg("--course")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

/// Test that the invite command validates its inputs
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_invite_missing_config() {
    let temp = assert_fs::TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("course-repo");

    cmd.current_dir(temp.path())
        .arg("invite")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}
