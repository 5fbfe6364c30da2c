//! Integration tests for mergebot

#![allow(deprecated)] // cargo_bin is the standard way to test CLI binaries

mod common;

use assert_cmd::Command;
use async_trait::async_trait;
use mergebot::cycle::CycleReport;
use mergebot::error::{Error, Result};
use mergebot::server::{CycleRunner, SCHEDULED, router};
use predicates::prelude::*;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

// =============================================================================
// CLI Tests
// =============================================================================

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("mergebot").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "Update and merge GitHub pull requests",
        ))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("mergebot").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_config_file() {
    let mut cmd = Command::cargo_bin("mergebot").unwrap();
    cmd.args(["--config", "/nonexistent/mergebot.toml"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn test_config_without_token() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[github]\nuser = \"acme\"").unwrap();

    let mut cmd = Command::cargo_bin("mergebot").unwrap();
    cmd.env_remove("GITHUB_TOKEN")
        .arg("--config")
        .arg(file.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("github.token is mandatory"));
}

#[test]
fn test_invalid_merge_method_in_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[github]\nuser = \"acme\"\ntoken = \"t\"\n\n[default]\nmerge_method = \"octopus\""
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("mergebot").unwrap();
    cmd.arg("--config").arg(file.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("octopus"));
}

// =============================================================================
// HTTP trigger
// =============================================================================

#[derive(Default)]
struct CountingRunner {
    runs: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl CycleRunner for CountingRunner {
    async fn run_cycle(&self) -> Result<CycleReport> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::GitHubApi("search failed".to_string()));
        }
        Ok(CycleReport::default())
    }
}

async fn spawn_server(runner: Arc<CountingRunner>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(runner)).await.unwrap();
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn test_trigger_runs_a_cycle() {
    let runner = Arc::new(CountingRunner::default());
    let url = spawn_server(runner.clone()).await;

    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), SCHEDULED);
    assert_eq!(runner.runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_trigger_rejects_other_methods() {
    let runner = Arc::new(CountingRunner::default());
    let url = spawn_server(runner.clone()).await;

    let response = reqwest::Client::new().post(&url).send().await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_trigger_reports_cycle_failure() {
    let runner = Arc::new(CountingRunner {
        fail: true,
        ..CountingRunner::default()
    });
    let url = spawn_server(runner.clone()).await;

    let response = reqwest::get(&url).await.unwrap();

    assert_eq!(
        response.status(),
        reqwest::StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(response.text().await.unwrap(), "Report error.");
}
