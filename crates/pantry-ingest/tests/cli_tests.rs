//! End-to-end tests for the pantry-ingest binary
//!
//! Every command runs inside a temp directory with an explicit checkpoint
//! path, so no `.env`, log directory or checkpoint from the host leaks in.

use assert_cmd::Command;
use chrono::Utc;
use pantry_common::checkpoint::CheckpointStore;
use pantry_common::types::IngestionCheckpoint;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn pantry_ingest(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pantry-ingest").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DATABASE_URL")
        .env_remove("FDC_API_KEY")
        .env_remove("FDC_DATA_TYPES")
        .env_remove("INGEST_CHECKPOINT_PATH")
        .env("LOG_OUTPUT", "console")
        .env("LOG_LEVEL", "warn");
    cmd
}

fn saved_checkpoint(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("cp.json");
    let mut cp = IngestionCheckpoint::new(vec!["Foundation".to_string()], Utc::now());
    cp.record_partition_total("Foundation", 40);
    cp.record_processed(10);
    cp.record_writes(9, 1, 0);
    cp.complete_page(5);
    cp.append_error("[2026-01-01T00:00:00Z] Foundation page 3 retry 1/3: timeout");
    CheckpointStore::new(&path).save(&cp).unwrap();
    path
}

#[test]
fn test_status_without_checkpoint() {
    let dir = TempDir::new().unwrap();
    pantry_ingest(&dir)
        .args(["status", "--checkpoint"])
        .arg(dir.path().join("cp.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No active run"));
}

#[test]
fn test_monitor_once_without_checkpoint() {
    let dir = TempDir::new().unwrap();
    pantry_ingest(&dir)
        .args(["monitor", "--once", "--checkpoint"])
        .arg(dir.path().join("cp.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No active run"));
}

#[test]
fn test_status_table() {
    let dir = TempDir::new().unwrap();
    let path = saved_checkpoint(&dir);

    pantry_ingest(&dir)
        .arg("status")
        .arg("--checkpoint")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("10/40 (25.0%)"))
        .stdout(predicate::str::contains("retry 1/3"));
}

#[test]
fn test_status_json() {
    let dir = TempDir::new().unwrap();
    let path = saved_checkpoint(&dir);

    let output = pantry_ingest(&dir)
        .args(["status", "--json", "--checkpoint"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["processedItems"], 10);
    assert_eq!(value["currentPage"], 5);
    assert_eq!(value["status"], "running");
}

#[test]
fn test_monitor_once_renders_progress() {
    let dir = TempDir::new().unwrap();
    let path = saved_checkpoint(&dir);

    pantry_ingest(&dir)
        .args(["monitor", "--once", "--checkpoint"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("25.0%"));
}

#[test]
fn test_run_requires_database_url() {
    let dir = TempDir::new().unwrap();
    pantry_ingest(&dir)
        .args(["run", "--checkpoint"])
        .arg(dir.path().join("cp.json"))
        .env("FDC_BASE_URL", "http://127.0.0.1:9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL"));
}

#[test]
fn test_run_rejects_oversized_page() {
    let dir = TempDir::new().unwrap();
    pantry_ingest(&dir)
        .args(["run", "--dry-run", "--page-size", "500", "--checkpoint"])
        .arg(dir.path().join("cp.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("page size"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dry_run_ingests_from_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foods/search"))
        .and(query_param("dataType", "Foundation"))
        .and(query_param("pageNumber", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalHits": 2,
            "currentPage": 1,
            "totalPages": 1,
            "foods": [
                {"fdcId": 1, "description": "Kale, raw", "dataType": "Foundation"},
                {"fdcId": 2, "description": "Spinach, raw", "dataType": "Foundation"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("cp.json");

    pantry_ingest(&dir)
        .args(["run", "--dry-run", "--data-type", "Foundation", "--checkpoint"])
        .arg(&checkpoint)
        .env("FDC_BASE_URL", server.uri())
        .env("FDC_API_KEY", "test-key")
        .env("FDC_REQUESTS_PER_HOUR", "3600000")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingestion complete"))
        .stdout(predicate::str::contains("Processed: 2"));

    // Dry runs never touch the real checkpoint
    assert!(!checkpoint.exists());
    let dry = CheckpointStore::new(dir.path().join("cp.dry-run.json"))
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(dry.processed_items, 2);
    assert_eq!(dry.successful_inserts, 2);
}
