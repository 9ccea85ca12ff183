use std::io::Write;
use std::sync::{Arc, Mutex};

use ckan_sync_core::contract::{
    ActionResponse, MockActionClient, MockFileTransfer, TransferResponse,
};
use ckan_sync_core::{ResourceUploader, SyncError, UploadRequest};
use serde_json::json;
use tempfile::TempDir;

const ENDPOINT: &str = "https://ckan.example.org";

fn write_files(dir: &TempDir, names: &[&str]) -> Vec<UploadRequest> {
    names
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            let mut file = std::fs::File::create(&path).expect("create file");
            writeln!(file, "contents of {name}").expect("write file");
            UploadRequest::new(path, "ignored-by-batch")
        })
        .collect()
}

/// Records every action name in call order; fails the search for any URL in `fail_search_for`.
fn recording_client(
    calls: Arc<Mutex<Vec<String>>>,
    fail_search_for: &'static str,
) -> MockActionClient {
    let mut client = MockActionClient::new();
    client.expect_action().returning(move |name, params| {
        let fq = params["fq"].as_str().unwrap_or_default().to_string();
        calls.lock().unwrap().push(format!("{name} {fq}").trim().to_string());
        match name {
            "package_search" if fq.contains(fail_search_for) => {
                Ok(ActionResponse::failed(json!({ "message": "search exploded" })))
            }
            "package_search" => Ok(ActionResponse::ok(json!({ "count": 0, "results": [] }))),
            "resource_create" => Ok(ActionResponse::ok(json!({
                "id": params["id"],
                "url": params["url"],
                "package_id": params["package_id"],
            }))),
            other => panic!("unexpected action {other}"),
        }
    });
    client
}

#[tokio::test]
async fn test_batch_stops_at_first_failure_and_keeps_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_files(&dir, &["a.csv", "b.csv", "c.csv"]);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let client = recording_client(calls.clone(), "b.csv");

    let transferred = Arc::new(Mutex::new(Vec::new()));
    let mut transfer = MockFileTransfer::new();
    let sink = transferred.clone();
    transfer.expect_transfer().returning(move |form| {
        sink.lock().unwrap().push(form.name.clone());
        Ok(TransferResponse {
            status: 200,
            body: "{}".to_string(),
        })
    });

    let uploader = ResourceUploader::new(&client, &transfer, ENDPOINT);
    let batch = uploader.upload_files_into_package(&files, "pkg").await;

    assert_eq!(batch.results.len(), 2, "no attempt record for c.csv");
    let first = batch.results[0].as_ref().expect("a.csv should succeed");
    assert_eq!(first.resource_id, "a.csv");
    assert_eq!(first.package_id, "pkg");
    let (index, err) = batch.failure().expect("b.csv should fail");
    assert_eq!(index, 1);
    assert!(matches!(err, SyncError::ExistenceCheckFailed { .. }), "got {err:?}");
    assert!(!batch.is_complete());
    assert_eq!(batch.succeeded().count(), 1);

    assert_eq!(*transferred.lock().unwrap(), vec!["a.csv".to_string()]);
    let calls = calls.lock().unwrap();
    assert!(
        calls.iter().all(|call| !call.contains("c.csv")),
        "c.csv must never be touched: {calls:?}"
    );
}

#[tokio::test]
async fn test_batch_runs_strictly_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_files(&dir, &["1.txt", "2.txt", "3.txt"]);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let client = recording_client(calls.clone(), "no-such-file");

    let mut transfer = MockFileTransfer::new();
    let log = calls.clone();
    transfer.expect_transfer().times(3).returning(move |form| {
        log.lock().unwrap().push(format!("transfer {}", form.name));
        Ok(TransferResponse {
            status: 200,
            body: "not json".to_string(),
        })
    });

    let uploader = ResourceUploader::new(&client, &transfer, ENDPOINT);
    let batch = uploader.upload_all(&files).await;

    assert!(batch.is_complete());
    assert_eq!(batch.results.len(), 3);
    assert!(batch.succeeded().all(|report| report.is_soft_success()));

    let calls = calls.lock().unwrap();
    let order: Vec<&str> = calls
        .iter()
        .map(|call| call.split_whitespace().next().unwrap_or_default())
        .collect();
    assert_eq!(
        order,
        vec![
            "package_search", "resource_create", "transfer",
            "package_search", "resource_create", "transfer",
            "package_search", "resource_create", "transfer",
        ]
    );
    assert!(calls[2].ends_with("1.txt"));
    assert!(calls[5].ends_with("2.txt"));
    assert!(calls[8].ends_with("3.txt"));
}

#[tokio::test]
async fn test_batch_stops_on_existing_resource_without_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_files(&dir, &["x.json", "y.json"]);

    let mut client = MockActionClient::new();
    client
        .expect_action()
        .withf(|name, _| name == "package_search")
        .times(1)
        .returning(|_, _| {
            Ok(ActionResponse::ok(json!({
                "results": [{
                    "id": "pkg",
                    "resources": [{
                        "id": "x-existing",
                        "url": "https://ckan.example.org/dataset/pkg/resource/x.json"
                    }]
                }]
            })))
        });
    let mut transfer = MockFileTransfer::new();
    transfer.expect_transfer().never();

    let uploader = ResourceUploader::new(&client, &transfer, ENDPOINT);
    let batch = uploader.upload_files_into_package(&files, "pkg").await;

    assert_eq!(batch.results.len(), 1);
    let (index, err) = batch.failure().unwrap();
    assert_eq!(index, 0);
    assert!(err.is_already_exists());
}
