use ckan_sync_core::changes::{changed_since, get_changes_in_dataset_after_date, normalize_cutoff};
use ckan_sync_core::contract::{ActionResponse, MockActionClient, Resource};
use ckan_sync_core::error::{RemoteError, TransportError};
use ckan_sync_core::SyncError;
use serde_json::{json, Value};

fn resource(id: &str, last_modified: Option<&str>) -> Value {
    json!({
        "id": id,
        "url": format!("https://ckan.example.org/dataset/pkg/resource/{id}"),
        "last_modified": last_modified,
        "size": 42,
    })
}

fn package_show(resources: Vec<Value>) -> ActionResponse {
    ActionResponse::ok(json!({
        "id": "pkg",
        "name": "pkg",
        "resources": resources,
    }))
}

struct CutoffCase {
    name: &'static str,
    input: &'static str,
    expected: &'static str,
}

#[test]
fn test_normalize_cutoff_table_driven() {
    let cases = vec![
        CutoffCase {
            name: "rfc3339 utc",
            input: "2024-03-01T10:20:30Z",
            expected: "2024-03-01T10:20:30.000000",
        },
        CutoffCase {
            name: "rfc3339 with offset converts to utc",
            input: "2024-03-01T12:20:30+02:00",
            expected: "2024-03-01T10:20:30.000000",
        },
        CutoffCase {
            name: "ckan style microseconds",
            input: "2024-03-01T10:20:30.123456",
            expected: "2024-03-01T10:20:30.123456",
        },
        CutoffCase {
            name: "naive without fraction",
            input: "2024-03-01T10:20:30",
            expected: "2024-03-01T10:20:30.000000",
        },
        CutoffCase {
            name: "space separated",
            input: "2024-03-01 10:20:30",
            expected: "2024-03-01T10:20:30.000000",
        },
        CutoffCase {
            name: "date only",
            input: "2024-03-01",
            expected: "2024-03-01T00:00:00.000000",
        },
    ];

    for case in cases {
        let got = normalize_cutoff(case.input)
            .unwrap_or_else(|e| panic!("case '{}' failed to parse: {e}", case.name));
        assert_eq!(got, case.expected, "case '{}'", case.name);
    }
}

#[test]
fn test_normalize_cutoff_rejects_garbage() {
    for input in ["not-a-date", "", "2024-13-45", "yesterday"] {
        let err = normalize_cutoff(input).unwrap_err();
        assert!(
            matches!(err, SyncError::InvalidCutoffFormat { .. }),
            "input {input:?} should be rejected, got {err:?}"
        );
    }
}

#[test]
fn test_changed_since_is_strict_and_stable() {
    let resources: Vec<Resource> = serde_json::from_value(json!([
        resource("c", Some("2024-03-02T00:00:00.000000")),
        resource("boundary", Some("2024-03-01T00:00:00.000000")),
        resource("old", Some("2024-02-01T00:00:00.000000")),
        resource("never", None),
        resource("a", Some("2024-03-01T00:00:00.000001")),
    ]))
    .unwrap();

    let changed = changed_since(&resources, "2024-03-01T00:00:00.000000");
    let ids: Vec<&str> = changed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a"]);
}

#[tokio::test]
async fn test_detect_changes_returns_full_list_and_changed_subset() {
    let mut client = MockActionClient::new();
    client
        .expect_action()
        .withf(|name, params| name == "package_show" && params == &json!({ "id": "pkg" }))
        .times(1)
        .returning(|_, _| {
            Ok(package_show(vec![
                resource("r1", Some("2024-01-01T00:00:00.000000")),
                resource("r2", Some("2024-05-01T08:00:00.500000")),
                resource("r3", Some("2024-04-01T00:00:00.000000")),
            ]))
        });

    let changes = get_changes_in_dataset_after_date(&client, "2024-03-15T00:00:00Z", "pkg")
        .await
        .expect("change detection should succeed");

    assert_eq!(changes.cutoff, "2024-03-15T00:00:00.000000");
    assert_eq!(changes.dataset.resources.len(), 3);
    let ids: Vec<&str> = changes.changed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r2", "r3"]);
    assert!(changes.has_changes());
    // Unmodelled server fields survive the round trip.
    assert_eq!(changes.changed[0].extra.get("size"), Some(&json!(42)));
}

#[tokio::test]
async fn test_nothing_changed_is_distinct_from_empty_dataset() {
    let mut client = MockActionClient::new();
    client
        .expect_action()
        .times(1)
        .returning(|_, _| {
            Ok(package_show(vec![resource(
                "r1",
                Some("2020-01-01T00:00:00.000000"),
            )]))
        });
    let unchanged = get_changes_in_dataset_after_date(&client, "2024-01-01", "pkg")
        .await
        .unwrap();
    assert!(!unchanged.has_changes());
    assert!(!unchanged.is_empty_dataset());

    let mut client = MockActionClient::new();
    client
        .expect_action()
        .times(1)
        .returning(|_, _| Ok(package_show(vec![])));
    let empty = get_changes_in_dataset_after_date(&client, "2024-01-01", "pkg")
        .await
        .unwrap();
    assert!(!empty.has_changes());
    assert!(empty.is_empty_dataset());
}

#[tokio::test]
async fn test_invalid_cutoff_makes_no_remote_call() {
    let mut client = MockActionClient::new();
    client.expect_action().never();

    let err = get_changes_in_dataset_after_date(&client, "not-a-date", "pkg")
        .await
        .unwrap_err();
    match err {
        SyncError::InvalidCutoffFormat { input } => assert_eq!(input, "not-a-date"),
        other => panic!("expected InvalidCutoffFormat, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_failure_is_propagated_verbatim() {
    let mut client = MockActionClient::new();
    client.expect_action().times(1).returning(|_, _| {
        Ok(ActionResponse::failed(json!({
            "__type": "Not Found Error",
            "message": "Not found"
        })))
    });

    let err = get_changes_in_dataset_after_date(&client, "2024-01-01", "missing")
        .await
        .unwrap_err();
    match err {
        SyncError::RemoteReadFailed {
            package_id,
            error: RemoteError::Action(payload),
        } => {
            assert_eq!(package_id, "missing");
            assert_eq!(payload["__type"], "Not Found Error");
        }
        other => panic!("expected RemoteReadFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_failure_is_remote_read_failure() {
    let mut client = MockActionClient::new();
    client
        .expect_action()
        .times(1)
        .returning(|_, _| Err(TransportError::Request("connection refused".into())));

    let err = get_changes_in_dataset_after_date(&client, "2024-01-01", "pkg")
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            SyncError::RemoteReadFailed {
                error: RemoteError::Transport(_),
                ..
            }
        ),
        "got {err:?}"
    );
}
