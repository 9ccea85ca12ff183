use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use ckan_sync::load_config::{load_config, API_KEY_VAR, ENDPOINT_VAR};

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A static config plus the API key from the environment yields a complete client config.
#[test]
#[serial]
fn test_load_config_success_injects_env_secret() {
    let file = config_file(
        r#"
endpoint: "https://ckan.example.org/"
timeout_secs: 30
sync:
  package_id: my-dataset
  files:
    - path: /data/a.csv
      description: First file
    - path: /data/b.png
      filename: picture.png
      overwrite_if_exists: true
      id: custom-id
"#,
    );
    env::set_var(API_KEY_VAR, "top-secret-test-key");
    env::remove_var(ENDPOINT_VAR);

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.client.endpoint(), "https://ckan.example.org");
    assert_eq!(config.client.api_key(), "top-secret-test-key");
    assert_eq!(config.client.timeout(), Duration::from_secs(30));
    assert_eq!(
        config.client.action_url("package_show"),
        "https://ckan.example.org/api/3/action/package_show"
    );

    let sync = config.sync.expect("sync section");
    let requests = sync.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, PathBuf::from("/data/a.csv"));
    assert_eq!(requests[0].package_id, "my-dataset");
    assert_eq!(requests[0].description.as_deref(), Some("First file"));
    assert!(!requests[0].overwrite_if_exists);
    assert_eq!(requests[1].file_name.as_deref(), Some("picture.png"));
    assert_eq!(requests[1].resource_id.as_deref(), Some("custom-id"));
    assert!(requests[1].overwrite_if_exists);
}

#[test]
#[serial]
fn test_env_endpoint_overrides_file() {
    let file = config_file("endpoint: https://file.example.org\n");
    env::set_var(API_KEY_VAR, "key");
    env::set_var(ENDPOINT_VAR, "https://env.example.org");

    let config = load_config(file.path()).expect("Config should load");
    env::remove_var(ENDPOINT_VAR);

    assert_eq!(config.client.endpoint(), "https://env.example.org");
    assert!(config.sync.is_none());
}

#[test]
#[serial]
fn test_load_config_errors_on_missing_api_key() {
    let file = config_file("endpoint: https://ckan.example.org\n");
    env::remove_var(API_KEY_VAR);
    env::remove_var(ENDPOINT_VAR);

    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(msg.contains(API_KEY_VAR), "Must error for missing env var, got: {msg}");
}

#[test]
#[serial]
fn test_load_config_errors_without_endpoint() {
    let file = config_file("timeout_secs: 5\n");
    env::set_var(API_KEY_VAR, "key");
    env::remove_var(ENDPOINT_VAR);

    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(msg.contains("endpoint"), "Endpoint error expected, got: {msg}");
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");
    env::set_var(API_KEY_VAR, "key");

    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_debug_output_redacts_api_key() {
    let file = config_file("endpoint: https://ckan.example.org\n");
    env::set_var(API_KEY_VAR, "very-secret-value");
    env::remove_var(ENDPOINT_VAR);

    let config = load_config(file.path()).unwrap();
    let debug = format!("{:?}", config);
    assert!(!debug.contains("very-secret-value"), "key leaked: {debug}");
}
