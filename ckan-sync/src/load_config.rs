/// `load_config` module: loads a static YAML config and injects secrets from the environment.
///
/// The YAML file holds nothing sensitive: the repository endpoint, an optional request
/// timeout and an optional `sync` section listing files to publish. The API key only ever
/// comes from `CKAN_API_KEY`; `CKAN_ENDPOINT`, when set, overrides the file's endpoint.
///
/// # Errors
/// All errors use `anyhow::Error` and name the file, key or variable at fault.
use anyhow::Result;
use ckan_sync_core::config::DEFAULT_TIMEOUT_SECS;
use ckan_sync_core::{ClientConfig, UploadRequest};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const API_KEY_VAR: &str = "CKAN_API_KEY";
pub const ENDPOINT_VAR: &str = "CKAN_ENDPOINT";

#[derive(Debug)]
pub struct CliConfig {
    pub client: ClientConfig,
    pub sync: Option<SyncSection>,
}

/// Files to publish into one dataset with `ckan-sync sync`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSection {
    pub package_id: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub resource_url: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub overwrite_if_exists: bool,
    #[serde(default)]
    pub id: Option<String>,
}

impl FileEntry {
    pub fn into_request(self, package_id: &str) -> UploadRequest {
        UploadRequest {
            path: self.path,
            package_id: package_id.to_string(),
            description: self.description,
            file_name: self.filename,
            extension: self.extension,
            format: self.format,
            resource_url: self.resource_url,
            mimetype: self.mimetype,
            overwrite_if_exists: self.overwrite_if_exists,
            resource_id: self.id,
        }
    }
}

impl SyncSection {
    pub fn requests(&self) -> Vec<UploadRequest> {
        self.files
            .iter()
            .cloned()
            .map(|entry| entry.into_request(&self.package_id))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    sync: Option<SyncSection>,
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let endpoint = match std::env::var(ENDPOINT_VAR) {
        Ok(endpoint) if !endpoint.trim().is_empty() => {
            info!(endpoint = %endpoint, "{ENDPOINT_VAR} overrides the configured endpoint");
            endpoint
        }
        _ => match raw.endpoint {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint,
            _ => {
                error!(config_path = ?path_ref, "No endpoint configured");
                anyhow::bail!(
                    "No endpoint configured: set `endpoint` in the config file or {ENDPOINT_VAR}"
                );
            }
        },
    };

    let api_key = match std::env::var(API_KEY_VAR) {
        Ok(key) if !key.is_empty() => {
            info!("{API_KEY_VAR} found in env");
            key
        }
        Ok(_) => {
            error!("{API_KEY_VAR} is empty");
            anyhow::bail!("{API_KEY_VAR} environment variable is empty");
        }
        Err(e) => {
            error!(error = ?e, "{API_KEY_VAR} environment variable not set");
            return Err(anyhow::anyhow!(
                "{API_KEY_VAR} environment variable not set: {e}"
            ));
        }
    };

    let timeout = Duration::from_secs(raw.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let client = ClientConfig::new(endpoint, api_key).with_timeout(timeout);
    client.trace_loaded();

    if let Some(sync) = &raw.sync {
        info!(
            package_id = %sync.package_id,
            files = sync.files.len(),
            "Loaded sync section"
        );
    }

    Ok(CliConfig {
        client,
        sync: raw.sync,
    })
}
