//! # contract: remote collaborators and the data they exchange
//!
//! This module defines the two traits the workflows in this crate depend on, and the
//! plain data types that cross them:
//!
//! - [`ActionClient`] invokes a named CKAN action with JSON parameters and returns the
//!   `{success, result, error}` envelope.
//! - [`FileTransfer`] streams a local file plus its metadata to the repository as one
//!   authenticated multipart request.
//!
//! Both are async and `Send + Sync`, so one client value can be shared by reference
//! across the change detector and the uploader. Concrete implementations live in the
//! CLI crate; tests use the `mockall` mocks exported under `test-export-mocks`.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransportError;

/// Envelope returned by every CKAN action call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl ActionResponse {
    pub fn ok(result: Value) -> Self {
        ActionResponse {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: Value) -> Self {
        ActionResponse {
            success: false,
            result: None,
            error: Some(error),
        }
    }

    /// The most descriptive payload available for a failed call.
    pub fn error_payload(&self) -> Value {
        self.error
            .clone()
            .or_else(|| self.result.clone())
            .unwrap_or(Value::Null)
    }
}

/// A remote file entry within a dataset.
///
/// `url` is the dedup key: two resources with the same `url` are the same logical
/// resource whatever their ids. Fields the server sends that are not modelled here
/// are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A dataset ("package") as returned by `package_show`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which metadata-registration action an upload goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationAction {
    Create,
    Update,
}

impl RegistrationAction {
    /// Name of the CKAN action, also the path segment of the transfer endpoint.
    pub fn action_name(self) -> &'static str {
        match self {
            RegistrationAction::Create => "resource_create",
            RegistrationAction::Update => "resource_update",
        }
    }
}

impl fmt::Display for RegistrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action_name())
    }
}

/// Fully defaulted resource metadata, sent as the params of `resource_create` /
/// `resource_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceMetadata {
    pub id: String,
    pub package_id: String,
    pub url: String,
    pub name: String,
    pub description: String,
    pub format: String,
    pub extension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
}

/// Everything the binary transfer needs: the registered id, the file, and the form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferForm {
    pub action: RegistrationAction,
    pub id: String,
    pub path: PathBuf,
    /// File name announced on the `upload` part.
    pub file_name: String,
    pub mimetype: Option<String>,
    pub format: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub package_id: String,
}

/// Raw answer to a transfer: the HTTP status and the body as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResponse {
    pub status: u16,
    pub body: String,
}

/// Invokes named actions on the repository's action API.
///
/// A returned `Ok` means the server answered with an envelope; whether the action
/// succeeded is in [`ActionResponse::success`]. `Err` is reserved for transport
/// failures where no envelope could be obtained.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ActionClient: Send + Sync {
    async fn action(&self, name: &str, params: Value) -> Result<ActionResponse, TransportError>;
}

/// Streams one local file plus metadata to the repository.
///
/// Implementors report any HTTP status as `Ok`; interpreting it is the caller's job.
/// Return [`TransportError::Indeterminate`] when the request went out but its outcome
/// could not be observed.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn transfer(&self, form: TransferForm) -> Result<TransferResponse, TransportError>;
}
