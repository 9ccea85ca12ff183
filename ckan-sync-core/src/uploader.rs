//! # uploader: idempotent create-or-update of resources from local files
//!
//! One upload runs these steps in order, stopping at the first error:
//!
//! 1. **Check**: search for a resource whose URL equals the request's canonical URL.
//! 2. **Decide**: a unique match with overwrite → update it; a unique match
//!    without overwrite → refuse with [`SyncError::ResourceAlreadyExists`];
//!    otherwise → create.
//! 3. **Register**: `resource_create` / `resource_update` with the full metadata.
//! 4. **Transfer**: stream the file to the same action as a multipart upload.
//!
//! Registration and transfer are not transactional. If the local file vanished
//! between the two, the remote resource stays registered without content and the
//! upload reports [`SyncError::LocalFileNotFound`].
//!
//! The batch operations run uploads strictly one after another and stop at the first
//! failure, so the successful prefix of the input is always known.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::contract::{
    ActionClient, FileTransfer, RegistrationAction, ResourceMetadata, TransferForm,
};
use crate::error::{RemoteError, SyncError, TransportError};
use crate::request::{ResolvedUpload, UploadRequest};

/// The only status a transfer counts as accepted.
pub const TRANSFER_OK: u16 = 200;

/// What the server said after the file arrived.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The confirmation body parsed as JSON.
    Confirmed { response: Value },
    /// The server accepted the upload but its body was not JSON. The write did happen.
    UnparsedConfirmation { body: String },
}

/// Record of one completed upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    pub path: PathBuf,
    pub action: RegistrationAction,
    pub resource_id: String,
    pub resource_url: String,
    pub package_id: String,
    pub outcome: UploadOutcome,
}

impl UploadReport {
    pub fn is_soft_success(&self) -> bool {
        matches!(self.outcome, UploadOutcome::UnparsedConfirmation { .. })
    }
}

/// Per-file results of a batch, in input order, ending at the first failure.
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<Result<UploadReport, SyncError>>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &UploadReport> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    /// Index into the input and the error of the file that stopped the batch.
    pub fn failure(&self) -> Option<(usize, &SyncError)> {
        self.results
            .iter()
            .enumerate()
            .find_map(|(index, r)| r.as_ref().err().map(|e| (index, e)))
    }

    pub fn is_complete(&self) -> bool {
        self.failure().is_none()
    }
}

/// `id`, `url` and `package_id` as echoed back by a registration call.
#[derive(Debug, Deserialize)]
struct RegisteredResource {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    package_id: Option<String>,
}

pub struct ResourceUploader<'a, C: ?Sized, T: ?Sized> {
    actions: &'a C,
    transfer: &'a T,
    endpoint: &'a str,
}

impl<'a, C, T> ResourceUploader<'a, C, T>
where
    C: ActionClient + ?Sized,
    T: FileTransfer + ?Sized,
{
    /// `endpoint` is the repository site root used to build default resource URLs.
    pub fn new(actions: &'a C, transfer: &'a T, endpoint: &'a str) -> Self {
        ResourceUploader {
            actions,
            transfer,
            endpoint,
        }
    }

    /// Id of the one resource whose URL equals `resource_url`, if exactly one exists.
    ///
    /// Zero and several matches both yield `None`; with several candidates there is
    /// no unique prior resource to update.
    pub async fn resolve_existing(&self, resource_url: &str) -> Result<Option<String>, SyncError> {
        let query = format!("res_url: \"{resource_url}\"");
        let check_failed = |error: RemoteError| SyncError::ExistenceCheckFailed {
            resource_url: resource_url.to_string(),
            error,
        };

        let response = match self.actions.action("package_search", json!({ "fq": query })).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    resource_url,
                    error = ?e,
                    "[UPLOAD][ERROR] package_search transport failure"
                );
                return Err(check_failed(e.into()));
            }
        };

        if !response.success {
            let payload = response.error_payload();
            error!(
                resource_url,
                error = %payload,
                "[UPLOAD][ERROR] package_search reported failure"
            );
            return Err(check_failed(RemoteError::Action(payload)));
        }

        let matches = matching_resource_ids(response.result.as_ref(), resource_url);
        debug!(resource_url, matches = ?matches, "[UPLOAD] Existence check results");

        match matches.as_slice() {
            [only] => Ok(Some(only.clone())),
            [] => Ok(None),
            _ => {
                warn!(
                    resource_url,
                    count = matches.len(),
                    "[UPLOAD] Several resources share this URL, treating as not found"
                );
                Ok(None)
            }
        }
    }

    /// Publish one resolved upload.
    pub async fn upload(&self, request: &ResolvedUpload) -> Result<UploadReport, SyncError> {
        let requested = request.metadata();
        info!(
            path = %request.path().display(),
            resource_url = %requested.url,
            package_id = %requested.package_id,
            "[UPLOAD] Checking for an existing resource"
        );

        let (action, metadata) = match self.resolve_existing(&requested.url).await? {
            Some(existing_id) if request.overwrite_if_exists() => {
                info!(resource_id = %existing_id, "[UPLOAD] Resource exists, updating it");
                let metadata = ResourceMetadata {
                    id: existing_id,
                    ..requested.clone()
                };
                (RegistrationAction::Update, metadata)
            }
            Some(existing_id) => {
                info!(
                    resource_id = %existing_id,
                    resource_url = %requested.url,
                    "[UPLOAD] Resource already exists and overwrite was not requested, skipping"
                );
                return Err(SyncError::ResourceAlreadyExists {
                    resource_id: existing_id,
                    resource_url: requested.url.clone(),
                    package_id: requested.package_id.clone(),
                });
            }
            None => {
                info!(resource_id = %requested.id, "[UPLOAD] No existing resource, creating it");
                (RegistrationAction::Create, requested.clone())
            }
        };

        let registered = self.register(action, &metadata).await?;
        let resource_url = registered.url.unwrap_or_else(|| metadata.url.clone());
        let package_id = registered
            .package_id
            .unwrap_or_else(|| metadata.package_id.clone());

        let form = TransferForm {
            action,
            id: registered.id.clone(),
            path: request.path().to_path_buf(),
            file_name: metadata.name.clone(),
            mimetype: metadata.mimetype.clone(),
            format: metadata.format.clone(),
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            url: resource_url.clone(),
            package_id: package_id.clone(),
        };
        let outcome = self.transfer_file(form).await?;

        info!(
            resource_id = %registered.id,
            action = %action,
            soft = matches!(outcome, UploadOutcome::UnparsedConfirmation { .. }),
            "[UPLOAD] Upload complete"
        );
        Ok(UploadReport {
            path: request.path().to_path_buf(),
            action,
            resource_id: registered.id,
            resource_url,
            package_id,
            outcome,
        })
    }

    /// Resolve `request` against this uploader's endpoint and publish it.
    pub async fn upload_file_into_package(
        &self,
        request: &UploadRequest,
    ) -> Result<UploadReport, SyncError> {
        let resolved = request.resolve(self.endpoint)?;
        self.upload(&resolved).await
    }

    /// Upload `requests` one at a time, stopping at the first failure.
    pub async fn upload_all(&self, requests: &[UploadRequest]) -> BatchReport {
        let mut results = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            info!(
                index,
                path = %request.path.display(),
                total = requests.len(),
                "[UPLOAD] Batch item starting"
            );
            let result = self.upload_file_into_package(request).await;
            if let Err(e) = &result {
                if e.is_already_exists() {
                    info!(index, error = %e, "[UPLOAD] Batch stopped at an existing resource");
                } else {
                    error!(index, error = %e, "[UPLOAD][ERROR] Batch aborted");
                }
                results.push(result);
                break;
            }
            results.push(result);
        }
        BatchReport { results }
    }

    /// Upload `files` into `package_id`, overriding whatever dataset each names.
    pub async fn upload_files_into_package(
        &self,
        files: &[UploadRequest],
        package_id: &str,
    ) -> BatchReport {
        let requests: Vec<UploadRequest> = files
            .iter()
            .cloned()
            .map(|mut request| {
                request.package_id = package_id.to_string();
                request
            })
            .collect();
        self.upload_all(&requests).await
    }

    async fn register(
        &self,
        action: RegistrationAction,
        metadata: &ResourceMetadata,
    ) -> Result<RegisteredResource, SyncError> {
        let failed = |error: RemoteError| SyncError::RegistrationFailed {
            action,
            resource_url: metadata.url.clone(),
            error,
        };

        let params = serde_json::to_value(metadata)
            .map_err(|e| failed(RemoteError::Malformed(e.to_string())))?;

        let response = match self.actions.action(action.action_name(), params).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    action = %action,
                    error = ?e,
                    "[UPLOAD][ERROR] Registration transport failure"
                );
                return Err(failed(e.into()));
            }
        };

        if !response.success {
            let payload = response.error_payload();
            error!(
                action = %action,
                error = %payload,
                "[UPLOAD][ERROR] Registration reported failure"
            );
            return Err(failed(RemoteError::Action(payload)));
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value::<RegisteredResource>(result)
            .map_err(|e| failed(RemoteError::Malformed(e.to_string())))
    }

    async fn transfer_file(&self, form: TransferForm) -> Result<UploadOutcome, SyncError> {
        let path = form.path.clone();
        ensure_readable_file(&path).await.inspect_err(|e| {
            error!(
                path = %path.display(),
                resource_id = %form.id,
                error = %e,
                "[UPLOAD][ERROR] Local file gone after registration, resource has no content"
            );
        })?;

        let response = match self.transfer.transfer(form).await {
            Ok(response) => response,
            Err(TransportError::Indeterminate(detail)) => {
                error!(
                    path = %path.display(),
                    detail = %detail,
                    "[UPLOAD][ERROR] Transfer outcome unknown"
                );
                return Err(SyncError::UnknownTransferError { path, detail });
            }
            Err(e) => {
                error!(path = %path.display(), error = ?e, "[UPLOAD][ERROR] Transfer failed");
                return Err(SyncError::TransferFailed { path, source: e });
            }
        };

        if response.status != TRANSFER_OK {
            error!(
                path = %path.display(),
                status = response.status,
                body = %response.body,
                "[UPLOAD][ERROR] Transfer rejected"
            );
            return Err(SyncError::TransferRejected {
                path,
                status: response.status,
                body: response.body,
            });
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(parsed) => Ok(UploadOutcome::Confirmed { response: parsed }),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "[UPLOAD] Upload complete but the confirmation could not be parsed"
                );
                Ok(UploadOutcome::UnparsedConfirmation {
                    body: response.body,
                })
            }
        }
    }
}

/// Ids of the resources the search matched.
///
/// A result entry that lists `resources` is a dataset hit and contributes the
/// resources whose URL equals `resource_url`. Any other entry is a resource hit and
/// contributes its own `id`.
fn matching_resource_ids(result: Option<&Value>, resource_url: &str) -> Vec<String> {
    let entries = result
        .and_then(|r| r.get("results"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten();

    let mut ids = Vec::new();
    for entry in entries {
        match entry.get("resources").and_then(Value::as_array) {
            Some(resources) => ids.extend(
                resources
                    .iter()
                    .filter(|resource| {
                        resource.get("url").and_then(Value::as_str) == Some(resource_url)
                    })
                    .filter_map(|resource| resource.get("id").and_then(Value::as_str))
                    .map(str::to_string),
            ),
            None => ids.extend(entry.get("id").and_then(Value::as_str).map(str::to_string)),
        }
    }
    ids
}

async fn ensure_readable_file(path: &Path) -> Result<(), SyncError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(SyncError::LocalFileUnreadable {
            path: path.to_path_buf(),
            source: std::io::Error::other("not a regular file"),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SyncError::LocalFileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(SyncError::LocalFileUnreadable {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
