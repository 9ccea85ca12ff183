//! Error taxonomy for change detection and resource upload.
//!
//! Every variant carries the dataset, resource URL or local path it concerns, so a
//! caller holding only the error can tell which file or resource failed. Nothing in
//! this crate retries; retry policy belongs to whoever calls it.

use std::path::PathBuf;

use serde_json::Value;

use crate::contract::RegistrationAction;

/// Failure reported by an [`ActionClient`](crate::contract::ActionClient) or
/// [`FileTransfer`](crate::contract::FileTransfer) implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (connection, TLS, timeout, invalid header).
    #[error("request failed: {0}")]
    Request(String),
    /// A response arrived but could not be decoded into the expected envelope.
    #[error("could not decode response: {0}")]
    Decode(String),
    /// The request was sent but the transport cannot tell whether the server applied it.
    #[error("request outcome unknown: {0}")]
    Indeterminate(String),
}

/// Why a remote action did not yield a usable result.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The action ran and answered `success: false`; the payload is kept verbatim.
    #[error("remote action reported failure: {0}")]
    Action(Value),
    /// The action answered `success: true` with a result we could not interpret.
    #[error("unexpected result payload: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid format for last sync date {input:?}: expected an ISO 8601 date")]
    InvalidCutoffFormat { input: String },

    #[error("reading dataset {package_id} failed: {error}")]
    RemoteReadFailed {
        package_id: String,
        #[source]
        error: RemoteError,
    },

    #[error("checking whether {resource_url} already exists failed: {error}")]
    ExistenceCheckFailed {
        resource_url: String,
        #[source]
        error: RemoteError,
    },

    #[error(
        "resource {resource_url} already exists in dataset {package_id} as {resource_id} and overwrite was not requested"
    )]
    ResourceAlreadyExists {
        resource_id: String,
        resource_url: String,
        package_id: String,
    },

    #[error("{action} for {resource_url} failed: {error}")]
    RegistrationFailed {
        action: RegistrationAction,
        resource_url: String,
        #[source]
        error: RemoteError,
    },

    #[error("file {} does not exist", .path.display())]
    LocalFileNotFound { path: PathBuf },

    #[error("file {} could not be read: {source}", .path.display())]
    LocalFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer of {} failed: {source}", .path.display())]
    TransferFailed {
        path: PathBuf,
        #[source]
        source: TransportError,
    },

    #[error("transfer of {} rejected with status {status}: {body}", .path.display())]
    TransferRejected {
        path: PathBuf,
        status: u16,
        body: String,
    },

    #[error("unknown error occurred uploading {}: {detail}", .path.display())]
    UnknownTransferError { path: PathBuf, detail: String },

    #[error("invalid upload request for {}: {reason}", .path.display())]
    InvalidRequest { path: PathBuf, reason: String },
}

impl SyncError {
    /// `true` for the refusal that happens when a resource exists and overwrite was off.
    /// This is an expected outcome of re-running a sync, not a system failure.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, SyncError::ResourceAlreadyExists { .. })
    }
}
