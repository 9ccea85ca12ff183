#![doc = "ckan-sync-core: change detection and idempotent upload workflow for CKAN datasets."]

//! This crate holds the decision logic of ckan-sync and nothing that talks HTTP.
//! The remote repository is reached through the traits in [`contract`]; the CLI crate
//! provides the reqwest implementation and tests use the exported `mockall` mocks.
//!
//! # Usage
//! - [`changes::get_changes_in_dataset_after_date`] for resources modified since the last sync.
//! - [`uploader::ResourceUploader`] to publish one file or a batch without duplicates.

pub mod changes;
pub mod config;
pub mod contract;
pub mod defaults;
pub mod error;
pub mod request;
pub mod uploader;

pub use changes::{get_changes_in_dataset_after_date, ChangeSet};
pub use config::ClientConfig;
pub use error::{RemoteError, SyncError, TransportError};
pub use request::{ResolvedUpload, UploadRequest};
pub use uploader::{BatchReport, ResourceUploader, UploadOutcome, UploadReport};
