//! HTTP client for the CKAN action API.
//!
//! This module bridges the collaborator traits of [`ckan_sync_core::contract`] to a real
//! repository. [`CkanClient`] implements both of them:
//!
//! - [`ActionClient`]: JSON `POST <endpoint>/api/3/action/<name>`. CKAN answers error
//!   statuses (403, 404, 409) with the same `{success, error}` envelope, so the body is
//!   decoded whatever the status; only bodies that are not an envelope become
//!   [`TransportError::Decode`].
//! - [`FileTransfer`]: multipart `POST` to `resource_create` / `resource_update` with the
//!   file streamed from disk rather than read into memory.
//!
//! Every request carries the API key in the `Authorization` header.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde_json::Value;
use tokio_util::io::ReaderStream;

use ckan_sync_core::contract::{
    ActionClient, ActionResponse, FileTransfer, TransferForm, TransferResponse,
};
use ckan_sync_core::{ClientConfig, TransportError};

pub struct CkanClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl CkanClient {
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                e
            })?;
        tracing::info!(
            endpoint = %config.endpoint(),
            api_key_set = !config.api_key().is_empty(),
            "Initialized CkanClient"
        );
        Ok(CkanClient { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl ActionClient for CkanClient {
    async fn action(&self, name: &str, params: Value) -> Result<ActionResponse, TransportError> {
        let url = self.config.action_url(name);
        tracing::debug!(action = name, url = %url, %params, "Invoking CKAN action");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.config.api_key())
            .json(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(action = name, error = ?e, "CKAN action request failed");
                TransportError::Request(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::error!(
                action = name,
                status = %status,
                error = ?e,
                "Failed to read CKAN action response"
            );
            TransportError::Decode(e.to_string())
        })?;

        match serde_json::from_str::<ActionResponse>(&body) {
            Ok(envelope) => {
                tracing::info!(
                    action = name,
                    status = %status,
                    success = envelope.success,
                    "CKAN action answered"
                );
                Ok(envelope)
            }
            Err(e) => {
                tracing::error!(
                    action = name,
                    status = %status,
                    error = %e,
                    "CKAN action response is not an envelope"
                );
                Err(TransportError::Decode(format!("status {status}: {e}: {body}")))
            }
        }
    }
}

#[async_trait]
impl FileTransfer for CkanClient {
    async fn transfer(&self, form: TransferForm) -> Result<TransferResponse, TransportError> {
        let url = self.config.action_url(form.action.action_name());
        tracing::info!(
            url = %url,
            path = %form.path.display(),
            resource_id = %form.id,
            "Streaming file to CKAN"
        );

        let file = tokio::fs::File::open(&form.path).await.map_err(|e| {
            TransportError::Request(format!("opening {}: {e}", form.path.display()))
        })?;
        let length = file
            .metadata()
            .await
            .map_err(|e| TransportError::Request(format!("stat {}: {e}", form.path.display())))?
            .len();

        let body = Body::wrap_stream(ReaderStream::new(file));
        let mut upload = Part::stream_with_length(body, length).file_name(form.file_name.clone());
        if let Some(mime) = &form.mimetype {
            upload = upload
                .mime_str(mime)
                .map_err(|e| TransportError::Request(format!("invalid mimetype {mime}: {e}")))?;
        }

        let multipart = Form::new()
            .text("id", form.id)
            .part("upload", upload)
            .text("format", form.format)
            .text("name", form.name)
            .text("description", form.description)
            .text("url", form.url)
            .text("package_id", form.package_id);

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.config.api_key())
            .multipart(multipart)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = ?e, "File transfer request failed");
                TransportError::Request(e.to_string())
            })?;

        let status = response.status().as_u16();
        // Headers arrived, so the server may already have stored the file.
        let body = response.text().await.map_err(|e| {
            tracing::error!(url = %url, status, error = ?e, "Transfer response body unreadable");
            TransportError::Indeterminate(format!("status {status}, body unreadable: {e}"))
        })?;

        tracing::info!(url = %url, status, "File transfer answered");
        Ok(TransferResponse { status, body })
    }
}
