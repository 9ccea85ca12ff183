use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::ResourceMetadata;
use crate::defaults;
use crate::error::SyncError;

/// Caller-supplied description of one file to publish.
///
/// Only `path` and `package_id` are required; everything else is derived by
/// [`UploadRequest::resolve`] when left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub package_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
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
    pub resource_id: Option<String>,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>, package_id: impl Into<String>) -> Self {
        UploadRequest {
            path: path.into(),
            package_id: package_id.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn resource_url(mut self, url: impl Into<String>) -> Self {
        self.resource_url = Some(url.into());
        self
    }

    pub fn mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn overwrite_if_exists(mut self, overwrite: bool) -> Self {
        self.overwrite_if_exists = overwrite;
        self
    }

    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Fill every omitted field and freeze the result.
    ///
    /// The file name is derived first because the default URL and id depend on it.
    pub fn resolve(&self, endpoint: &str) -> Result<ResolvedUpload, SyncError> {
        let invalid = |reason: &str| SyncError::InvalidRequest {
            path: self.path.clone(),
            reason: reason.to_string(),
        };

        if self.package_id.trim().is_empty() {
            return Err(invalid("no dataset id given"));
        }

        let file_name = non_empty(&self.file_name)
            .map(str::to_string)
            .or_else(|| defaults::file_name_from_path(&self.path))
            .ok_or_else(|| invalid("no file name given and none derivable from the path"))?;

        let extension = non_empty(&self.extension)
            .map(|ext| ext.trim_start_matches('.').to_string())
            .or_else(|| defaults::extension_from_file_name(&file_name))
            .unwrap_or_default();

        let url = non_empty(&self.resource_url)
            .map(str::to_string)
            .unwrap_or_else(|| {
                defaults::default_resource_url(endpoint, &self.package_id, &file_name)
            });

        let mimetype = non_empty(&self.mimetype)
            .map(str::to_string)
            .or_else(|| defaults::mimetype_for_extension(&extension));

        let id = non_empty(&self.resource_id)
            .map(str::to_string)
            .unwrap_or_else(|| defaults::slugify(&file_name));

        let format = non_empty(&self.format)
            .map(str::to_string)
            .unwrap_or_else(|| defaults::format_from_extension(&extension));

        let metadata = ResourceMetadata {
            id,
            package_id: self.package_id.clone(),
            url,
            name: file_name,
            description: defaults::description_or_default(self.description.as_deref()),
            format,
            extension,
            mimetype,
        };
        debug!(path = %self.path.display(), ?metadata, "Resolved upload request");

        Ok(ResolvedUpload {
            path: self.path.clone(),
            metadata,
            overwrite_if_exists: self.overwrite_if_exists,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// An [`UploadRequest`] with every field populated. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpload {
    path: PathBuf,
    metadata: ResourceMetadata,
    overwrite_if_exists: bool,
}

impl ResolvedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    pub fn overwrite_if_exists(&self) -> bool {
        self.overwrite_if_exists
    }
}
