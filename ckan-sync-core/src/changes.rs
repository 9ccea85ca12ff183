//! Change detection: which resources of a dataset were modified after the last sync.
//!
//! The caller keeps the last-sync timestamp; nothing is persisted here. The cutoff is
//! normalised to the timestamp form CKAN writes into `last_modified`
//! (`YYYY-MM-DDTHH:MM:SS.ffffff`, UTC, no offset) so the two compare correctly as
//! strings. The comparison is strict: a resource modified exactly at the cutoff was
//! already seen by the previous sync.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::contract::{ActionClient, Dataset, Resource};
use crate::error::{RemoteError, SyncError};

pub const CKAN_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Result of one change detection run.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeSet {
    /// The normalised cutoff the resources were compared against.
    pub cutoff: String,
    /// The dataset as fetched, with its full resource list in server order.
    pub dataset: Dataset,
    /// Resources with `last_modified > cutoff`, in dataset order.
    pub changed: Vec<Resource>,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn is_empty_dataset(&self) -> bool {
        self.dataset.resources.is_empty()
    }
}

/// Parse a last-sync date and render it in [`CKAN_TIMESTAMP_FORMAT`].
///
/// Accepts RFC 3339 timestamps with an offset (converted to UTC), naive date-times
/// (taken as UTC) and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn normalize_cutoff(input: &str) -> Result<String, SyncError> {
    let trimmed = input.trim();

    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        });

    match parsed {
        Some(dt) => Ok(dt.format(CKAN_TIMESTAMP_FORMAT).to_string()),
        None => {
            warn!(input = %input, "Invalid format for last sync date, expected ISO 8601");
            Err(SyncError::InvalidCutoffFormat {
                input: input.to_string(),
            })
        }
    }
}

/// Stable filter of `resources` down to those modified strictly after `cutoff`.
/// Resources without `last_modified` count as unchanged.
pub fn changed_since(resources: &[Resource], cutoff: &str) -> Vec<Resource> {
    resources
        .iter()
        .filter(|resource| {
            resource
                .last_modified
                .as_deref()
                .is_some_and(|modified| modified > cutoff)
        })
        .cloned()
        .collect()
}

/// Fetch `package_id` and report the resources changed after `last_sync_date`.
///
/// An unparseable date fails before any remote call is made.
pub async fn get_changes_in_dataset_after_date<C>(
    client: &C,
    last_sync_date: &str,
    package_id: &str,
) -> Result<ChangeSet, SyncError>
where
    C: ActionClient + ?Sized,
{
    let cutoff = normalize_cutoff(last_sync_date)?;
    info!(package_id, cutoff = %cutoff, "[CHANGES] Fetching dataset resources");

    let read_failed = |error: RemoteError| SyncError::RemoteReadFailed {
        package_id: package_id.to_string(),
        error,
    };

    let response = match client.action("package_show", json!({ "id": package_id })).await {
        Ok(response) => response,
        Err(e) => {
            error!(
                package_id,
                error = ?e,
                "[CHANGES][ERROR] package_show transport failure"
            );
            return Err(read_failed(e.into()));
        }
    };

    if !response.success {
        let payload = response.error_payload();
        error!(package_id, error = %payload, "[CHANGES][ERROR] package_show reported failure");
        return Err(read_failed(RemoteError::Action(payload)));
    }

    let dataset: Dataset = response
        .result
        .ok_or_else(|| {
            read_failed(RemoteError::Malformed(
                "package_show returned no result".into(),
            ))
        })
        .and_then(|result| {
            serde_json::from_value(result)
                .map_err(|e| read_failed(RemoteError::Malformed(e.to_string())))
        })?;

    let changed = changed_since(&dataset.resources, &cutoff);
    info!(
        package_id,
        total = dataset.resources.len(),
        changed = changed.len(),
        "[CHANGES] Change detection complete"
    );
    debug!(
        changed_ids = ?changed.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        "[CHANGES] Changed resources"
    );

    Ok(ChangeSet {
        cutoff,
        dataset,
        changed,
    })
}
