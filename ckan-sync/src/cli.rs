///
/// This module implements the CLI interface for ckan-sync: command parsing, the
/// async entrypoint and user-visible output.
///
/// All decision logic (change detection, create-or-update, batch sequencing) lives in
/// the [`ckan-sync-core`] crate. This module only wires a [`CkanClient`] to it and prints
/// the results.
///
/// ## Subcommands
/// - `changes`: list resources of a dataset modified after a date.
/// - `upload`: publish one local file into a dataset.
/// - `sync`: publish every file of the config's `sync` section, in order.
///
/// [`ckan-sync-core`]: ../../ckan-sync-core/
use crate::client::CkanClient;
use crate::load_config::load_config;
use anyhow::{Context, Result};
use ckan_sync_core::changes::get_changes_in_dataset_after_date;
use ckan_sync_core::{ResourceUploader, UploadRequest};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

/// CLI for ckan-sync: detect changed resources and publish local files into CKAN datasets.
#[derive(Parser)]
#[clap(
    name = "ckan-sync",
    version,
    about = "Detect changed CKAN resources and publish local files into datasets without duplicates"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List resources of a dataset modified after the given date
    Changes {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Dataset (package) id or name
        #[clap(long)]
        package: String,
        /// Last sync date, ISO 8601 (e.g. 2024-03-01T00:00:00Z)
        #[clap(long)]
        since: String,
    },
    /// Upload one file into a dataset, creating or updating its resource
    Upload {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Dataset (package) id or name
        #[clap(long)]
        package: String,
        /// Local file to upload
        #[clap(long)]
        file: PathBuf,
        #[clap(long)]
        description: Option<String>,
        /// Resource name; defaults to the file's base name
        #[clap(long)]
        name: Option<String>,
        /// Extension without the dot; defaults to the name's extension
        #[clap(long)]
        extension: Option<String>,
        /// Format label; defaults to the uppercased extension
        #[clap(long)]
        format: Option<String>,
        /// Canonical resource URL used to detect an existing resource
        #[clap(long)]
        url: Option<String>,
        #[clap(long)]
        mimetype: Option<String>,
        /// Update the resource if one with the same URL already exists
        #[clap(long)]
        overwrite: bool,
        /// Resource id; defaults to a slug of the name
        #[clap(long)]
        id: Option<String>,
    },
    /// Upload every file listed in the config's `sync` section, stopping at the first failure
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Changes {
            config,
            package,
            since,
        } => {
            let config = load_config(config)?;
            let client =
                CkanClient::new(config.client).context("Failed to construct CKAN client")?;
            tracing::info!(
                command = "changes",
                package = %package,
                since = %since,
                "Detecting changes"
            );

            let changes = get_changes_in_dataset_after_date(&client, &since, &package).await?;
            let summary = json!({
                "package_id": changes.dataset.id,
                "cutoff": changes.cutoff,
                "total_resources": changes.dataset.resources.len(),
                "changed_resources": changes.changed,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Upload {
            config,
            package,
            file,
            description,
            name,
            extension,
            format,
            url,
            mimetype,
            overwrite,
            id,
        } => {
            let config = load_config(config)?;
            let client =
                CkanClient::new(config.client).context("Failed to construct CKAN client")?;
            let request = UploadRequest {
                path: file,
                package_id: package,
                description,
                file_name: name,
                extension,
                format,
                resource_url: url,
                mimetype,
                overwrite_if_exists: overwrite,
                resource_id: id,
            };
            tracing::info!(command = "upload", path = %request.path.display(), "Uploading file");

            let uploader = ResourceUploader::new(&client, &client, client.config().endpoint());
            match uploader.upload_file_into_package(&request).await {
                Ok(report) => {
                    println!("Upload complete.\nReport:");
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(())
                }
                Err(e) if e.is_already_exists() => {
                    println!("Skipped: {e}. Pass --overwrite to update it.");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "upload", error = %e, "Upload failed");
                    Err(e.into())
                }
            }
        }
        Commands::Sync { config } => {
            let config = load_config(config)?;
            let sync = config
                .sync
                .context("The config file has no `sync` section")?;
            let client =
                CkanClient::new(config.client).context("Failed to construct CKAN client")?;
            let requests = sync.requests();
            tracing::info!(
                command = "sync",
                package = %sync.package_id,
                files = requests.len(),
                "Synchronise starting"
            );
            println!("Synchronise starting...");

            let uploader = ResourceUploader::new(&client, &client, client.config().endpoint());
            let batch = uploader.upload_all(&requests).await;
            for report in batch.succeeded() {
                println!(
                    "{} {} -> {} ({})",
                    report.action,
                    report.path.display(),
                    report.resource_id,
                    report.resource_url
                );
            }

            match batch.failure() {
                None => {
                    println!("Synchronise complete: {} file(s) uploaded.", requests.len());
                    Ok(())
                }
                Some((index, e)) => {
                    tracing::error!(command = "sync", index, error = %e, "Synchronisation stopped");
                    eprintln!("[ERROR] Synchronisation stopped at file #{index}: {e}");
                    Err(anyhow::anyhow!(
                        "synchronisation stopped at file #{index} ({}): {e}",
                        requests[index].path.display()
                    ))
                }
            }
        }
    }
}
