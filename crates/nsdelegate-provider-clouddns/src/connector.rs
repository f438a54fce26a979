//! gcloud-backed authentication
//!
//! The service-account key only ever exists as the transient credential
//! file. The connector activates that key with the `gcloud` CLI, asks it
//! for a bearer token, and builds a [`CloudDnsProvider`] around the token.
//!
//! Every gcloud call runs with `CLOUDSDK_CONFIG` pointed at a scratch
//! directory next to the credential file. Activation copies the key into
//! that directory, and the directory is deleted before `connect` returns,
//! whether it succeeded or not. The user's own gcloud configuration is
//! never read or written.
//!
//! Subprocesses are spawned with `kill_on_drop`, so an interrupted run does
//! not leave gcloud running against a key file that is about to vanish.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use nsdelegate_core::{CredentialFile, Error, ProviderConnector, Result, ZoneProvider};
use serde::Deserialize;
use tempfile::TempDir;
use thiserror::Error as ThisError;
use tokio::process::Command;

use crate::{CLOUD_DNS_API_BASE, CloudDnsProvider};

/// Default program used for authentication
pub const GCLOUD_PROGRAM: &str = "gcloud";

/// Environment variable gcloud reads its configuration directory from
pub const GCLOUD_CONFIG_ENV: &str = "CLOUDSDK_CONFIG";

/// The parts of a service-account key the connector reads
#[derive(Deserialize)]
struct ServiceAccountKey {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    client_email: Option<String>,
}

#[derive(Debug, ThisError)]
enum GcloudError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{program} {step}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        step: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`{program} auth print-access-token` returned no token")]
    EmptyToken { program: String },
}

impl From<GcloudError> for Error {
    fn from(err: GcloudError) -> Self {
        Error::auth(err.to_string())
    }
}

/// Connector yielding a [`CloudDnsProvider`]
#[derive(Debug, Clone)]
pub struct CloudDnsConnector {
    /// Overrides the key's `project_id`
    project_id: Option<String>,
    base_url: String,
    dry_run: bool,
    program: PathBuf,
}

impl Default for CloudDnsConnector {
    fn default() -> Self {
        Self {
            project_id: None,
            base_url: CLOUD_DNS_API_BASE.to_string(),
            dry_run: false,
            program: PathBuf::from(GCLOUD_PROGRAM),
        }
    }
}

impl CloudDnsConnector {
    /// Connector running `gcloud` from `PATH` against the public Cloud DNS
    /// API, using the project named in the service-account key
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `project_id` instead of the one in the service-account key
    pub fn with_project_id(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id.filter(|p| !p.trim().is_empty());
        self
    }

    /// Log changes instead of sending them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Point providers at another API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Run another gcloud executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn project_for(&self, key: &ServiceAccountKey) -> Result<String> {
        self.project_id
            .clone()
            .or_else(|| key.project_id.clone().filter(|p| !p.trim().is_empty()))
            .ok_or_else(|| {
                Error::credential(
                    "Service-account key has no project_id and no project override was given",
                )
            })
    }

    async fn gcloud(
        &self,
        config_dir: &Path,
        step: &'static str,
        args: &[&str],
    ) -> std::result::Result<String, GcloudError> {
        let program = self.program.display().to_string();
        tracing::debug!("Running {} {}", program, step);

        let output = Command::new(&self.program)
            .args(args)
            .env(GCLOUD_CONFIG_ENV, config_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| GcloudError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(GcloudError::Failed {
                program,
                step,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Activate the key inside `config_dir` and print a bearer token
    async fn access_token(
        &self,
        config_dir: &Path,
        credential: &CredentialFile,
        client_email: Option<&str>,
    ) -> std::result::Result<String, GcloudError> {
        let key_file = format!("--key-file={}", credential.path().display());
        let mut activate = vec!["auth", "activate-service-account", key_file.as_str(), "--quiet"];
        if let Some(email) = client_email {
            activate.insert(2, email);
        }
        self.gcloud(config_dir, "auth activate-service-account", &activate)
            .await?;

        let token = self
            .gcloud(config_dir, "auth print-access-token", &["auth", "print-access-token"])
            .await?;
        if token.is_empty() {
            return Err(GcloudError::EmptyToken {
                program: self.program.display().to_string(),
            });
        }
        Ok(token)
    }
}

/// Private gcloud configuration directory beside the credential file
fn scratch_config_dir(credential_path: &Path) -> Result<TempDir> {
    let parent = credential_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tempfile::Builder::new()
        .prefix("nsdelegate-gcloud-")
        .tempdir_in(parent)
        .map_err(|e| Error::credential(format!("Failed to create gcloud configuration: {}", e)))
}

#[async_trait]
impl ProviderConnector for CloudDnsConnector {
    async fn connect(&self, credential: &CredentialFile) -> Result<Box<dyn ZoneProvider>> {
        let key: ServiceAccountKey = serde_json::from_str(&credential.read_to_string()?)
            .map_err(|e| Error::credential(format!("Service-account key is not valid JSON: {}", e)))?;
        let project_id = self.project_for(&key)?;

        let config_dir = scratch_config_dir(credential.path())?;
        let token = self
            .access_token(config_dir.path(), credential, key.client_email.as_deref())
            .await;
        config_dir.close().map_err(|e| {
            Error::credential(format!("Failed to remove gcloud configuration: {}", e))
        })?;
        let token = token?;

        tracing::info!(
            "Authenticated {} for project {}",
            key.client_email.as_deref().unwrap_or("service account"),
            project_id
        );
        if self.dry_run {
            tracing::warn!("Cloud DNS provider running in DRY-RUN mode - no changes will be made");
        }

        let provider =
            CloudDnsProvider::new(token, project_id, self.dry_run)?.with_base_url(&self.base_url);
        Ok(Box::new(provider))
    }
}
