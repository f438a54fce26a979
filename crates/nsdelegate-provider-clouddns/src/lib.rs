// # Google Cloud DNS Provider
//
// This crate implements the zone provider for Google Cloud DNS managed zones.
//
// ## Scope
//
// - One NS record set, looked up by name and type
// - Changes staged locally and sent as a single Cloud DNS change
//   (deletions and additions applied atomically by the service)
// - Dry-run mode: lookups are real, the change is logged instead of sent
// - HTTP timeout of 30 seconds
// - Specific error messages for 401/403, 404, 412, 429 and 5xx
//
// Retries are not attempted here. A failed request fails the run.
//
// ## Security Requirements
//
// - The bearer token NEVER appears in logs or Debug output
// - The token is obtained per run by the connector and never persisted
//
// ## API Reference
//
// - Cloud DNS v1: https://cloud.google.com/dns/docs/reference/v1
// - Get zone: GET `/projects/:project/managedZones/:zone`
// - List record sets: GET `/projects/:project/managedZones/:zone/rrsets?name=...&type=NS`
// - Create change: POST `/projects/:project/managedZones/:zone/changes`

mod connector;

pub use connector::{CloudDnsConnector, GCLOUD_CONFIG_ENV, GCLOUD_PROGRAM};

use async_trait::async_trait;
use nsdelegate_core::record::{RECORD_TYPE, canonical_name};
use nsdelegate_core::{DelegationRecord, Error, Result, ZoneProvider, ZoneTransaction};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloud DNS API base URL
pub const CLOUD_DNS_API_BASE: &str = "https://dns.googleapis.com/dns/v1";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "clouddns";

#[derive(Debug, Deserialize)]
struct ResourceRecordSetsResponse {
    #[serde(default)]
    rrsets: Vec<ResourceRecordSet>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
struct ResourceRecordSet {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    ttl: u32,
    rrdatas: Vec<String>,
}

/// Deletions must match the stored record set exactly, so records read
/// from the zone are sent back with their original name and rrdatas.
impl From<&DelegationRecord> for ResourceRecordSet {
    fn from(record: &DelegationRecord) -> Self {
        Self {
            name: record.stored_name().to_string(),
            record_type: RECORD_TYPE.to_string(),
            ttl: record.ttl,
            rrdatas: record.stored_values(),
        }
    }
}

impl ResourceRecordSet {
    fn into_record(self) -> DelegationRecord {
        DelegationRecord::observed(&self.name, self.ttl, self.rrdatas)
    }
}

#[derive(Debug, Serialize)]
struct ChangeRequest<'a> {
    deletions: &'a [ResourceRecordSet],
    additions: &'a [ResourceRecordSet],
}

#[derive(Debug, Deserialize)]
struct ChangeResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Authenticated Cloud DNS API handle shared by the provider and its transactions
#[derive(Clone)]
struct CloudDnsApi {
    /// OAuth bearer token
    /// ⚠️ NEVER log this value
    access_token: String,
    project_id: String,
    base_url: String,
    client: reqwest::Client,
    dry_run: bool,
}

impl CloudDnsApi {
    fn zone_url(&self, zone: &str) -> String {
        format!(
            "{}/projects/{}/managedZones/{}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            zone
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .bearer_auth(&self.access_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", e)))
    }
}

/// Map a non-success response to a descriptive error
async fn status_error(response: reqwest::Response, what: &str) -> Error {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    let message = match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: invalid token or insufficient permissions. Status: {}",
            status
        ),
        404 => format!("{}: not found - {}", what, error_text),
        412 => format!(
            "{}: precondition failed, the zone changed since it was inspected - {}",
            what, error_text
        ),
        429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
        500..=599 => format!(
            "Cloud DNS server error (transient): {} - {}",
            status, error_text
        ),
        _ => format!("{} failed: {} - {}", what, status, error_text),
    };

    Error::provider(PROVIDER_NAME, message)
}

/// Google Cloud DNS zone provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone and record set lookups)
/// - Log the change it would have created
/// - **NOT** create the change
pub struct CloudDnsProvider {
    api: CloudDnsApi,
}

// Custom Debug implementation that hides the access token
impl std::fmt::Debug for CloudDnsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudDnsProvider")
            .field("access_token", &"<REDACTED>")
            .field("project_id", &self.api.project_id)
            .field("base_url", &self.api.base_url)
            .field("dry_run", &self.api.dry_run)
            .finish()
    }
}

impl CloudDnsProvider {
    /// Create a new Cloud DNS provider
    ///
    /// # Parameters
    ///
    /// - `access_token`: OAuth bearer token with DNS Administrator rights
    /// - `project_id`: Project owning the managed zone
    /// - `dry_run`: If true, perform lookups but never create changes
    pub fn new(
        access_token: impl Into<String>,
        project_id: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(Error::auth("Cloud DNS access token cannot be empty"));
        }

        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(Error::config("Cloud DNS project ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::provider(PROVIDER_NAME, format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            api: CloudDnsApi {
                access_token,
                project_id,
                base_url: CLOUD_DNS_API_BASE.to_string(),
                client,
                dry_run,
            },
        })
    }

    /// Point the provider at another API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    /// Project the provider operates on
    pub fn project_id(&self) -> &str {
        &self.api.project_id
    }
}

#[async_trait]
impl ZoneProvider for CloudDnsProvider {
    /// Look up the NS record set for `record_name`
    ///
    /// ```http
    /// GET /projects/:project/managedZones/:zone/rrsets?name=ns.example.com.&type=NS
    /// Authorization: Bearer <token>
    /// ```
    ///
    /// An empty list or a 404 means the record set is absent.
    async fn find_record(&self, zone: &str, record_name: &str) -> Result<Option<DelegationRecord>> {
        let fqdn = canonical_name(record_name);
        tracing::debug!("Looking up {} record set {} in zone {}", RECORD_TYPE, fqdn, zone);

        let url = format!("{}/rrsets", self.api.zone_url(zone));
        let response = self
            .api
            .send(
                self.api
                    .client
                    .get(&url)
                    .query(&[("name", fqdn.as_str()), ("type", RECORD_TYPE)]),
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Record set lookup returned 404, treating {} as absent", fqdn);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::query_failed(
                status_error(response, "Record set lookup").await.to_string(),
            ));
        }

        let body: ResourceRecordSetsResponse = response.json().await.map_err(|e| {
            Error::query_failed(format!("Failed to parse record set response: {}", e))
        })?;

        let record = body
            .rrsets
            .into_iter()
            .find(|set| {
                set.record_type.eq_ignore_ascii_case(RECORD_TYPE) && canonical_name(&set.name) == fqdn
            })
            .map(ResourceRecordSet::into_record);

        match &record {
            Some(found) => tracing::debug!("Found {}", found),
            None => tracing::debug!("No {} record set named {}", RECORD_TYPE, fqdn),
        }
        Ok(record)
    }

    /// Confirm the managed zone exists and stage an empty change
    ///
    /// ```http
    /// GET /projects/:project/managedZones/:zone
    /// ```
    async fn begin(&self, zone: &str) -> Result<Box<dyn ZoneTransaction>> {
        let url = self.api.zone_url(zone);
        let response = self.api.send(self.api.client.get(&url)).await?;

        if !response.status().is_success() {
            return Err(Error::open_failed(
                status_error(response, &format!("Managed zone {}", zone))
                    .await
                    .to_string(),
            ));
        }

        tracing::debug!("Opened change for managed zone {}", zone);
        Ok(Box::new(CloudDnsTransaction {
            api: self.api.clone(),
            zone: zone.to_string(),
            deletions: Vec::new(),
            additions: Vec::new(),
        }))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn is_dry_run(&self) -> bool {
        self.api.dry_run
    }
}

/// Change staged against one managed zone
///
/// Nothing is sent until [`ZoneTransaction::execute`]; aborting or dropping
/// the transaction discards the staged record sets.
pub struct CloudDnsTransaction {
    api: CloudDnsApi,
    zone: String,
    deletions: Vec<ResourceRecordSet>,
    additions: Vec<ResourceRecordSet>,
}

impl CloudDnsTransaction {
    fn payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(ChangeRequest {
            deletions: &self.deletions,
            additions: &self.additions,
        })
    }

    fn clear(&mut self) {
        self.deletions.clear();
        self.additions.clear();
    }
}

#[async_trait]
impl ZoneTransaction for CloudDnsTransaction {
    fn queue_remove(&mut self, record: &DelegationRecord) {
        self.deletions.push(record.into());
    }

    fn queue_add(&mut self, record: &DelegationRecord) {
        self.additions.push(record.into());
    }

    /// Send the staged change
    ///
    /// ```http
    /// POST /projects/:project/managedZones/:zone/changes
    /// {
    ///   "deletions": [{"name": "ns.example.com.", "type": "NS", "ttl": 300, "rrdatas": [...]}],
    ///   "additions": [...]
    /// }
    /// ```
    async fn execute(&mut self) -> Result<()> {
        if self.deletions.is_empty() && self.additions.is_empty() {
            return Ok(());
        }

        let url = format!("{}/changes", self.api.zone_url(&self.zone));
        let payload = self.payload()?;

        if self.api.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                url,
                payload
            );
            self.clear();
            return Ok(());
        }

        let response = self
            .api
            .send(self.api.client.post(&url).json(&payload))
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, &format!("Change in zone {}", self.zone)).await);
        }

        let change: ChangeResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to parse change response: {}", e)))?;

        tracing::info!(
            "Cloud DNS change {} accepted for zone {} (status: {})",
            change.id.as_deref().unwrap_or("<unknown>"),
            self.zone,
            change.status.as_deref().unwrap_or("<unknown>")
        );
        self.clear();
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        tracing::debug!(
            "Discarding staged change for zone {} ({} deletions, {} additions)",
            self.zone,
            self.deletions.len(),
            self.additions.len()
        );
        self.clear();
        Ok(())
    }
}
