// # Terraform State Source
//
// Reads the environment's delegated name servers from Terraform state.
//
// ## Location
//
// The configured location is either the state file itself or a directory
// holding `terraform.tfstate`.
//
// ## File Format
//
// Both the state file layout and the `terraform output -json` dump are
// accepted:
//
// ```json
// {
//   "version": 4,
//   "outputs": {
//     "env_dns_zone_name_servers": {
//       "value": ["ns-cloud-a1.googledomains.com.", "ns-cloud-a2.googledomains.com."],
//       "type": ["list", "string"]
//     }
//   }
// }
// ```
//
// ```json
// {
//   "env_dns_zone_name_servers": { "value": "ns-cloud-a1.googledomains.com,ns-cloud-a2.googledomains.com" }
// }
// ```

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::Error;
use crate::record::NameServerSet;
use crate::traits::NameServerSource;

/// Terraform output holding the name servers when none is configured
pub const DEFAULT_STATE_OUTPUT: &str = "env_dns_zone_name_servers";

/// State file name looked up inside a directory location
const STATE_FILE_NAME: &str = "terraform.tfstate";

/// Terraform-backed name server source
///
/// # Example
///
/// ```rust,no_run
/// use nsdelegate_core::state::TerraformStateSource;
/// use nsdelegate_core::traits::NameServerSource;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let source = TerraformStateSource::new("/work/terraform-state");
///     let name_servers = source.name_servers().await?;
///     println!("{}", name_servers);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TerraformStateSource {
    location: PathBuf,
    output: String,
}

impl TerraformStateSource {
    /// Create a source reading the default output
    pub fn new<P: AsRef<Path>>(location: P) -> Self {
        Self::with_output(location, DEFAULT_STATE_OUTPUT)
    }

    /// Create a source reading a named output
    pub fn with_output<P: AsRef<Path>>(location: P, output: impl Into<String>) -> Self {
        Self {
            location: location.as_ref().to_path_buf(),
            output: output.into(),
        }
    }

    /// Resolve the location to a state file path
    async fn state_file(&self) -> Result<PathBuf, Error> {
        let metadata = fs::metadata(&self.location).await.map_err(|e| {
            Error::state_unavailable(format!(
                "Cannot access state location {}: {}",
                self.location.display(),
                e
            ))
        })?;

        if metadata.is_dir() {
            Ok(self.location.join(STATE_FILE_NAME))
        } else {
            Ok(self.location.clone())
        }
    }

    /// Extract the configured output from a parsed state document
    fn extract(&self, document: &Value) -> Result<NameServerSet, Error> {
        let outputs = document.get("outputs").unwrap_or(document);

        let value = match outputs.get(&self.output) {
            Some(output) => output.get("value").unwrap_or(output),
            None => {
                tracing::debug!("Output {} not present in state", self.output);
                return Ok(NameServerSet::new());
            }
        };

        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| {
                        Error::state_unavailable(format!(
                            "Output {} contains a non-string entry: {}",
                            self.output, item
                        ))
                    })
                })
                .collect(),
            Value::String(list) => Ok(NameServerSet::parse_list(list)),
            Value::Null => Ok(NameServerSet::new()),
            other => Err(Error::state_unavailable(format!(
                "Output {} has unsupported type: {}",
                self.output, other
            ))),
        }
    }
}

#[async_trait]
impl NameServerSource for TerraformStateSource {
    async fn name_servers(&self) -> Result<NameServerSet, Error> {
        let path = self.state_file().await?;

        let contents = fs::read_to_string(&path).await.map_err(|e| {
            Error::state_unavailable(format!("Cannot read state file {}: {}", path.display(), e))
        })?;

        let document: Value = serde_json::from_str(&contents).map_err(|e| {
            Error::state_unavailable(format!(
                "State file {} is not valid JSON: {}",
                path.display(),
                e
            ))
        })?;

        self.extract(&document)
    }

    fn describe(&self) -> String {
        format!("terraform output {} at {}", self.output, self.location.display())
    }
}
