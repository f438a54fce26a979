//! Environment configuration
//!
//! Every setting comes from a `DELEGATE_*` environment variable. Loading
//! only parses; `validate()` checks cross-field rules and reports the
//! variable to fix.

use anyhow::{Context, Result};
use nsdelegate_core::{Action, ConvergenceConfig, Credential, ReconcileConfig};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_STATE_OUTPUT: &str = nsdelegate_core::state::DEFAULT_STATE_OUTPUT;

/// Application configuration
#[derive(Debug)]
pub struct Config {
    pub action: Action,
    pub state_location: Option<PathBuf>,
    pub state_output: String,
    pub name_servers: Option<String>,
    pub credential: Credential,
    pub credential_dir: Option<PathBuf>,
    pub project_id: Option<String>,
    pub zone: String,
    pub record_name: String,
    pub record_ttl: u32,
    pub verify_after_add: bool,
    pub verify_prefix: String,
    pub required_successes: u32,
    /// `None` means no deadline
    pub verify_timeout_secs: Option<u64>,
    pub dry_run: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).with_context(|| format!("{} is required. Set it via: export {}=...", key, key))
        };

        let verify_timeout_secs = match get("DELEGATE_VERIFY_TIMEOUT_SECS") {
            Some(v) if v.trim().eq_ignore_ascii_case("none") => None,
            Some(v) => Some(parse_number("DELEGATE_VERIFY_TIMEOUT_SECS", &v)?),
            None => ConvergenceConfig::default().timeout_secs,
        };

        let mode = get("DELEGATE_MODE").unwrap_or_else(|| "live".to_string());
        let dry_run = match mode.trim().to_ascii_lowercase().as_str() {
            "live" => false,
            "dry-run" => true,
            other => anyhow::bail!(
                "DELEGATE_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        Ok(Self {
            action: Action::from_str(&required("DELEGATE_ACTION")?)
                .context("DELEGATE_ACTION is invalid")?,
            state_location: get("DELEGATE_STATE_LOCATION").map(PathBuf::from),
            state_output: get("DELEGATE_STATE_OUTPUT")
                .unwrap_or_else(|| DEFAULT_STATE_OUTPUT.to_string()),
            name_servers: get("DELEGATE_NAME_SERVERS"),
            credential: Credential::new(required("DELEGATE_CREDENTIAL")?),
            credential_dir: get("DELEGATE_CREDENTIAL_DIR").map(PathBuf::from),
            project_id: get("DELEGATE_PROJECT_ID"),
            zone: required("DELEGATE_ZONE")?.trim().to_string(),
            record_name: required("DELEGATE_RECORD_NAME")?.trim().to_string(),
            record_ttl: match get("DELEGATE_RECORD_TTL") {
                Some(v) => parse_number("DELEGATE_RECORD_TTL", &v)?,
                None => nsdelegate_core::record::DEFAULT_TTL,
            },
            verify_after_add: match get("DELEGATE_VERIFY_AFTER_ADD") {
                Some(v) => parse_bool("DELEGATE_VERIFY_AFTER_ADD", &v)?,
                None => false,
            },
            verify_prefix: get("DELEGATE_VERIFY_PREFIX")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| "pcf".to_string()),
            required_successes: match get("DELEGATE_REQUIRED_SUCCESSES") {
                Some(v) => parse_number("DELEGATE_REQUIRED_SUCCESSES", &v)?,
                None => ConvergenceConfig::default().required_successes,
            },
            verify_timeout_secs,
            dry_run,
            log_level: get("DELEGATE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Everything here is checked before the credential is written or any
    /// provider call is made.
    pub fn validate(&self) -> Result<()> {
        if self.credential.is_empty() {
            anyhow::bail!("DELEGATE_CREDENTIAL cannot be empty");
        }

        validate_zone_name(&self.zone)?;
        validate_domain_name(&self.record_name)
            .with_context(|| format!("DELEGATE_RECORD_NAME '{}' is invalid", self.record_name))?;

        if self.state_location.is_some() && self.name_servers.is_some() {
            anyhow::bail!(
                "Set only one of DELEGATE_STATE_LOCATION and DELEGATE_NAME_SERVERS"
            );
        }
        if self.action == Action::Add && self.state_location.is_none() && self.name_servers.is_none()
        {
            anyhow::bail!(
                "Action 'add' needs name servers. \
                Set DELEGATE_STATE_LOCATION to the Terraform state, or DELEGATE_NAME_SERVERS"
            );
        }
        if let Some(list) = &self.name_servers {
            for host in list
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|h| !h.is_empty())
            {
                validate_domain_name(host)
                    .with_context(|| format!("DELEGATE_NAME_SERVERS entry '{}' is invalid", host))?;
            }
        }

        if let Some(dir) = &self.credential_dir
            && !dir.is_dir()
        {
            anyhow::bail!(
                "DELEGATE_CREDENTIAL_DIR does not exist or is not a directory: {}",
                dir.display()
            );
        }

        if !(1..=86400).contains(&self.record_ttl) {
            anyhow::bail!(
                "DELEGATE_RECORD_TTL must be between 1 and 86400 seconds. Got: {}",
                self.record_ttl
            );
        }

        if self.verify_after_add {
            if self.required_successes == 0 {
                anyhow::bail!("DELEGATE_REQUIRED_SUCCESSES must be at least 1");
            }
            if self.verify_timeout_secs == Some(0) {
                anyhow::bail!(
                    "DELEGATE_VERIFY_TIMEOUT_SECS must be > 0, or 'none' to wait without a deadline"
                );
            }
            validate_label(&self.verify_prefix)
                .context("DELEGATE_VERIFY_PREFIX must be a single DNS label")?;
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DELEGATE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Whether the run ends with a convergence check
    ///
    /// Dry runs never publish anything, so there is nothing to wait for.
    pub fn verifies(&self) -> bool {
        self.action == Action::Add && self.verify_after_add && !self.dry_run
    }

    /// Reconciliation settings for the core library
    pub fn reconcile_config(&self) -> ReconcileConfig {
        let mut config = ReconcileConfig::new(self.action, &self.zone, &self.record_name)
            .with_ttl(self.record_ttl);
        config.verify_prefix = self.verify_prefix.clone();

        if self.verifies() {
            config = config.with_verification(ConvergenceConfig {
                required_successes: self.required_successes,
                timeout_secs: self.verify_timeout_secs,
                ..ConvergenceConfig::default()
            });
        }
        config
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{} must be a non-negative integer. Got '{}': {}", key, value, e))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: '{}'", key, value),
    }
}

/// Cloud DNS managed zone names: lowercase letters, digits and hyphens
fn validate_zone_name(zone: &str) -> Result<()> {
    if zone.is_empty() || zone.len() > 63 {
        anyhow::bail!("DELEGATE_ZONE must be 1 to 63 characters. Got: '{}'", zone);
    }
    if !zone
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        || !zone.starts_with(|c: char| c.is_ascii_lowercase())
    {
        anyhow::bail!(
            "DELEGATE_ZONE '{}' is not a managed zone name. \
            Use lowercase letters, digits and hyphens, starting with a letter.",
            zone
        );
    }
    Ok(())
}

/// Basic RFC 1035 domain name check; one trailing dot is allowed
fn validate_domain_name(domain: &str) -> Result<()> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }
        validate_label(label)?;
    }

    Ok(())
}

fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        anyhow::bail!("Domain label cannot be empty");
    }

    if label.len() > 63 {
        anyhow::bail!(
            "Domain label too long: {} chars (max 63). Label: '{}'",
            label.len(),
            label
        );
    }

    if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        anyhow::bail!(
            "Domain label contains invalid characters. Label: '{}'. \
            Valid: alphanumeric, hyphen and underscore only.",
            label
        );
    }

    if label.starts_with('-') || label.ends_with('-') {
        anyhow::bail!(
            "Domain label cannot start or end with hyphen. Label: '{}'",
            label
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    fn base(action: &str) -> Vec<(&'static str, String)> {
        vec![
            ("DELEGATE_ACTION", action.to_string()),
            ("DELEGATE_CREDENTIAL", r#"{"project_id":"p"}"#.to_string()),
            ("DELEGATE_ZONE", "parent-zone".to_string()),
            ("DELEGATE_RECORD_NAME", "env.example.com".to_string()),
        ]
    }

    fn load_with(action: &str, extra: &[(&'static str, &str)]) -> Result<Config> {
        let mut vars: Vec<(&str, String)> = base(action);
        vars.extend(extra.iter().map(|(k, v)| (*k, v.to_string())));
        let borrowed: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
        load(&borrowed)
    }

    #[test]
    fn test_remove_defaults() {
        let config = load_with("remove", &[]).unwrap();
        config.validate().unwrap();

        assert_eq!(config.action, Action::Remove);
        assert_eq!(config.record_ttl, 300);
        assert_eq!(config.state_output, "env_dns_zone_name_servers");
        assert_eq!(config.verify_prefix, "pcf");
        assert_eq!(config.required_successes, 3);
        assert_eq!(config.verify_timeout_secs, Some(1800));
        assert!(!config.verify_after_add);
        assert!(!config.dry_run);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_required_variable() {
        let err = load(&[("DELEGATE_ACTION", "remove")]).unwrap_err();
        assert!(err.to_string().contains("DELEGATE_CREDENTIAL is required"));
    }

    #[test]
    fn test_invalid_action() {
        assert!(load_with("delete", &[]).is_err());
    }

    #[test]
    fn test_add_requires_name_servers() {
        let config = load_with("add", &[]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("needs name servers"));

        let config = load_with("add", &[("DELEGATE_NAME_SERVERS", "a.ns.example.net,b.ns.example.net")])
            .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_state_and_override_are_exclusive() {
        let config = load_with(
            "add",
            &[
                ("DELEGATE_STATE_LOCATION", "/tmp/state"),
                ("DELEGATE_NAME_SERVERS", "a.ns.example.net"),
            ],
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_name_server_entry() {
        let config = load_with("add", &[("DELEGATE_NAME_SERVERS", "a.ns.example.net,bad..host")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_none_is_unbounded() {
        let config = load_with(
            "add",
            &[
                ("DELEGATE_NAME_SERVERS", "a.ns.example.net"),
                ("DELEGATE_VERIFY_AFTER_ADD", "true"),
                ("DELEGATE_VERIFY_TIMEOUT_SECS", "none"),
            ],
        )
        .unwrap();
        config.validate().unwrap();

        let reconcile = config.reconcile_config();
        assert!(reconcile.wants_verification());
        assert_eq!(
            reconcile.convergence.deadline(),
            nsdelegate_core::Deadline::Unbounded
        );
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(load_with("remove", &[("DELEGATE_RECORD_TTL", "soon")]).is_err());
        assert!(load_with("remove", &[("DELEGATE_VERIFY_TIMEOUT_SECS", "-1")]).is_err());
        assert!(load_with("remove", &[("DELEGATE_VERIFY_AFTER_ADD", "maybe")]).is_err());

        let config = load_with("remove", &[("DELEGATE_RECORD_TTL", "0")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert!(load_with("remove", &[("DELEGATE_MODE", "dry-run")]).unwrap().dry_run);
        assert!(!load_with("remove", &[("DELEGATE_MODE", "LIVE")]).unwrap().dry_run);
        assert!(load_with("remove", &[("DELEGATE_MODE", "preview")]).is_err());
    }

    #[test]
    fn test_dry_run_skips_verification() {
        let config = load_with(
            "add",
            &[
                ("DELEGATE_NAME_SERVERS", "a.ns.example.net"),
                ("DELEGATE_VERIFY_AFTER_ADD", "yes"),
                ("DELEGATE_MODE", "dry-run"),
            ],
        )
        .unwrap();
        assert!(!config.verifies());
        assert!(!config.reconcile_config().wants_verification());
    }

    #[test]
    fn test_custom_verify_prefix() {
        let config = load_with(
            "add",
            &[
                ("DELEGATE_NAME_SERVERS", "a.ns.example.net"),
                ("DELEGATE_VERIFY_AFTER_ADD", "1"),
                ("DELEGATE_VERIFY_PREFIX", "probe"),
            ],
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(
            config.reconcile_config().verification_domain(),
            "probe.env.example.com"
        );

        let config = load_with(
            "add",
            &[
                ("DELEGATE_NAME_SERVERS", "a.ns.example.net"),
                ("DELEGATE_VERIFY_AFTER_ADD", "1"),
                ("DELEGATE_VERIFY_PREFIX", "two.labels"),
            ],
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zone_name_validation() {
        assert!(validate_zone_name("parent-zone").is_ok());
        assert!(validate_zone_name("Parent").is_err());
        assert!(validate_zone_name("1zone").is_err());
        assert!(validate_zone_name("zone.example").is_err());
    }

    #[test]
    fn test_domain_name_validation() {
        assert!(validate_domain_name("ns.example.com").is_ok());
        assert!(validate_domain_name("ns.example.com.").is_ok());
        assert!(validate_domain_name("").is_err());
        assert!(validate_domain_name("ns..example.com").is_err());
        assert!(validate_domain_name("-ns.example.com").is_err());
        assert!(validate_domain_name(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_missing_credential_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let config =
            load_with("remove", &[("DELEGATE_CREDENTIAL_DIR", missing.to_str().unwrap())]).unwrap();
        assert!(config.validate().is_err());

        let config =
            load_with("remove", &[("DELEGATE_CREDENTIAL_DIR", dir.path().to_str().unwrap())]).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_does_not_expose_credential() {
        let config = load_with("remove", &[]).unwrap();
        assert!(!format!("{:?}", config).contains("project_id"));
    }
}
