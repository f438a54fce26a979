// # hickory Resolution Check
//
// Answers "does this name resolve right now" for the convergence checker.
//
// The resolver is built from the host's resolver configuration with its
// answer cache disabled, so every poll reaches the recursive resolver
// instead of replaying a cached NXDOMAIN from before the delegation was
// published. Any lookup error, including NXDOMAIN and timeouts, and any
// empty answer count as "not resolved".

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use nsdelegate_core::ResolutionCheck;
use tracing::{debug, warn};

/// Resolution check backed by hickory-resolver
pub struct HickoryResolutionCheck {
    resolver: TokioAsyncResolver,
}

impl HickoryResolutionCheck {
    /// Build from the system resolver configuration
    ///
    /// Falls back to hickory's default upstreams if the system
    /// configuration cannot be read.
    pub fn from_system_conf() -> Self {
        let (config, opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                warn!(
                    "Failed to read system resolver configuration, using defaults: {}",
                    e
                );
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self::with_config(config, opts)
    }

    /// Build with an explicit configuration; caching is always disabled
    pub fn with_config(config: ResolverConfig, mut opts: ResolverOpts) -> Self {
        opts.cache_size = 0;
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl std::fmt::Debug for HickoryResolutionCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryResolutionCheck").finish_non_exhaustive()
    }
}

#[async_trait]
impl ResolutionCheck for HickoryResolutionCheck {
    async fn resolves(&self, domain: &str) -> bool {
        match self.resolver.lookup_ip(domain).await {
            Ok(lookup) => {
                let count = lookup.iter().count();
                debug!("{} resolved to {} address(es)", domain, count);
                count > 0
            }
            Err(e) => {
                debug!("{} did not resolve: {}", domain, e);
                false
            }
        }
    }
}
