//! Host resolution: liveness probe, then identity query

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::error::{ResolutionFailure, ResolutionReason};
use crate::transport::Transport;
use crate::types::ResolvedHost;

/// Turns user-supplied host names into FQDN endpoints
pub struct HostResolver {
    transport: Arc<dyn Transport>,
    probe_timeout: Duration,
}

impl HostResolver {
    pub fn new(transport: Arc<dyn Transport>, probe_timeout: Duration) -> Self {
        Self {
            transport,
            probe_timeout,
        }
    }

    /// Probe `host`, then ask it for its host and domain name
    ///
    /// The first failing step ends resolution; nothing is retried.
    ///
    /// # Errors
    /// Returns `ResolutionFailure` for a blank name, a failed probe or a
    /// failed identity query.
    #[instrument(skip(self))]
    pub async fn resolve(&self, host: &str) -> Result<ResolvedHost, ResolutionFailure> {
        let short_name = host.trim();
        let fail = |reason: ResolutionReason| ResolutionFailure {
            host: short_name.to_string(),
            reason,
        };

        if short_name.is_empty() {
            return Err(fail(ResolutionReason::EmptyName));
        }

        self.transport
            .probe(short_name, self.probe_timeout)
            .await
            .map_err(|e| fail(ResolutionReason::Unreachable(e.to_string())))?;

        let identity = self
            .transport
            .identity(short_name)
            .await
            .map_err(|e| fail(ResolutionReason::IdentityQueryFailed(e.to_string())))?;

        let fqdn = identity.fqdn();
        debug!(fqdn = %fqdn, "resolved");

        Ok(ResolvedHost {
            short_name: short_name.to_string(),
            fqdn,
        })
    }
}
