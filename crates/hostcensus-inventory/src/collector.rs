//! Fleet-wide inventory collection

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use tracing::{info, instrument, warn};

use crate::error::{ConfigError, HostFailure};
use crate::executor::QueryExecutor;
use crate::resolver::HostResolver;
use crate::transport::Transport;
use crate::types::{CollectionKind, CollectionRequest, CollectionResult, InventoryRecord};

/// Per-host outcome before it is merged into the run result
type HostOutcome = Result<Vec<InventoryRecord>, HostFailure>;

/// Inventory collector
///
/// Resolves and queries every host of a request, skipping hosts that fail
/// and merging the rest into one result in host-list order.
pub struct InventoryCollector {
    resolver: HostResolver,
    executor: QueryExecutor,
    /// Hosts processed at once; 1 is strictly sequential
    concurrency: usize,
}

impl InventoryCollector {
    /// Create a sequential collector
    pub fn new(transport: Arc<dyn Transport>, probe_timeout: Duration) -> Self {
        Self {
            resolver: HostResolver::new(Arc::clone(&transport), probe_timeout),
            executor: QueryExecutor::new(transport),
            concurrency: 1,
        }
    }

    /// Process up to `n` hosts at once; output order is unchanged
    #[must_use]
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Run a collection
    ///
    /// Per-host failures are logged and recorded in the result; they never
    /// abort the run.
    ///
    /// # Errors
    /// Returns `ConfigError` before any network activity when both host
    /// sources are set or the host file cannot be read.
    #[instrument(skip(self, request), fields(kind = %request.kind))]
    pub async fn run(&self, request: &CollectionRequest) -> Result<CollectionResult, ConfigError> {
        let hosts = effective_hosts(request).await?;
        let kind = request.kind;
        let skip_defaults = request.skip_defaults;

        info!(
            hosts = hosts.len(),
            skip_defaults,
            concurrency = self.concurrency,
            "starting collection"
        );

        let mut result = CollectionResult::empty(kind);
        result.hosts_attempted = hosts.len();

        if self.concurrency == 1 {
            for host in &hosts {
                let outcome = self.collect_host(host, kind, skip_defaults).await;
                result.absorb(outcome);
            }
        } else {
            // buffered() yields in input order, whatever order hosts finish in
            let outcomes: Vec<HostOutcome> = stream::iter(&hosts)
                .map(|host| self.collect_host(host, kind, skip_defaults))
                .buffered(self.concurrency)
                .collect()
                .await;
            result = outcomes.into_iter().fold(result, |mut acc, outcome| {
                acc.absorb(outcome);
                acc
            });
        }

        info!(
            hosts = result.hosts_attempted,
            succeeded = result.hosts_succeeded(),
            failed = result.failures.len(),
            records = result.records.len(),
            "collection finished"
        );

        Ok(result)
    }

    /// Resolve then query one host
    async fn collect_host(&self, host: &str, kind: CollectionKind, skip_defaults: bool) -> HostOutcome {
        let resolved = self.resolver.resolve(host).await.map_err(|failure| {
            warn!(host, reason = %failure.reason, "skipping host");
            HostFailure::from(failure)
        })?;

        self.executor
            .collect(&resolved, kind, skip_defaults)
            .await
            .map_err(|failure| {
                warn!(host, stage = %failure.stage, detail = %failure.detail, "no records from host");
                HostFailure::from(failure)
            })
    }
}

impl CollectionResult {
    /// Merge one host's outcome
    fn absorb(&mut self, outcome: HostOutcome) {
        match outcome {
            Ok(records) => self.records.extend(records),
            Err(failure) => self.failures.push(failure),
        }
    }
}

/// Host list a request resolves to
///
/// The explicit list wins; otherwise the file gives one host per line
/// (trimmed, blank lines skipped); with neither the list is empty.
///
/// # Errors
/// Returns `ConfigError::ConflictingHostSource` when both sources are set,
/// `ConfigError::HostFile` when the file cannot be read.
pub async fn effective_hosts(request: &CollectionRequest) -> Result<Vec<String>, ConfigError> {
    match (&request.host_list, &request.host_file) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingHostSource),
        (Some(hosts), None) => Ok(hosts.clone()),
        (None, Some(path)) => read_host_file(path).await,
        (None, None) => Ok(Vec::new()),
    }
}

async fn read_host_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::HostFile {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;

    Ok(content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
