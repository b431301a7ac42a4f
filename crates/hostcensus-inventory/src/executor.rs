//! Remote query executor: one session, one query, normalized records

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{QueryFailure, QueryStage, TransportError};
use crate::filter;
use crate::query::InventoryQuery;
use crate::transport::{Session, Transport};
use crate::types::{CollectionKind, InventoryRecord, ResolvedHost, ServiceRecord, TaskRecord};

/// Runs inventory queries against resolved hosts
pub struct QueryExecutor {
    transport: Arc<dyn Transport>,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Collect `kind` from `resolved`
    ///
    /// Opens one session against the FQDN, runs one query and always
    /// attempts to close the session once it was opened. Records carry the
    /// short host name. A failed close is logged and otherwise ignored.
    ///
    /// # Errors
    /// Returns `QueryFailure` with the stage that failed: session open
    /// (nothing else attempted) or the query itself.
    #[instrument(skip(self, resolved), fields(host = %resolved.short_name, fqdn = %resolved.fqdn))]
    pub async fn collect(
        &self,
        resolved: &ResolvedHost,
        kind: CollectionKind,
        skip_defaults: bool,
    ) -> Result<Vec<InventoryRecord>, QueryFailure> {
        let fail = |stage: QueryStage, e: &dyn std::fmt::Display| QueryFailure {
            host: resolved.short_name.clone(),
            stage,
            detail: e.to_string(),
        };

        let mut session = self
            .transport
            .open_session(&resolved.fqdn, &resolved.short_name)
            .await
            .map_err(|e| fail(QueryStage::SessionOpen, &e))?;

        let query = InventoryQuery::new(kind, skip_defaults);
        let outcome = run_query(session.as_mut(), &query, &resolved.short_name).await;

        if let Err(e) = session.close().await {
            warn!(session = session.label(), error = %e, "failed to close session");
        }

        let records = outcome.map_err(|e| fail(QueryStage::Query, &e))?;
        let records = filter::apply(records, skip_defaults);

        info!(count = records.len(), kind = %kind, "collected");

        Ok(records)
    }
}

/// Query and normalize inside an open session
async fn run_query(
    session: &mut dyn Session,
    query: &InventoryQuery,
    host: &str,
) -> Result<Vec<InventoryRecord>, TransportError> {
    let items = session.query(query).await?;
    debug!(items = items.len(), "raw items received");
    normalize(query.kind, host, items)
}

/// Turn raw items into records stamped with `host`
///
/// # Errors
/// Returns `TransportError::Parse` when an item lacks a required field.
pub fn normalize(
    kind: CollectionKind,
    host: &str,
    items: Vec<Value>,
) -> Result<Vec<InventoryRecord>, TransportError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct ServiceRow {
        name: String,
        #[serde(default)]
        state: Option<String>,
        #[serde(default)]
        start_name: Option<String>,
        #[serde(default)]
        description: Option<String>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct TaskRow {
        task_name: String,
        #[serde(default)]
        task_path: Option<String>,
        #[serde(default)]
        state: Option<String>,
        #[serde(default)]
        run_as: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        author: Option<String>,
    }

    let parse_err = |e: serde_json::Error| TransportError::Parse(e.to_string());

    items
        .into_iter()
        .map(|item| match kind {
            CollectionKind::Services => {
                let row: ServiceRow = serde_json::from_value(item).map_err(parse_err)?;
                Ok(InventoryRecord::Service(ServiceRecord {
                    host: host.to_string(),
                    service_name: row.name,
                    state: row.state.unwrap_or_default(),
                    run_as: non_blank(row.start_name),
                    description: non_blank(row.description),
                }))
            }
            CollectionKind::ScheduledTasks => {
                let row: TaskRow = serde_json::from_value(item).map_err(parse_err)?;
                Ok(InventoryRecord::Task(TaskRecord {
                    host: host.to_string(),
                    task_name: row.task_name,
                    path: row.task_path.unwrap_or_else(|| filter::ROOT_TASK_PATH.to_string()),
                    state: row.state.unwrap_or_default(),
                    run_as: non_blank(row.run_as),
                    description: non_blank(row.description),
                    author: non_blank(row.author),
                }))
            }
        })
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
