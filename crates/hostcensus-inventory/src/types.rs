//! Inventory type definitions

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HostFailure;

// ============================================================================
// Hosts
// ============================================================================

/// A host that passed the liveness probe and identity query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHost {
    /// Name exactly as the caller supplied it
    pub short_name: String,
    /// Fully qualified name used as the connection target
    pub fqdn: String,
}

/// Host and domain name reported by the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemIdentity {
    /// Host name without domain
    #[serde(rename = "DNSHostName")]
    pub hostname: String,
    /// DNS domain (or workgroup name)
    #[serde(rename = "Domain", default)]
    pub domain: String,
}

impl SystemIdentity {
    /// `hostname.domain`, or the bare host name when no domain is set
    #[must_use]
    pub fn fqdn(&self) -> String {
        let domain = self.domain.trim().trim_start_matches('.');
        if domain.is_empty() {
            self.hostname.clone()
        } else {
            format!("{}.{domain}", self.hostname)
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Which remote enumeration a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    /// Installed services
    Services,
    /// Scheduled tasks
    ScheduledTasks,
}

impl CollectionKind {
    /// Column headers in record declaration order
    #[must_use]
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            CollectionKind::Services => &["Host", "ServiceName", "State", "RunAs", "Description"],
            CollectionKind::ScheduledTasks => &[
                "Host",
                "TaskName",
                "Path",
                "State",
                "RunAs",
                "Description",
                "Author",
            ],
        }
    }

    /// Stem used for report file names
    #[must_use]
    pub fn file_stem(self) -> &'static str {
        match self {
            CollectionKind::Services => "Services",
            CollectionKind::ScheduledTasks => "ScheduledTasks",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Services => write!(f, "services"),
            CollectionKind::ScheduledTasks => write!(f, "scheduled tasks"),
        }
    }
}

/// An installed service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRecord {
    /// Short host name the caller supplied
    pub host: String,
    pub service_name: String,
    /// Running, Stopped, ...
    pub state: String,
    /// Account the service logs on as
    pub run_as: Option<String>,
    pub description: Option<String>,
}

/// A scheduled task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskRecord {
    /// Short host name the caller supplied
    pub host: String,
    pub task_name: String,
    /// Folder path, `\` for the root folder
    pub path: String,
    /// Ready, Running, Disabled, ...
    pub state: String,
    /// Principal the task runs as
    pub run_as: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

/// One normalized inventory item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InventoryRecord {
    Service(ServiceRecord),
    Task(TaskRecord),
}

impl InventoryRecord {
    /// Host the record was collected from
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            InventoryRecord::Service(s) => &s.host,
            InventoryRecord::Task(t) => &t.host,
        }
    }

    #[must_use]
    pub fn state(&self) -> &str {
        match self {
            InventoryRecord::Service(s) => &s.state,
            InventoryRecord::Task(t) => &t.state,
        }
    }

    #[must_use]
    pub fn kind(&self) -> CollectionKind {
        match self {
            InventoryRecord::Service(_) => CollectionKind::Services,
            InventoryRecord::Task(_) => CollectionKind::ScheduledTasks,
        }
    }

    /// Field values aligned with `CollectionKind::columns`, absent as empty
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        match self {
            InventoryRecord::Service(s) => vec![
                s.host.clone(),
                s.service_name.clone(),
                s.state.clone(),
                opt(&s.run_as),
                opt(&s.description),
            ],
            InventoryRecord::Task(t) => vec![
                t.host.clone(),
                t.task_name.clone(),
                t.path.clone(),
                t.state.clone(),
                opt(&t.run_as),
                opt(&t.description),
                opt(&t.author),
            ],
        }
    }
}

// ============================================================================
// Runs
// ============================================================================

/// What to collect and from where
///
/// At most one of `host_list` and `host_file` may be set; setting both is
/// rejected by the collector, setting neither gives an empty run.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    /// Explicit targets
    pub host_list: Option<Vec<String>>,
    /// Line-delimited target file
    pub host_file: Option<PathBuf>,
    /// Drop default services/tasks
    pub skip_defaults: bool,
    pub kind: CollectionKind,
}

impl CollectionRequest {
    /// Request with no host source yet
    #[must_use]
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            host_list: None,
            host_file: None,
            skip_defaults: false,
            kind,
        }
    }

    #[must_use]
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.host_list = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_host_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.host_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn skip_defaults(mut self, skip: bool) -> Self {
        self.skip_defaults = skip;
        self
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct CollectionResult {
    pub kind: CollectionKind,
    /// Records in host-list order, then per-host query order
    pub records: Vec<InventoryRecord>,
    /// Hosts that contributed nothing, in host-list order
    pub failures: Vec<HostFailure>,
    /// Number of hosts attempted
    pub hosts_attempted: usize,
    /// When the run started
    pub captured_at: DateTime<Utc>,
}

impl CollectionResult {
    /// Empty result for `kind`, stamped now
    #[must_use]
    pub fn empty(kind: CollectionKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
            failures: Vec::new(),
            hosts_attempted: 0,
            captured_at: Utc::now(),
        }
    }

    /// Hosts attempted minus hosts that failed
    #[must_use]
    pub fn hosts_succeeded(&self) -> usize {
        self.hosts_attempted.saturating_sub(self.failures.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ServiceRecord {
        ServiceRecord {
            host: "srv01".into(),
            service_name: "AppPool".into(),
            state: "Running".into(),
            run_as: Some("CORP\\svc-app".into()),
            description: None,
        }
    }

    #[test]
    fn test_fqdn_composition() {
        let identity = SystemIdentity {
            hostname: "SRV01".into(),
            domain: "corp.example.com".into(),
        };
        assert_eq!(identity.fqdn(), "SRV01.corp.example.com");

        let bare = SystemIdentity {
            hostname: "SRV01".into(),
            domain: "  ".into(),
        };
        assert_eq!(bare.fqdn(), "SRV01");
    }

    #[test]
    fn test_identity_from_cim_json() {
        let identity: SystemIdentity =
            serde_json::from_str(r#"{"DNSHostName":"SRV01","Domain":"corp.local"}"#).unwrap();
        assert_eq!(identity.fqdn(), "SRV01.corp.local");
    }

    #[test]
    fn test_values_align_with_columns() {
        let record = InventoryRecord::Service(service());
        assert_eq!(record.values().len(), CollectionKind::Services.columns().len());
        assert_eq!(record.values()[3], "CORP\\svc-app");
        assert_eq!(record.values()[4], "");

        let task = InventoryRecord::Task(TaskRecord {
            host: "srv01".into(),
            task_name: "Backup".into(),
            path: "\\Ops\\".into(),
            state: "Ready".into(),
            run_as: None,
            description: None,
            author: Some("ops".into()),
        });
        assert_eq!(
            task.values().len(),
            CollectionKind::ScheduledTasks.columns().len()
        );
        assert_eq!(task.kind(), CollectionKind::ScheduledTasks);
        assert_eq!(task.state(), "Ready");
    }

    #[test]
    fn test_record_serializes_flat() {
        let json = serde_json::to_value(InventoryRecord::Service(service())).unwrap();
        assert_eq!(json["Host"], "srv01");
        assert_eq!(json["ServiceName"], "AppPool");
    }

    #[test]
    fn test_request_builder() {
        let request = CollectionRequest::new(CollectionKind::Services)
            .with_hosts(["a", "b"])
            .skip_defaults(true);
        assert_eq!(request.host_list.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert!(request.host_file.is_none());
        assert!(request.skip_defaults);
    }
}
