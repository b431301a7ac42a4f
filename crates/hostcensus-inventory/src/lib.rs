//! hostcensus-inventory: fleet service and scheduled-task inventory
//!
//! Resolves each host, opens one management session per host, runs one
//! read-only query and merges the normalized records of every reachable host
//! into a single result. Host failures are reported and skipped.

pub mod collector;
pub mod error;
pub mod executor;
pub mod filter;
pub mod query;
pub mod remote;
pub mod resolver;
pub mod transport;
pub mod types;

pub use collector::{InventoryCollector, effective_hosts};
pub use error::{
    ConfigError, HostFailure, QueryFailure, QueryStage, ResolutionFailure, ResolutionReason,
    TransportError,
};
pub use executor::QueryExecutor;
pub use query::InventoryQuery;
pub use remote::{ExecTransport, ExecutorFactory, SshExecutorFactory};
pub use resolver::HostResolver;
pub use transport::{Session, Transport};
pub use types::{
    CollectionKind, CollectionRequest, CollectionResult, InventoryRecord, ResolvedHost,
    ServiceRecord, SystemIdentity, TaskRecord,
};
