//! Error types for hostcensus-inventory

use std::fmt;
use std::time::Duration;

use hostcensus_exec::ExecError;
use thiserror::Error;

/// Unusable run configuration; aborts before any network activity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Both an explicit host list and a host file were given
    #[error("conflicting host sources: give either a host list or a host file, not both")]
    ConflictingHostSource,

    /// Host file could not be read
    #[error("cannot read host file {path}: {detail}")]
    HostFile {
        /// Path as given
        path: String,
        /// Underlying I/O error
        detail: String,
    },
}

/// Why a host could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionReason {
    /// Blank host name
    EmptyName,
    /// Liveness probe failed
    Unreachable(String),
    /// Probe passed but the identity query failed
    IdentityQueryFailed(String),
}

impl fmt::Display for ResolutionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionReason::EmptyName => write!(f, "empty host name"),
            ResolutionReason::Unreachable(detail) => write!(f, "unreachable: {detail}"),
            ResolutionReason::IdentityQueryFailed(detail) => {
                write!(f, "identity query failed: {detail}")
            }
        }
    }
}

/// Host skipped during resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot resolve {host}: {reason}")]
pub struct ResolutionFailure {
    pub host: String,
    pub reason: ResolutionReason,
}

/// Where a query against a resolved host broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    SessionOpen,
    Query,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStage::SessionOpen => write!(f, "session open"),
            QueryStage::Query => write!(f, "query"),
        }
    }
}

/// Host resolved but contributed no records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("inventory of {host} failed at {stage}: {detail}")]
pub struct QueryFailure {
    pub host: String,
    pub stage: QueryStage,
    pub detail: String,
}

/// Any per-host failure; never aborts a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostFailure {
    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),
    #[error(transparent)]
    Query(#[from] QueryFailure),
}

impl HostFailure {
    /// Host the failure belongs to
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            HostFailure::Resolution(f) => &f.host,
            HostFailure::Query(f) => &f.host,
        }
    }
}

/// Errors from the remote transport seam
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Execution layer failure (connect, auth, channel)
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Remote call exceeded its bound
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    /// Remote command ran but reported failure
    #[error("remote command exited with {status}: {stderr}")]
    Remote {
        /// Exit status
        status: i32,
        /// Trimmed stderr
        stderr: String,
    },

    /// Output was not the expected JSON
    #[error("cannot parse remote output: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        let failure = ResolutionFailure {
            host: "srv01".into(),
            reason: ResolutionReason::Unreachable("no answer".into()),
        };
        assert_eq!(failure.to_string(), "cannot resolve srv01: unreachable: no answer");

        let failure = HostFailure::from(QueryFailure {
            host: "srv02".into(),
            stage: QueryStage::SessionOpen,
            detail: "auth".into(),
        });
        assert_eq!(failure.host(), "srv02");
        assert_eq!(
            failure.to_string(),
            "inventory of srv02 failed at session open: auth"
        );
    }
}
