//! Remote management transport seam

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::query::InventoryQuery;
use crate::types::SystemIdentity;

/// The four primitives inventory collection needs from a remote protocol
#[async_trait]
pub trait Transport: Send + Sync {
    /// Single reachability check bounded by `timeout`
    async fn probe(&self, host: &str, timeout: Duration) -> Result<(), TransportError>;

    /// Host and domain name of `host`
    async fn identity(&self, host: &str) -> Result<SystemIdentity, TransportError>;

    /// Open a session against `endpoint`, tagged with `label` for logs
    async fn open_session(
        &self,
        endpoint: &str,
        label: &str,
    ) -> Result<Box<dyn Session>, TransportError>;
}

/// One open management session
#[async_trait]
pub trait Session: Send {
    /// Label given at open time
    fn label(&self) -> &str;

    /// Run one read-only enumeration, returning raw items
    async fn query(&mut self, query: &InventoryQuery) -> Result<Vec<Value>, TransportError>;

    /// Release the session
    async fn close(&mut self) -> Result<(), TransportError>;
}
