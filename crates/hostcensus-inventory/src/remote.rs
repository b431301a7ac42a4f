//! SSH + PowerShell implementation of `Transport`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hostcensus_exec::{
    ConnectionInfo, ExecError, KeySource, RemoteExecutor, ResolvedKey, SshExecutor, tcp_probe,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::TransportError;
use crate::query::{InventoryQuery, Pipeline, pipelines};
use crate::transport::{Session, Transport};
use crate::types::SystemIdentity;

/// Creates an unconnected executor for one endpoint
pub trait ExecutorFactory: Send + Sync {
    /// Build an executor targeting `endpoint`
    ///
    /// # Errors
    /// Returns `ExecError` when the executor cannot be configured.
    fn create(&self, endpoint: &str) -> Result<Box<dyn RemoteExecutor>, ExecError>;
}

/// Builds `SshExecutor`s sharing one resolved key
pub struct SshExecutorFactory {
    user: String,
    port: u16,
    connect_timeout: Duration,
    key: Arc<ResolvedKey>,
}

impl SshExecutorFactory {
    /// Resolve the key once for the whole run
    ///
    /// # Errors
    /// Returns `ExecError::SshKeyError` if the key cannot be resolved.
    pub fn new(
        user: impl Into<String>,
        port: u16,
        connect_timeout: Duration,
        key_source: &KeySource,
    ) -> Result<Self, ExecError> {
        let key = key_source
            .resolve()
            .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

        Ok(Self {
            user: user.into(),
            port,
            connect_timeout,
            key: Arc::new(key),
        })
    }
}

impl ExecutorFactory for SshExecutorFactory {
    fn create(&self, endpoint: &str) -> Result<Box<dyn RemoteExecutor>, ExecError> {
        let conn_info = ConnectionInfo::new(endpoint, &self.user)
            .with_port(self.port)
            .with_connect_timeout(self.connect_timeout);
        Ok(Box::new(SshExecutor::with_key(conn_info, Arc::clone(&self.key))))
    }
}

/// Transport over SSH to hosts running PowerShell
pub struct ExecTransport {
    factory: Arc<dyn ExecutorFactory>,
    /// Port probed for liveness (the SSH port)
    port: u16,
    /// `powershell` or `pwsh`
    shell: String,
    /// Bound on identity and inventory commands
    query_timeout: Duration,
}

impl ExecTransport {
    pub fn new(factory: Arc<dyn ExecutorFactory>, port: u16) -> Self {
        Self {
            factory,
            port,
            shell: "powershell".to_string(),
            query_timeout: Duration::from_secs(60),
        }
    }

    /// Set the remote shell executable
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the per-command timeout
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for ExecTransport {
    async fn probe(&self, host: &str, timeout: Duration) -> Result<(), TransportError> {
        tcp_probe(host, self.port, timeout).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn identity(&self, host: &str) -> Result<SystemIdentity, TransportError> {
        let executor = self.factory.create(host)?;
        executor.connect().await?;

        let result = run_pipeline(
            executor.as_ref(),
            &pipelines::identity(),
            &self.shell,
            self.query_timeout,
        )
        .await;

        if let Err(e) = executor.disconnect().await {
            warn!(host, error = %e, "failed to disconnect after identity query");
        }

        let identity = result?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Parse("identity query returned nothing".to_string()))?;

        serde_json::from_value(identity).map_err(|e| TransportError::Parse(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn open_session(
        &self,
        endpoint: &str,
        label: &str,
    ) -> Result<Box<dyn Session>, TransportError> {
        let executor = self.factory.create(endpoint)?;
        executor.connect().await?;

        debug!(executor = executor.executor_type(), "session open");

        Ok(Box::new(ExecSession {
            executor,
            label: label.to_string(),
            shell: self.shell.clone(),
            query_timeout: self.query_timeout,
        }))
    }
}

/// Session backed by one connected executor
struct ExecSession {
    executor: Box<dyn RemoteExecutor>,
    label: String,
    shell: String,
    query_timeout: Duration,
}

#[async_trait]
impl Session for ExecSession {
    fn label(&self) -> &str {
        &self.label
    }

    async fn query(&mut self, query: &InventoryQuery) -> Result<Vec<Value>, TransportError> {
        run_pipeline(
            self.executor.as_ref(),
            &query.pipeline(),
            &self.shell,
            self.query_timeout,
        )
        .await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.executor.disconnect().await?;
        Ok(())
    }
}

/// Run `pipeline` and parse its JSON output
async fn run_pipeline(
    executor: &dyn RemoteExecutor,
    pipeline: &Pipeline,
    shell: &str,
    timeout: Duration,
) -> Result<Vec<Value>, TransportError> {
    let result = executor
        .run_with_timeout(&pipeline.command_line(shell), timeout)
        .await
        .map_err(|e| match e {
            ExecError::Timeout { timeout } => TransportError::Timeout(timeout),
            other => TransportError::Exec(other),
        })?;

    if !result.success() {
        return Err(TransportError::Remote {
            status: result.status,
            stderr: result.stderr.trim().to_string(),
        });
    }

    parse_items(&result.stdout)
}

/// Accept a JSON array, a single object, `null`, or nothing at all
pub(crate) fn parse_items(output: &str) -> Result<Vec<Value>, TransportError> {
    let output = output.trim_start_matches('\u{feff}').trim();
    if output.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str(output).map_err(|e| TransportError::Parse(e.to_string()))? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        object @ Value::Object(_) => Ok(vec![object]),
        other => Err(TransportError::Parse(format!(
            "expected JSON array or object, got {other}"
        ))),
    }
}
