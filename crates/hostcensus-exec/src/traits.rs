//! Remote executor trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// A connection to one host that can run commands
///
/// `connect` and `disconnect` bracket a session explicitly; `run` on an
/// executor that is not connected returns `ExecError::NotConnected`.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Establish and authenticate the connection
    async fn connect(&self) -> Result<(), ExecError>;

    /// Run a command on the connected host
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command, failing with `ExecError::Timeout` past `timeout`
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Tear the connection down
    async fn disconnect(&self) -> Result<(), ExecError>;

    /// Whether a connection is currently held
    fn is_connected(&self) -> bool {
        false
    }

    fn executor_type(&self) -> &'static str;
}
