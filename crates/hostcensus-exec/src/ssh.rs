//! SSH command execution using russh crate

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use crate::error::ExecError;
use crate::keys::ResolvedKey;
use crate::result::{CommandResult, ConnectionInfo};
use crate::traits::RemoteExecutor;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        Ok(true)
    }
}

/// SSH command executor
///
/// Holds at most one authenticated session to a single host. The session is
/// opened by `connect` and closed by `disconnect`.
pub struct SshExecutor {
    /// Connection configuration
    conn_info: ConnectionInfo,
    /// Resolved SSH key, shared between executors of one run
    key: Arc<ResolvedKey>,
    /// Live session, if connected
    session: Mutex<Option<client::Handle<SshClientHandler>>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .field("key", &self.key)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create an executor for an already resolved key
    #[must_use]
    pub fn with_key(conn_info: ConnectionInfo, key: Arc<ResolvedKey>) -> Self {
        Self {
            conn_info,
            key,
            session: Mutex::new(None),
        }
    }

    /// Get connection info
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.conn_info
    }

    /// Open and authenticate a session, without the outer timeout
    async fn establish(&self) -> Result<client::Handle<SshClientHandler>, ExecError> {
        let config = Arc::new(client::Config::default());

        let mut session = client::connect(
            config,
            (&self.conn_info.host[..], self.conn_info.port),
            SshClientHandler,
        )
        .await
        .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        let key_pair = load_secret_key(self.key.path(), None)
            .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let auth_res = session
            .authenticate_publickey(
                &self.conn_info.user,
                PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
            )
            .await
            .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(format!(
                "public key rejected for user {}",
                self.conn_info.user
            )));
        }

        Ok(session)
    }

    /// Execute command on the open session
    #[instrument(skip(self, cmd), fields(host = %self.conn_info.host))]
    async fn execute_remote(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let mut session_lock = self.session.lock().await;

        let session = session_lock.as_mut().ok_or(ExecError::NotConnected)?;

        debug!(bytes = cmd.len(), "executing remote command");

        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut output = ChannelOutput::default();
        while let Some(msg) = channel.wait().await {
            if output.absorb(msg) {
                break;
            }
        }

        let result = output.into_result(start.elapsed());

        debug!(status = result.status, duration = ?result.duration, "remote command completed");

        Ok(result)
    }
}

/// Everything a command channel delivered so far
///
/// Servers may send the exit status after EOF, so EOF alone does not end
/// the read; the channel closing or both EOF and a status do.
#[derive(Debug, Default)]
struct ChannelOutput {
    status: Option<u32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    eof: bool,
}

impl ChannelOutput {
    /// Record one message; true once nothing more is needed
    fn absorb(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            // ext 1 is stderr
            ChannelMsg::ExtendedData { data, ext: 1 } => self.stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => self.status = Some(exit_status),
            ChannelMsg::Eof => self.eof = true,
            _ => {}
        }
        self.eof && self.status.is_some()
    }

    /// Status is -1 when the server never reported one
    fn into_result(self, duration: Duration) -> CommandResult {
        CommandResult {
            status: self.status.map_or(-1, u32::cast_signed),
            stdout: String::from_utf8_lossy(&self.stdout).to_string(),
            stderr: String::from_utf8_lossy(&self.stderr).to_string(),
            duration,
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn connect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if session_lock.is_some() {
            return Ok(());
        }

        info!(
            port = self.conn_info.port,
            user = %self.conn_info.user,
            "connecting to SSH"
        );

        let connect_timeout = self.conn_info.connect_timeout;
        let session = timeout(connect_timeout, self.establish())
            .await
            .map_err(|_| ExecError::Timeout {
                timeout: connect_timeout,
            })??;

        info!("SSH connected and authenticated");

        *session_lock = Some(session);
        Ok(())
    }

    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.execute_remote(cmd).await
    }

    #[instrument(skip(self, cmd), fields(host = %self.conn_info.host))]
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        match timeout(timeout_duration, self.execute_remote(cmd)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn disconnect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!("SSH disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        // a held lock means someone is using the session
        self.session
            .try_lock()
            .map(|s| s.is_some())
            .unwrap_or(true)
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}
