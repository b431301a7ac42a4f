//! Error types for hostcensus-exec

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the execution layer
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Host did not answer the liveness probe
    #[error("host {host}:{port} unreachable: {reason}")]
    Unreachable {
        /// Host that was probed
        host: String,
        /// Port that was probed
        port: u16,
        /// Why the probe failed
        reason: String,
    },

    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Operation timed out
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// I/O error on an open channel
    #[error("I/O error: {0}")]
    IoError(String),

    /// Connection not established
    #[error("not connected")]
    NotConnected,
}
