//! TCP liveness probe

use std::io::ErrorKind;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::error::ExecError;

/// Check that `host` answers on `port` within `probe_timeout`
///
/// A refused connection still proves the host is up, so only timeouts,
/// name lookup failures and routing errors count as unreachable.
///
/// # Errors
/// Returns `ExecError::Unreachable` when the host does not answer.
#[instrument(level = "debug")]
pub async fn tcp_probe(host: &str, port: u16, probe_timeout: Duration) -> Result<(), ExecError> {
    let unreachable = |reason: String| ExecError::Unreachable {
        host: host.to_string(),
        port,
        reason,
    };

    match timeout(probe_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => {
            debug!(host, port, "probe connected");
            Ok(())
        }
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
            debug!(host, port, "probe refused, host is up");
            Ok(())
        }
        Ok(Err(e)) => Err(unreachable(e.to_string())),
        Err(_elapsed) => Err(unreachable(format!("no answer within {probe_timeout:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_should_succeed_on_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = tcp_probe("127.0.0.1", port, Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn probe_should_treat_refused_as_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = tcp_probe("127.0.0.1", port, Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn probe_should_fail_on_unknown_name() {
        let result = tcp_probe("no-such-host.invalid", 22, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(ExecError::Unreachable { .. })));
    }

    #[tokio::test]
    #[ignore = "requires a network where TEST-NET-3 is unroutable"]
    async fn probe_should_time_out_on_unroutable_ip() {
        let result = tcp_probe("203.0.113.1", 22, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ExecError::Unreachable { .. })));
    }
}
