//! hostcensus-exec: Remote execution primitives
//!
//! Provides the executor trait, an SSH implementation, key resolution and a
//! TCP liveness probe used before any management session is attempted.

pub mod error;
pub mod keys;
pub mod probe;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{KeyError, KeySource, ResolvedKey};
pub use probe::tcp_probe;
pub use result::{CommandResult, ConnectionInfo};
pub use ssh::SshExecutor;
pub use traits::RemoteExecutor;
