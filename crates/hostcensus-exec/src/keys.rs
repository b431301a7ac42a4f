//! SSH key resolution

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Key file names tried under `~/.ssh` when nothing is configured
const DEFAULT_KEY_FILES: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

/// Where the SSH private key comes from
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Explicit path to key file
    Path(PathBuf),
    /// Base64-encoded key in an environment variable
    Env(String),
    /// First of the usual `~/.ssh/id_*` files that exists
    Default,
}

impl KeySource {
    /// Pick a source from optional settings, path winning over env
    #[must_use]
    pub fn from_settings(key_path: Option<&str>, key_env: Option<&str>) -> Self {
        match (key_path, key_env) {
            (Some(path), _) => KeySource::Path(expand_home(path)),
            (None, Some(var)) => KeySource::Env(var.to_string()),
            (None, None) => KeySource::Default,
        }
    }

    /// Resolve the source to a key file on disk
    ///
    /// For `Env`, decodes base64 and writes a private temp file that is
    /// removed when the returned key is dropped.
    ///
    /// # Errors
    /// Returns `KeyError` if the variable is unset, the data is not base64,
    /// the file is missing or its permissions are too open.
    pub fn resolve(&self) -> Result<ResolvedKey, KeyError> {
        match self {
            KeySource::Path(path) => {
                if !path.exists() {
                    return Err(KeyError::NotFound(path.display().to_string()));
                }
                validate_key_permissions(path)?;
                Ok(ResolvedKey::Path(path.clone()))
            }
            KeySource::Env(var_name) => {
                let base64_key =
                    env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
                let key_data = base64_decode(&base64_key).map_err(|_| KeyError::InvalidBase64)?;

                let temp_path = write_temp_key(&key_data)?;
                Ok(ResolvedKey::Temp(temp_path))
            }
            KeySource::Default => {
                let ssh_dir = dirs::home_dir()
                    .map(|home| home.join(".ssh"))
                    .ok_or_else(|| KeyError::NotFound("home directory".to_string()))?;

                let found = DEFAULT_KEY_FILES
                    .iter()
                    .map(|name| ssh_dir.join(name))
                    .find(|candidate| candidate.exists())
                    .ok_or_else(|| {
                        KeyError::NotFound(format!("no id_* key under {}", ssh_dir.display()))
                    })?;

                debug!(path = %found.display(), "using default SSH key");
                validate_key_permissions(&found)?;
                Ok(ResolvedKey::Path(found))
            }
        }
    }
}

/// Resolved key location
#[derive(Debug)]
pub enum ResolvedKey {
    /// Path to key file
    Path(PathBuf),
    /// Temporary file (deleted on drop)
    Temp(PathBuf),
}

impl ResolvedKey {
    /// Path handed to the SSH library
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ResolvedKey::Path(p) | ResolvedKey::Temp(p) => p,
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

#[cfg(unix)]
fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();

    // group/other bits must be clear
    if mode & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_key_permissions(_path: &Path) -> Result<(), KeyError> {
    Ok(())
}

fn write_temp_key(key_data: &[u8]) -> Result<PathBuf, KeyError> {
    use std::fs::File;
    use std::io::Write;

    let temp_path =
        std::env::temp_dir().join(format!("hostcensus_ssh_key_{}", std::process::id()));

    let mut file = File::create(&temp_path)?;
    file.write_all(key_data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = file.metadata()?.permissions();
        permissions.set_mode(0o600);
        std::fs::set_permissions(&temp_path, permissions)?;
    }

    debug!(path = %temp_path.display(), "wrote temporary SSH key");

    Ok(temp_path)
}

impl Drop for ResolvedKey {
    fn drop(&mut self) {
        if let ResolvedKey::Temp(path) = self
            && let Err(e) = std::fs::remove_file(&*path)
        {
            warn!(path = %path.display(), error = %e, "failed to remove temp key");
        }
    }
}
