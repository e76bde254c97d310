use serde_json::Value;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Keystore not found at {0}")]
    NotFound(PathBuf),
    #[error("Failed to read keystore")]
    Unreadable(#[from] std::io::Error),
    #[error("Keystore is not valid JSON")]
    Invalid(#[from] serde_json::Error),
    #[error("Keystore has no address")]
    MissingAddress,
    #[error("No home directory to resolve the keystore dir")]
    NoHome,
}

/// one keystore record from the platform wallet
///
/// Only the address is interpreted client-side. The encrypted key
/// material stays opaque and is forwarded verbatim with the job so the
/// platform can establish ownership and payment.
#[derive(Debug, Clone)]
pub struct Keystore {
    pub address: String,
    pub record: Value,
}

impl Keystore {
    /// load a keystore by name from the keystore dir (default `~/.dcp`),
    /// or from an absolute path when `name` already ends in `.keystore`
    pub fn load(dir: Option<&Path>, name: &str) -> Result<Self, WalletError> {
        let path = if name.ends_with(".keystore") {
            PathBuf::from(name)
        } else {
            let dir = match dir {
                Some(dir) => dir.to_path_buf(),
                None => default_keystore_dir()?,
            };

            dir.join(format!("{name}.keystore"))
        };

        if !path.is_file() {
            return Err(WalletError::NotFound(path));
        }

        debug!(path = ?path, "Loading keystore");
        let record: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let address = record
            .get("address")
            .and_then(Value::as_str)
            .filter(|address| !address.is_empty())
            .ok_or(WalletError::MissingAddress)?
            .to_owned();

        Ok(Self { address, record })
    }
}

fn default_keystore_dir() -> Result<PathBuf, WalletError> {
    env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".dcp"))
        .ok_or(WalletError::NoHome)
}
