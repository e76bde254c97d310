use chrono::NaiveDateTime;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::debug;

#[derive(Error, Debug)]
pub enum ResultLogError {
    #[error("Failed to serialize result")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to append to result log")]
    Append(#[from] std::io::Error),
}

/// append-only log of decoded worker results, one JSON value per line
///
/// The file name carries the startup timestamp so every run of the server
/// collects into its own file, e.g. `GSE57383_PsA_vs_Ps_260112_212032.txt`.
#[derive(Debug)]
pub struct ResultLog {
    path: PathBuf,
    // appends hold this across open-write-flush so concurrent worker
    // posts cannot interleave partial lines
    guard: Mutex<()>,
}

impl ResultLog {
    pub fn new(dir: &Path, prefix: &str, started: NaiveDateTime) -> Self {
        let stamp = started.format("%d%m%y_%H%M%S");

        Self {
            path: dir.join(format!("{prefix}_{stamp}.txt")),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// serialize `value` and append it as one line, creating the file on
    /// the first append
    pub async fn append(&self, value: &Value) -> Result<(), ResultLogError> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');

        let _guard = self.guard.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(path = ?self.path, "Appended result line");

        Ok(())
    }
}
