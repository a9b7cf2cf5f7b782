//! Durable spooling of accepted messages

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A committed, immutable message artifact on local storage
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Base filename, also used as the object key on offload
    pub key: String,
    /// Full path of the spooled file
    pub path: PathBuf,
}

/// Commits finalized message payloads to the spool directory.
///
/// This is the reliability boundary: `commit` reports success only after the
/// bytes are flushed to disk. Artifact names combine the session identifier
/// with the commit timestamp, so concurrent sessions can never collide.
#[derive(Debug, Clone)]
pub struct SpoolWriter {
    dir: PathBuf,
}

impl SpoolWriter {
    /// Create a writer targeting `dir`; the directory is created on first
    /// commit if absent
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The spool directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Durably write one finalized payload, returning the named artifact.
    ///
    /// Directory creation is idempotent and safe under concurrent first use;
    /// any other creation or write failure fails the commit.
    pub async fn commit(&self, session_id: u64, payload: &[u8]) -> io::Result<Artifact> {
        fs::create_dir_all(&self.dir).await?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let key = format!("email_{session_id}_{millis}.eml");
        let path = self.dir.join(&key);

        let mut file = fs::File::create(&path).await?;
        file.write_all(payload).await?;
        file.sync_all().await?;

        debug!(key = %key, bytes = payload.len(), "artifact committed");
        Ok(Artifact { key, path })
    }
}
