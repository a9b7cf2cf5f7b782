//! Best-effort offload of committed artifacts to remote object storage

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use tracing::{error, info};

use crate::spool::Artifact;

/// Remote object storage seam.
///
/// The production implementation is [`S3Store`]; tests substitute recording
/// or failing stores to exercise the dispatcher's decoupling guarantees.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key` at the top level of `bucket`
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// Object store backed by the AWS S3 SDK
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// Build a client for the given region using the default credential chain
    pub async fn connect(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .load()
            .await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await?;
        Ok(())
    }
}

/// Fire-and-forget uploader for committed artifacts.
///
/// Each dispatch spawns a detached task making exactly one upload attempt.
/// Success and failure are both terminal and only recorded in the log; the
/// originating session is never blocked and never learns the outcome. The
/// message counts as received once the local commit succeeded.
pub struct OffloadDispatcher {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl OffloadDispatcher {
    /// Create a dispatcher targeting `bucket` through `store`
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Queue one upload attempt for a committed artifact and return
    /// immediately
    pub fn dispatch(&self, artifact: Artifact) {
        let store = Arc::clone(&self.store);
        let bucket = self.bucket.clone();

        tokio::spawn(async move {
            match upload(store.as_ref(), &bucket, &artifact).await {
                Ok(()) => {
                    info!(
                        key = %artifact.key,
                        "artifact uploaded to s3://{}/{}", bucket, artifact.key
                    );
                }
                Err(e) => {
                    // No retry: the local artifact remains authoritative
                    error!(key = %artifact.key, error = %e, "artifact upload failed");
                }
            }
        });
    }
}

async fn upload(store: &dyn ObjectStore, bucket: &str, artifact: &Artifact) -> Result<()> {
    let body = tokio::fs::read(&artifact.path).await?;
    store.put(bucket, &artifact.key, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingStore {
        puts: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                puts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
            self.puts
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string(), body));
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn put(&self, _bucket: &str, _key: &str, _body: Vec<u8>) -> Result<()> {
            anyhow::bail!("access denied")
        }
    }

    async fn committed_artifact(dir: &std::path::Path) -> Artifact {
        let writer = crate::spool::SpoolWriter::new(dir);
        writer.commit(1, b"payload").await.unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_uploads_artifact_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = committed_artifact(dir.path()).await;

        let store = Arc::new(RecordingStore::new());
        let dispatcher = OffloadDispatcher::new(store.clone(), "inbox-bucket");
        dispatcher.dispatch(artifact.clone());

        // The upload is detached; poll briefly for it to land
        for _ in 0..50 {
            if !store.puts.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "inbox-bucket");
        assert_eq!(puts[0].1, artifact.key);
        assert_eq!(puts[0].2, b"payload");
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = committed_artifact(dir.path()).await;

        let dispatcher = OffloadDispatcher::new(Arc::new(FailingStore), "inbox-bucket");
        dispatcher.dispatch(artifact);

        // Nothing to await and nothing to observe from the caller's side;
        // the failure must not panic or propagate
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_dispatch_missing_file_logs_and_moves_on() {
        let dispatcher = OffloadDispatcher::new(Arc::new(RecordingStore::new()), "inbox-bucket");
        dispatcher.dispatch(Artifact {
            key: "email_9_0.eml".to_string(),
            path: "/nonexistent/email_9_0.eml".into(),
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
