//! Durable storage for brain state
//!
//! Writes go through a [`StateSink`] with a bounded number of attempts and
//! exponential backoff. When every attempt fails the caller gets a
//! `Persistence` error and the in-memory state stays authoritative.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PersistenceConfig;
use crate::error::{EngineError, EngineResult};

/// Somewhere serialized state can be written to and read back from
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait StateSink: Send + Sync {
    /// Replace the stored state with `contents`
    async fn write(&self, contents: &str) -> std::io::Result<()>;

    /// Stored state, or `None` if nothing has been written yet
    async fn read(&self) -> std::io::Result<Option<String>>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// JSON file on local disk, replaced atomically via a temp file + rename
#[derive(Debug, Clone)]
pub struct FileStateSink {
    path: PathBuf,
}

impl FileStateSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl StateSink for FileStateSink {
    async fn write(&self, contents: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn read(&self) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// How hard to try before reporting degraded durability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl From<&PersistenceConfig> for RetryPolicy {
    fn from(config: &PersistenceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.backoff(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        (&PersistenceConfig::default()).into()
    }
}

/// Write `contents`, retrying with doubling backoff. Returns the attempts used.
pub async fn write_with_retry(
    sink: &dyn StateSink,
    contents: &str,
    policy: RetryPolicy,
) -> EngineResult<u32> {
    let attempts = policy.attempts();
    let mut delay = policy.backoff;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match sink.write(contents).await {
            Ok(()) => {
                debug!("Flushed brain state to {} (attempt {})", sink.describe(), attempt);
                return Ok(attempt);
            }
            Err(e) => {
                warn!(
                    "Flush to {} failed (attempt {}/{}): {}",
                    sink.describe(), attempt, attempts, e
                );
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }

    Err(EngineError::Persistence {
        attempts,
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_file_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileStateSink::new(dir.path().join("state").join("brain_state.json"));

        assert_eq!(sink.read().await.unwrap(), None);
        sink.write("{\"a\":1}").await.unwrap();
        assert_eq!(sink.read().await.unwrap().as_deref(), Some("{\"a\":1}"));
        sink.write("{\"a\":2}").await.unwrap();
        assert_eq!(sink.read().await.unwrap().as_deref(), Some("{\"a\":2}"));
        assert!(!sink.temp_path().exists());
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut sink = MockStateSink::new();
        sink.expect_write().times(4).returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(std::io::Error::other("disk full"))
        });
        sink.expect_describe().returning(|| "mock".to_string());

        let err = write_with_retry(&sink, "{}", fast_policy(3)).await.unwrap_err();
        match err {
            EngineError::Persistence { attempts, reason } => {
                assert_eq!(attempts, 4);
                assert!(reason.contains("disk full"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut sink = MockStateSink::new();
        sink.expect_write().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(std::io::Error::other("busy"))
            } else {
                Ok(())
            }
        });
        sink.expect_describe().returning(|| "mock".to_string());

        let used = write_with_retry(&sink, "{}", fast_policy(3)).await.unwrap();
        assert_eq!(used, 2);
    }
}
