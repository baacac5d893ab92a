//! Persisted "provisioning completed" flag.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Written into the marker for operators; only the marker's existence is
/// ever consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub cluster: String,
    pub servers: Vec<String>,
    pub completed_at: DateTime<Utc>,
    pub version: String,
}

/// Storage for the bootstrap marker. There is no way to clear
/// it: once set, provisioning never runs again for this instance.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn is_set(&self) -> io::Result<bool>;

    async fn set(&self, record: &MarkerRecord) -> io::Result<()>;

    /// Human-readable location, for log lines and errors.
    fn location(&self) -> String;
}

/// Marker kept as a file, typically on the instance's persistent volume.
#[derive(Debug, Clone)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read back the record, if the marker exists and holds valid JSON.
    pub async fn read(&self) -> io::Result<Option<MarkerRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).ok()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MarkerStore for FileMarker {
    async fn is_set(&self) -> io::Result<bool> {
        // Existence is what counts; contents may be empty or from an older tool.
        tokio::fs::try_exists(&self.path).await
    }

    async fn set(&self, record: &MarkerRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(record)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let written: io::Result<()> = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if written.is_err() {
            if let Err(e) = tokio::fs::remove_file(&tmp).await {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", tmp.display(), e);
                }
            }
        }
        written
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
