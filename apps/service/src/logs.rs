//! Append-only log streams, one per check.
//!
//! Each stream is a `<stream>.log` file holding one serialized entry per line.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const LOG_EXTENSION: &str = "log";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid log stream id: {0:?}")]
    InvalidStream(String),

    #[error("entry spans more than one line")]
    MultilineEntry,

    #[error("could not append to log: {0}")]
    Io(#[from] std::io::Error),

    #[error("log sink unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append one entry to the end of a stream, creating the stream if needed
    async fn append(&self, stream_id: &str, entry: &str) -> Result<(), LogError>;
}

#[derive(Debug, Clone)]
pub struct FileLogSink {
    base_dir: PathBuf,
}

impl FileLogSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub async fn ensure_dir(&self) -> Result<(), LogError> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    /// Names of the streams currently on disk
    pub async fn list(&self) -> Result<Vec<String>, LogError> {
        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut streams = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == LOG_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    streams.push(stem.to_string());
                }
            }
        }

        streams.sort();
        Ok(streams)
    }

    fn stream_path(&self, stream_id: &str) -> Result<PathBuf, LogError> {
        let bad = stream_id.is_empty()
            || stream_id.starts_with('.')
            || stream_id.contains(['/', '\\', '\0'])
            || stream_id.contains("..");
        if bad {
            return Err(LogError::InvalidStream(stream_id.to_string()));
        }
        Ok(self.base_dir.join(format!("{stream_id}.{LOG_EXTENSION}")))
    }
}

#[async_trait]
impl LogSink for FileLogSink {
    async fn append(&self, stream_id: &str, entry: &str) -> Result<(), LogError> {
        if entry.contains('\n') {
            return Err(LogError::MultilineEntry);
        }
        let path = self.stream_path(stream_id)?;

        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path).await?;

        // Single write so concurrent appenders cannot interleave inside a line
        file.write_all(format!("{entry}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
