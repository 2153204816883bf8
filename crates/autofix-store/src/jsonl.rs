//! JSON-lines [`RecordStore`]: one append-only file per partition

use crate::error::StoreError;
use crate::record::{validate_partition, Record, RecordQuery, RecordStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

#[derive(Debug, Serialize, Deserialize)]
struct Line {
    sort_key: String,
    body: Value,
}

/// Record store writing `<root>/<partition>.jsonl`
///
/// Appends from this process are serialized; a later line with the same sort
/// key replaces an earlier one when read back. An append that finds the file
/// ending mid-line (an earlier write was interrupted) starts on a fresh line,
/// so only the torn fragment is lost.
#[derive(Debug)]
pub struct JsonlRecordStore {
    root: PathBuf,
    append_lock: Mutex<()>,
}

impl JsonlRecordStore {
    /// Create store rooted at `root` (created lazily on first write)
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            append_lock: Mutex::new(()),
        }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_path(&self, partition: &str) -> PathBuf {
        self.root.join(format!("{partition}.jsonl"))
    }

    async fn load(&self, partition: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        let path = self.partition_path(partition);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let mut rows = BTreeMap::new();
        for (idx, raw) in text.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Line>(raw) {
                Ok(line) => {
                    rows.insert(line.sort_key, line.body);
                }
                Err(e) => {
                    // A torn final line is the expected shape of an interrupted append
                    tracing::warn!(
                        path = %path.display(),
                        line = idx + 1,
                        error = %e,
                        "Skipping unreadable ledger line"
                    );
                }
            }
        }
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl RecordStore for JsonlRecordStore {
    async fn put(&self, record: Record) -> Result<(), StoreError> {
        validate_partition(&record.partition)?;

        let mut encoded = serde_json::to_string(&Line {
            sort_key: record.sort_key,
            body: record.body,
        })?;
        encoded.push('\n');

        let _guard = self.append_lock.lock().await;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;

        let path = self.partition_path(&record.partition);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        if ends_mid_line(&mut file)
            .await
            .map_err(|e| StoreError::io(&path, e))?
        {
            tracing::warn!(path = %path.display(), "Terminating torn ledger line before append");
            encoded.insert(0, '\n');
        }
        file.write_all(encoded.as_bytes())
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.flush().await.map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        validate_partition(&query.partition)?;
        let rows = self.load(&query.partition).await?;
        Ok(query.apply(rows.iter()))
    }
}

/// Whether a non-empty file lacks a trailing newline
async fn ends_mid_line(file: &mut fs::File) -> std::io::Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}
