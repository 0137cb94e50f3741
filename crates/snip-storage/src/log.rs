use crate::error::{map_io_error, map_json_error, Result, StorageError};
use async_trait::async_trait;
use snip_core::{ReadRepository, Repository, ShortId, UrlRecord};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Append-only file implementation of the repository contract.
///
/// Every record is one JSON line. Reads scan the whole file from the start
/// and stop at the first match, so when an id was written twice the earliest
/// line wins. Writes only ever append; nothing is rewritten or compacted.
///
/// The log does not enforce target uniqueness and does not support deletion.
/// Access goes through a read/write lock so appends never interleave with
/// each other or with a scan.
#[derive(Debug)]
pub struct LogRepository {
    path: PathBuf,
    lock: RwLock<()>,
}

impl LogRepository {
    /// Opens the log at `path`, creating the file and its parent directories
    /// if they do not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(map_io_error)?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(map_io_error)?;

        Ok(Self {
            path,
            lock: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes records in file order until `visit` breaks or the file ends.
    ///
    /// A last line without a trailing newline is a torn append and is ignored.
    async fn scan<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(UrlRecord) -> ControlFlow<()> + Send,
    {
        let file = File::open(&self.path).await.map_err(map_io_error)?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut line_no = 0usize;

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(map_io_error)?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let Some(text) = line.strip_suffix(b"\n") else {
                warn!(
                    path = %self.path.display(),
                    line = line_no,
                    bytes = read,
                    "ignoring unterminated last line"
                );
                break;
            };
            if text.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let record: UrlRecord = serde_json::from_slice(text).map_err(|err| {
                StorageError::InvalidData(format!(
                    "{}:{}: {}",
                    self.path.display(),
                    line_no,
                    err
                ))
            })?;

            if visit(record).is_break() {
                break;
            }
        }

        Ok(())
    }

    async fn find_first<P>(&self, predicate: P) -> Result<Option<UrlRecord>>
    where
        P: Fn(&UrlRecord) -> bool + Send + Sync,
    {
        let mut found = None;
        self.scan(|record| {
            if predicate(&record) {
                found = Some(record);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;
        Ok(found)
    }

    /// Counts newline-terminated lines, blank ones included, and returns the
    /// number of bytes they span.
    async fn terminated_lines(&self) -> Result<(u64, u64)> {
        let file = File::open(&self.path).await.map_err(map_io_error)?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let (mut count, mut length) = (0u64, 0u64);

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(map_io_error)?;
            if read == 0 || !line.ends_with(b"\n") {
                break;
            }
            count += 1;
            length += read as u64;
        }

        Ok((count, length))
    }

    async fn append(&self, records: Vec<UrlRecord>) -> Result<()> {
        let _guard = self.lock.write().await;

        let (mut sequence, terminated_len) = self.terminated_lines().await?;
        let mut buf = String::new();
        for mut record in records {
            sequence += 1;
            record.sequence = sequence;
            buf.push_str(&serde_json::to_string(&record).map_err(map_json_error)?);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .write(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(map_io_error)?;

        let file_len = file.metadata().await.map_err(map_io_error)?.len();
        if file_len > terminated_len {
            warn!(
                path = %self.path.display(),
                bytes = file_len - terminated_len,
                "dropping unterminated last line before append"
            );
            file.set_len(terminated_len).await.map_err(map_io_error)?;
        }

        file.write_all(buf.as_bytes()).await.map_err(map_io_error)?;
        file.flush().await.map_err(map_io_error)?;

        Ok(())
    }
}

#[async_trait]
impl ReadRepository for LogRepository {
    async fn get(&self, id: &ShortId) -> Result<UrlRecord> {
        let _guard = self.lock.read().await;

        self.find_first(|record| record.short_id == *id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn get_by_target(&self, target: &str) -> Result<UrlRecord> {
        let _guard = self.lock.read().await;

        self.find_first(|record| record.target == target)
            .await?
            .ok_or_else(|| StorageError::NotFound(target.to_string()))
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        let _guard = self.lock.read().await;

        let mut owned = Vec::new();
        self.scan(|record| {
            if record.is_owned_by(owner) {
                owned.push(record);
            }
            ControlFlow::Continue(())
        })
        .await?;
        Ok(owned)
    }
}

#[async_trait]
impl Repository for LogRepository {
    async fn save(&self, record: UrlRecord) -> Result<()> {
        self.append(vec![record]).await
    }

    async fn save_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.append(records).await
    }

    async fn delete_batch(&self, ids: &[ShortId]) -> Result<()> {
        debug!(
            path = %self.path.display(),
            count = ids.len(),
            "log storage does not support deletion, ignoring batch"
        );
        Ok(())
    }
}
