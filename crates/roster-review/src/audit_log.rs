//! Append-only JSON-lines audit sink.
//!
//! One [`AuditRecord`] per line. Writers inside one process are serialised by
//! a mutex so lines never interleave.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use roster_consensus::{AuditRecord, AuditSink, ConsensusError, EngineResult};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct JsonlAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every parseable record in the log. Lines that fail to parse are
    /// skipped with a warning; a missing file reads as empty.
    pub async fn read_all(&self) -> EngineResult<Vec<AuditRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.path, e)),
        };
        let mut records = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = line_no + 1,
                    "Skipping unreadable audit line: {e}"
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, record: &AuditRecord) -> EngineResult<String> {
        let mut line = encode(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| io_error(&self.path, e))?;
        file.flush().await.map_err(|e| io_error(&self.path, e))?;

        debug!(path = %self.path.display(), audit_id = %record.id, "Appended audit record");
        Ok(record.id.clone())
    }

    /// Rewrite the log without records past their retention horizon.
    /// Returns how many were dropped.
    async fn purge_expired(&self, now: NaiveDateTime) -> EngineResult<usize> {
        let _guard = self.write_lock.lock().await;
        let records = self.read_all().await?;
        let before = records.len();
        let kept: Vec<_> = records.into_iter().filter(|r| !r.is_expired(now)).collect();
        let dropped = before - kept.len();
        if dropped == 0 {
            return Ok(0);
        }

        let mut body = String::new();
        for record in &kept {
            body.push_str(&encode(record)?);
            body.push('\n');
        }
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        info!(
            path = %self.path.display(),
            dropped,
            kept = kept.len(),
            "Purged expired audit records"
        );
        Ok(dropped)
    }
}

fn encode(record: &AuditRecord) -> EngineResult<String> {
    serde_json::to_string(record).map_err(|e| ConsensusError::Audit(e.to_string()))
}

fn io_error(path: &Path, e: std::io::Error) -> ConsensusError {
    ConsensusError::Audit(format!("{}: {}", path.display(), e))
}
