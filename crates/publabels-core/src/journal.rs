//! JSONL journal of event records.
//!
//! One [`EventRecord`] per line, appended in sequence order. The journal is
//! the registry's only persistent state: restarting replays it.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::events::{EventRecord, EventSink};

/// Appends published batches to a journal file, flushing each batch to
/// disk before the registry applies it.
///
/// Writes and flushes are blocking. The server calls them under the
/// registry write lock, so a slow disk stalls one runtime worker per write.
pub struct JournalWriter {
    path: PathBuf,
    file: File,
    /// File length before the last accepted batch, for `retract`.
    last_batch_start: Option<u64>,
}

impl JournalWriter {
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            last_batch_start: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_batch(&mut self, content: &[u8]) -> std::io::Result<()> {
        self.file.write_all(content)?;
        self.file.sync_data()
    }

    /// Cut the file back to `len` bytes and flush the truncation.
    fn truncate_to(&mut self, len: u64) -> Result<(), CoreError> {
        self.file
            .set_len(len)
            .and_then(|()| self.file.sync_data())
            .map_err(CoreError::Rollback)?;
        tracing::warn!(path = %self.path.display(), len, "journal rolled back");
        Ok(())
    }
}

impl EventSink for JournalWriter {
    fn publish(&mut self, records: &[EventRecord]) -> Result<(), CoreError> {
        let content = export_records_to_jsonl(records)?;
        let start = self.file.metadata()?.len();
        self.last_batch_start = None;

        if let Err(e) = self.write_batch(content.as_bytes()) {
            tracing::error!(path = %self.path.display(), error = %e, "journal write failed");
            self.truncate_to(start)?;
            return Err(CoreError::Io(e));
        }

        self.last_batch_start = Some(start);
        tracing::trace!(
            path = %self.path.display(),
            records = records.len(),
            "journal batch written"
        );
        Ok(())
    }

    fn retract(&mut self, _records: &[EventRecord]) -> Result<(), CoreError> {
        let start = self.last_batch_start.take().ok_or_else(|| {
            CoreError::Rollback(std::io::Error::other("no journal batch to retract"))
        })?;
        self.truncate_to(start)
    }
}

pub(crate) fn export_records_to_jsonl(records: &[EventRecord]) -> Result<String, CoreError> {
    records.iter().try_fold(String::new(), |mut out, record| {
        let line = serde_json::to_string(record).map_err(std::io::Error::from)?;
        out.push_str(&line);
        out.push('\n');
        Ok(out)
    })
}

/// Parse journal content into `(line number, record)` pairs, skipping
/// blank lines. Line numbers are 1-based.
pub(crate) fn parse_journal(content: &str) -> Result<Vec<(usize, EventRecord)>, CoreError> {
    content
        .lines()
        .enumerate()
        .try_fold(Vec::new(), |mut records, (line_num, line)| {
            let line = line.trim();
            if line.is_empty() {
                return Ok(records);
            }

            let record: EventRecord =
                serde_json::from_str(line).map_err(|e| CoreError::Journal {
                    line: line_num + 1,
                    message: e.to_string(),
                })?;
            records.push((line_num + 1, record));
            Ok(records)
        })
}

/// Read a journal file. A missing file is an empty journal.
pub fn read_journal(path: &Path) -> Result<Vec<(usize, EventRecord)>, CoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_journal(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(CoreError::Io(e)),
    }
}
