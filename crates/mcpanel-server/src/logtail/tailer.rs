//! Polling reader for a growing, rotating log file.

use std::fs::Metadata;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Bytes read backwards from the start position when priming.
const PRIME_WINDOW: u64 = 256 * 1024;

/// Errors from one poll of the log file.
#[derive(Debug, Error)]
pub enum TailError {
    /// The log file does not exist (yet).
    #[error("log file not found: {0}")]
    Missing(PathBuf),
    /// Reading the log file failed.
    #[error("log file io error: {0}")]
    Io(#[from] io::Error),
}

/// Position in the tailed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailCursor {
    /// Bytes consumed so far.
    pub offset: u64,
    /// Modification time observed at the last poll.
    pub modified: Option<SystemTime>,
}

/// Reads lines appended to a file since the last poll.
pub struct FileTailer {
    path: PathBuf,
    file: Option<File>,
    cursor: TailCursor,
    partial: Vec<u8>,
}

impl FileTailer {
    /// Start tailing `path` from its current end. A missing file is read from
    /// the beginning once it appears.
    pub async fn open_at_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (file, cursor) = match File::open(&path).await {
            Ok(file) => {
                let cursor = match file.metadata().await {
                    Ok(meta) => TailCursor {
                        offset: meta.len(),
                        modified: meta.modified().ok(),
                    },
                    Err(_) => TailCursor::default(),
                };
                (Some(file), cursor)
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "log file not open yet");
                (None, TailCursor::default())
            }
        };
        Self {
            path,
            file,
            cursor,
            partial: Vec::new(),
        }
    }

    /// Path being tailed.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current cursor.
    pub fn cursor(&self) -> TailCursor {
        self.cursor
    }

    /// The last `n` complete lines before the starting position.
    pub async fn prime(&self, n: usize) -> Result<Vec<String>, TailError> {
        if n == 0 || self.cursor.offset == 0 {
            return Ok(Vec::new());
        }
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TailError::Missing(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let start = self.cursor.offset.saturating_sub(PRIME_WINDOW);
        let _ = file.seek(SeekFrom::Start(start)).await?;
        let mut bytes = Vec::new();
        let _ = file
            .take(self.cursor.offset - start)
            .read_to_end(&mut bytes)
            .await?;

        let mut lines = split_lines(&mut bytes);
        if start > 0 && !lines.is_empty() {
            // First line is cut by the window.
            let _ = lines.remove(0);
        }
        let skip = lines.len().saturating_sub(n);
        Ok(lines.split_off(skip))
    }

    /// Read complete lines written since the last poll.
    ///
    /// Rotation reopens the file and reads it from the start. The file has
    /// rotated when it shrank below the cursor, its mtime went backwards, or
    /// the path now names a different file than the open handle.
    pub async fn poll(&mut self) -> Result<Vec<String>, TailError> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.reset();
                return Err(TailError::Missing(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let len = meta.len();
        let modified = meta.modified().ok();

        let replaced = match self.file.as_ref() {
            Some(file) => match file.metadata().await {
                Ok(open) => !same_file(&open, &meta),
                Err(_) => true,
            },
            None => false,
        };
        let rotated = replaced
            || len < self.cursor.offset
            || matches!((modified, self.cursor.modified), (Some(now), Some(seen)) if now < seen);
        if rotated {
            info!(path = %self.path.display(), len, offset = self.cursor.offset, "log rotation detected");
            self.reset();
        }
        if self.file.is_none() {
            self.file = Some(File::open(&self.path).await?);
        }
        self.cursor.modified = modified;
        if len <= self.cursor.offset {
            return Ok(Vec::new());
        }

        let Some(file) = self.file.as_mut() else {
            return Ok(Vec::new());
        };
        let _ = file.seek(SeekFrom::Start(self.cursor.offset)).await?;
        let mut chunk = Vec::new();
        let read = (&mut *file)
            .take(len - self.cursor.offset)
            .read_to_end(&mut chunk)
            .await?;
        if read == 0 {
            // The handle no longer sees what the path reports.
            info!(path = %self.path.display(), len, offset = self.cursor.offset, "stale log handle, reopening");
            self.reset();
            return Ok(Vec::new());
        }
        self.cursor.offset += read as u64;

        self.partial.extend_from_slice(&chunk);
        Ok(split_lines(&mut self.partial))
    }

    fn reset(&mut self) {
        self.file = None;
        self.cursor = TailCursor::default();
        self.partial.clear();
    }
}

#[cfg(unix)]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_a: &Metadata, _b: &Metadata) -> bool {
    true
}

/// Drain complete lines from `buf`, leaving any trailing partial line.
fn split_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };
    let rest = buf.split_off(last_newline + 1);
    let complete = std::mem::replace(buf, rest);
    complete
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}

/// Poll `tailer` every `period`, pushing new lines into `lines`.
///
/// A full queue drops the line with a warning; the poll loop never waits on
/// the consumer.
#[instrument(skip_all, fields(path = %tailer.path().display()))]
pub async fn run_tailer(
    mut tailer: FileTailer,
    lines: mpsc::Sender<String>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut missing = false;
    let mut dropped: u64 = 0;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let batch = match tailer.poll().await {
            Ok(batch) => {
                if missing {
                    info!("log file available again");
                    missing = false;
                }
                batch
            }
            Err(TailError::Missing(path)) => {
                if missing {
                    debug!(path = %path.display(), "log file still missing");
                } else {
                    warn!(path = %path.display(), "log file missing, will keep retrying");
                    missing = true;
                }
                continue;
            }
            Err(e) => {
                warn!(error = %e, "log poll failed");
                continue;
            }
        };

        for line in batch {
            match lines.try_send(line) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    warn!(dropped, "log queue full, dropping line");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("log consumer gone");
                    return;
                }
            }
        }
    }
    info!("log tailer stopped");
}
