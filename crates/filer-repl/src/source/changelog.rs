//! JSON-lines change log input.
//!
//! Tails a file where each line is `{"key": "/path", "message": {...}}`.
//! At end of file the reader sleeps for `pollIntervalMs` and tries again,
//! so a filer (or a shipping agent) can keep appending to the same file.

use crate::config::Config;
use crate::entry::ChangeMessage;
use crate::error::{ReplError, Result};
use crate::registry::Plugin;
use crate::source::NotificationSource;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Deserialize)]
struct LogRecord {
    key: String,
    message: ChangeMessage,
}

/// Notification input reading a JSON-lines change log.
pub struct ChangeLogSource {
    path: PathBuf,
    poll_interval: Duration,
    reader: Option<BufReader<File>>,
    pending: Vec<u8>,
    line_no: u64,
}

impl ChangeLogSource {
    /// Registered name, also the `notification.<name>` config section.
    pub const NAME: &'static str = "log";

    /// Create an uninitialized input.
    pub fn new() -> Self {
        Self {
            path: PathBuf::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            reader: None,
            pending: Vec::new(),
            line_no: 0,
        }
    }

    /// Number of complete lines consumed so far.
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }

    fn position(&self) -> String {
        format!("{}:{}", self.path.display(), self.line_no + 1)
    }

    /// Next complete line. Bytes are only decoded once the newline arrived,
    /// so a writer may flush anywhere, even inside a multi-byte character.
    async fn next_line(&mut self) -> Result<String> {
        loop {
            let position = self.position();
            let reader = self.reader.as_mut().ok_or_else(|| ReplError::Receive {
                key: position.clone(),
                msg: "change log not initialized".to_string(),
            })?;

            let n = reader
                .read_until(b'\n', &mut self.pending)
                .await
                .map_err(|e| ReplError::Receive {
                    key: position.clone(),
                    msg: e.to_string(),
                })?;

            if n == 0 {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            if self.pending.last() != Some(&b'\n') {
                // partial line at EOF: keep it and wait for the rest
                continue;
            }

            self.line_no += 1;
            let bytes = std::mem::take(&mut self.pending);
            return String::from_utf8(bytes).map_err(|e| ReplError::Receive {
                key: position,
                msg: format!("line is not valid UTF-8: {}", e),
            });
        }
    }
}

impl Default for ChangeLogSource {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_line(line: &str, line_no: u64) -> Result<(String, ChangeMessage)> {
    match serde_json::from_str::<LogRecord>(line) {
        Ok(record) => Ok((record.key, record.message)),
        Err(e) => {
            let key = serde_json::from_str::<serde_json::Value>(line)
                .ok()
                .and_then(|v| v.get("key").and_then(|k| k.as_str()).map(String::from))
                .unwrap_or_else(|| format!("line {}", line_no));
            Err(ReplError::Receive {
                key,
                msg: e.to_string(),
            })
        }
    }
}

#[async_trait]
impl Plugin for ChangeLogSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn initialize(&mut self, section: &Config) -> Result<()> {
        let path = section.get_string("path");
        if path.is_empty() {
            return Err(ReplError::config("notification.log.path is required"));
        }
        self.path = PathBuf::from(path);
        self.poll_interval = Duration::from_millis(
            section.get_u64("pollIntervalMs", DEFAULT_POLL_INTERVAL_MS)?,
        );

        let file = File::open(&self.path).await?;
        self.reader = Some(BufReader::new(file));
        debug!(
            "change log {} opened, polling every {:?}",
            self.path.display(),
            self.poll_interval
        );
        Ok(())
    }
}

#[async_trait]
impl NotificationSource for ChangeLogSource {
    async fn receive_message(&mut self) -> Result<(String, ChangeMessage)> {
        loop {
            let line = self.next_line().await?;
            if line.trim().is_empty() {
                continue;
            }
            return parse_line(&line, self.line_no);
        }
    }
}
