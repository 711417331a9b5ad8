//! Local directory sink.
//!
//! Mirrors the replicated tree into `sink.local.directory` on the local
//! filesystem. File modes and modification times are carried over where the
//! platform allows it.

use crate::config::Config;
use crate::entry::{parent_dir, EntryAttributes, NamespaceEntry};
use crate::error::{ReplError, Result};
use crate::registry::Plugin;
use crate::sink::ReplicationSink;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

fn sink_err<'a>(op: &'static str, key: &'a str) -> impl FnOnce(std::io::Error) -> ReplError + 'a {
    move |e| ReplError::Sink {
        op,
        key: key.to_string(),
        msg: e.to_string(),
    }
}

/// Sink writing into a local directory.
#[derive(Debug, Default)]
pub struct LocalSink {
    directory: String,
}

impl LocalSink {
    /// Registered name, also the `sink.<name>` config section.
    pub const NAME: &'static str = "local";

    /// Create an uninitialized sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&self, op: &'static str, key: &str) -> Result<PathBuf> {
        let path = PathBuf::from(key);
        let escapes = path.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.directory) {
            return Err(ReplError::Sink {
                op,
                key: key.to_string(),
                msg: format!("key is outside sink directory {}", self.directory),
            });
        }
        Ok(path)
    }

    async fn write_file(&self, op: &'static str, key: &str, entry: &NamespaceEntry, content: &Bytes) -> Result<()> {
        let path = self.resolve(op, key)?;
        if entry.is_directory {
            tokio::fs::create_dir_all(&path).await.map_err(sink_err(op, key))?;
        } else {
            tokio::fs::create_dir_all(parent_dir(key))
                .await
                .map_err(sink_err(op, key))?;
            // a previous copy may carry a read-only mode; replace it rather than open it
            match tokio::fs::remove_file(&path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(sink_err(op, key)(e)),
                _ => {}
            }
            tokio::fs::write(&path, content).await.map_err(sink_err(op, key))?;
        }
        apply_attributes(&path, entry.is_directory, &entry.attributes)
            .await
            .map_err(sink_err(op, key))?;
        debug!("local {} {} ({} bytes)", op, key, content.len());
        Ok(())
    }
}

async fn apply_attributes(path: &Path, is_directory: bool, attrs: &EntryAttributes) -> std::io::Result<()> {
    // mtime first: a read-only mode would block opening for write
    if !is_directory && attrs.mtime > 0 {
        let mtime: SystemTime = UNIX_EPOCH + Duration::from_secs(attrs.mtime as u64);
        let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
        let file = file.into_std().await;
        tokio::task::spawn_blocking(move || file.set_modified(mtime))
            .await
            .map_err(std::io::Error::other)??;
    }

    #[cfg(unix)]
    if attrs.file_mode != 0 {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(attrs.file_mode & 0o7777);
        tokio::fs::set_permissions(path, perms).await?;
    }
    Ok(())
}

#[async_trait]
impl Plugin for LocalSink {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn initialize(&mut self, section: &Config) -> Result<()> {
        let directory = section.get_string("directory");
        if directory.is_empty() {
            return Err(ReplError::config("sink.local.directory is required"));
        }
        if !directory.starts_with('/') {
            return Err(ReplError::config(format!(
                "sink.local.directory must be absolute, got {}",
                directory
            )));
        }
        tokio::fs::create_dir_all(&directory).await?;
        self.directory = directory;
        Ok(())
    }
}

#[async_trait]
impl ReplicationSink for LocalSink {
    fn sink_directory(&self) -> &str {
        &self.directory
    }

    async fn create_entry(&self, key: &str, entry: &NamespaceEntry, content: Bytes) -> Result<()> {
        self.write_file("create", key, entry, &content).await
    }

    async fn update_entry(
        &self,
        key: &str,
        _old_entry: &NamespaceEntry,
        new_entry: &NamespaceEntry,
        content: Bytes,
        _delete_chunks: bool,
    ) -> Result<bool> {
        let path = self.resolve("update", key)?;
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(sink_err("update", key))?;
        if !exists {
            return Ok(false);
        }
        self.write_file("update", key, new_entry, &content).await?;
        Ok(true)
    }

    async fn delete_entry(&self, key: &str, is_directory: bool, _delete_chunks: bool) -> Result<()> {
        let path = self.resolve("delete", key)?;
        let res = if is_directory {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match res {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other.map_err(sink_err("delete", key)),
        }
    }

    async fn move_entry(&self, old_key: &str, new_key: &str) -> Result<()> {
        let from = self.resolve("move", old_key)?;
        let to = self.resolve("move", new_key)?;
        tokio::fs::create_dir_all(parent_dir(new_key))
            .await
            .map_err(sink_err("move", new_key))?;
        match tokio::fs::rename(&from, &to).await {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("local move {} skipped: source missing", old_key);
                Ok(())
            }
            other => other.map_err(sink_err("move", old_key)),
        }
    }
}
