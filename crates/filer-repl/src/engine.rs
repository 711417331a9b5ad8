//! The replication engine: turns one change message into sink calls.

use crate::config::Config;
use crate::entry::{join_path, ChangeMessage, NamespaceEntry};
use crate::error::Result;
use crate::fetch::{fetch_content, ChunkFetcher, DEFAULT_MAX_FILE_SIZE};
use crate::sink::ReplicationSink;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Configuration for the replication engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Source filer directory being replicated. Keys outside it are skipped.
    pub source_directory: String,
    /// Largest file whose content is assembled for the sink, in bytes.
    pub max_file_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_directory: "/".to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Read `directory` and `maxFileSize` from the `source.filer` section.
    pub fn from_source_section(section: &Config) -> Result<Self> {
        let mut config = Self::default();
        let dir = section.get_string("directory");
        if !dir.is_empty() {
            config.source_directory = dir;
        }
        config.max_file_size = section.get_u64("maxFileSize", DEFAULT_MAX_FILE_SIZE)?;
        Ok(config)
    }
}

/// What [`ReplicationEngine::replicate`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicateOutcome {
    /// A new entry was written.
    Created,
    /// An existing entry was overwritten in place.
    Updated,
    /// The entry was moved and then overwritten at its new key.
    Renamed,
    /// The entry was removed.
    Deleted,
    /// Nothing to do: out of scope or a message with neither entry.
    Skipped,
}

/// Applies change messages to a single sink.
///
/// Stateless apart from the sink it owns: every call stands alone and is
/// applied immediately, with no batching or reordering.
pub struct ReplicationEngine {
    config: EngineConfig,
    sink: Box<dyn ReplicationSink>,
    fetcher: Option<Arc<dyn ChunkFetcher>>,
}

impl ReplicationEngine {
    /// Create a new engine bound to `sink`.
    pub fn new(config: EngineConfig, sink: Box<dyn ReplicationSink>, fetcher: Option<Arc<dyn ChunkFetcher>>) -> Self {
        Self { config, sink, fetcher }
    }

    /// The sink this engine writes to.
    pub fn sink(&self) -> &dyn ReplicationSink {
        self.sink.as_ref()
    }

    /// The source directory keys are scoped to.
    pub fn source_directory(&self) -> &str {
        &self.config.source_directory
    }

    fn scope(&self) -> &str {
        let dir = self.config.source_directory.trim_end_matches('/');
        if dir.is_empty() {
            "/"
        } else {
            dir
        }
    }

    /// Map a source key to its sink key, or `None` if it is outside the
    /// source directory.
    pub fn map_key(&self, key: &str) -> Option<String> {
        let scope = self.scope();
        let rel = if scope == "/" {
            key.strip_prefix('/')?
        } else {
            let rest = key.strip_prefix(scope)?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
            rest
        };
        let mapped = join_path(self.sink.sink_directory(), rel);
        trace!("replicate {} => {}", key, mapped);
        Some(mapped)
    }

    /// Apply one change message.
    pub async fn replicate(&self, key: &str, message: &ChangeMessage) -> Result<ReplicateOutcome> {
        match (&message.old_entry, &message.new_entry) {
            (None, None) => {
                warn!("ignoring message for {} with neither old nor new entry", key);
                Ok(ReplicateOutcome::Skipped)
            }
            (Some(old), None) => match self.map_key(key) {
                Some(target) => self.delete(&target, old, message.delete_chunks).await,
                None => Ok(self.skip(key)),
            },
            (None, Some(new)) => match self.map_key(key) {
                Some(target) => self.create(&target, new).await,
                None => Ok(self.skip(key)),
            },
            (Some(old), Some(new)) => {
                let new_path = message.new_path(key).unwrap_or_else(|| key.to_string());
                if new_path == key {
                    return match self.map_key(key) {
                        Some(target) => self.update_or_create(&target, old, new, message.delete_chunks).await,
                        None => Ok(self.skip(key)),
                    };
                }

                match (self.map_key(key), self.map_key(&new_path)) {
                    (Some(from), Some(to)) => {
                        let content = fetch_content(self.fetcher.as_deref(), new, self.config.max_file_size).await?;
                        self.sink.move_entry(&from, &to).await?;
                        if !self
                            .sink
                            .update_entry(&to, old, new, content.clone(), message.delete_chunks)
                            .await?
                        {
                            self.sink.create_entry(&to, new, content).await?;
                        }
                        Ok(ReplicateOutcome::Renamed)
                    }
                    (Some(from), None) => {
                        debug!("{} moved out of {} to {}", key, self.source_directory(), new_path);
                        self.delete(&from, old, message.delete_chunks).await
                    }
                    (None, Some(to)) => {
                        debug!("{} moved into {} from {}", new_path, self.source_directory(), key);
                        self.create(&to, new).await
                    }
                    (None, None) => Ok(self.skip(key)),
                }
            }
        }
    }

    fn skip(&self, key: &str) -> ReplicateOutcome {
        debug!("skipping {} outside of {}", key, self.source_directory());
        ReplicateOutcome::Skipped
    }

    async fn create(&self, target: &str, entry: &NamespaceEntry) -> Result<ReplicateOutcome> {
        let content = fetch_content(self.fetcher.as_deref(), entry, self.config.max_file_size).await?;
        self.sink.create_entry(target, entry, content).await?;
        Ok(ReplicateOutcome::Created)
    }

    async fn delete(&self, target: &str, old: &NamespaceEntry, delete_chunks: bool) -> Result<ReplicateOutcome> {
        self.sink.delete_entry(target, old.is_directory, delete_chunks).await?;
        Ok(ReplicateOutcome::Deleted)
    }

    async fn update_or_create(
        &self,
        target: &str,
        old: &NamespaceEntry,
        new: &NamespaceEntry,
        delete_chunks: bool,
    ) -> Result<ReplicateOutcome> {
        let content = fetch_content(self.fetcher.as_deref(), new, self.config.max_file_size).await?;
        if self
            .sink
            .update_entry(target, old, new, content.clone(), delete_chunks)
            .await?
        {
            return Ok(ReplicateOutcome::Updated);
        }
        self.sink.create_entry(target, new, content).await?;
        Ok(ReplicateOutcome::Created)
    }
}
