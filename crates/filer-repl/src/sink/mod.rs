//! Replication sinks: where changes are applied.

pub mod local;

use crate::entry::NamespaceEntry;
use crate::error::Result;
use crate::registry::{Plugin, Registry};
use async_trait::async_trait;
use bytes::Bytes;

pub use self::local::LocalSink;

/// A destination that mirrors filer entries.
///
/// Keys passed to a sink are already mapped under
/// [`sink_directory`](ReplicationSink::sink_directory).
#[async_trait]
pub trait ReplicationSink: Plugin {
    /// Root directory replicated keys are placed under.
    fn sink_directory(&self) -> &str;

    /// Write a new entry. `content` is empty for directories.
    async fn create_entry(&self, key: &str, entry: &NamespaceEntry, content: Bytes) -> Result<()>;

    /// Overwrite an existing entry.
    ///
    /// Returns `false` if nothing existed at `key`, in which case the caller
    /// creates it instead.
    async fn update_entry(
        &self,
        key: &str,
        old_entry: &NamespaceEntry,
        new_entry: &NamespaceEntry,
        content: Bytes,
        delete_chunks: bool,
    ) -> Result<bool>;

    /// Remove an entry. Removing a missing entry is not an error.
    async fn delete_entry(&self, key: &str, is_directory: bool, delete_chunks: bool) -> Result<()>;

    /// Move an entry to a new key. Moving a missing entry is not an error.
    async fn move_entry(&self, old_key: &str, new_key: &str) -> Result<()>;
}

/// Sinks compiled into the binary, in selection order.
pub fn builtin_sinks() -> Registry<dyn ReplicationSink> {
    Registry::<dyn ReplicationSink>::new().with(LocalSink::NAME, || Box::new(LocalSink::new()))
}
