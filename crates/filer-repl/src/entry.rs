//! Namespace entries and change notifications.
//!
//! A [`ChangeMessage`] carries the old and new snapshot of one filer entry.
//! Which of the two are present decides the kind of change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One content chunk of a file, stored on a volume server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChunk {
    /// Volume file id, e.g. `3,01637037d6`.
    pub file_id: String,
    /// Byte offset of this chunk within the file.
    pub offset: u64,
    /// Chunk length in bytes.
    pub size: u64,
    /// Chunk modification time, nanoseconds since Unix epoch.
    #[serde(default)]
    pub mtime: i64,
}

/// POSIX-ish attributes of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAttributes {
    /// Permission bits.
    #[serde(default)]
    pub file_mode: u32,
    /// Owner user id.
    #[serde(default)]
    pub uid: u32,
    /// Owner group id.
    #[serde(default)]
    pub gid: u32,
    /// Owner user name, if the filer recorded one.
    #[serde(default)]
    pub user_name: String,
    /// Modification time, seconds since Unix epoch.
    #[serde(default)]
    pub mtime: i64,
}

/// Metadata snapshot of one node in the filer tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceEntry {
    /// Base name of the node.
    pub name: String,
    /// True for directories, which carry no chunks.
    #[serde(default)]
    pub is_directory: bool,
    /// Content chunks; empty for directories and empty files.
    #[serde(default)]
    pub chunks: Vec<FileChunk>,
    /// Node attributes.
    #[serde(default)]
    pub attributes: EntryAttributes,
}

impl NamespaceEntry {
    /// A file entry with the given chunks.
    pub fn file(name: impl Into<String>, chunks: Vec<FileChunk>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            chunks,
            attributes: EntryAttributes::default(),
        }
    }

    /// A directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            chunks: Vec::new(),
            attributes: EntryAttributes::default(),
        }
    }

    /// Logical file size: the furthest byte any chunk covers.
    ///
    /// `None` if a chunk's end does not fit in a `u64`.
    pub fn total_size(&self) -> Option<u64> {
        self.chunks
            .iter()
            .try_fold(0u64, |size, c| Some(size.max(c.offset.checked_add(c.size)?)))
    }
}

/// Kind of change a message describes, for logging and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// New entry appeared.
    Create,
    /// Entry went away.
    Delete,
    /// Entry changed in place or was renamed.
    Modify,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Create => "add",
            ChangeKind::Delete => "delete",
            ChangeKind::Modify => "modify",
        };
        f.write_str(s)
    }
}

/// A single filer change notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMessage {
    /// Entry before the change.
    #[serde(default)]
    pub old_entry: Option<NamespaceEntry>,
    /// Entry after the change.
    #[serde(default)]
    pub new_entry: Option<NamespaceEntry>,
    /// Whether the chunks of the old entry were released by the source.
    #[serde(default)]
    pub delete_chunks: bool,
    /// Parent directory of the new entry when it differs from the key's.
    #[serde(default)]
    pub new_parent_path: Option<String>,
}

impl ChangeMessage {
    /// A creation of `entry`.
    pub fn create(entry: NamespaceEntry) -> Self {
        Self {
            new_entry: Some(entry),
            ..Default::default()
        }
    }

    /// A deletion of `entry`.
    pub fn delete(entry: NamespaceEntry, delete_chunks: bool) -> Self {
        Self {
            old_entry: Some(entry),
            delete_chunks,
            ..Default::default()
        }
    }

    /// An in-place update from `old` to `new`.
    pub fn update(old: NamespaceEntry, new: NamespaceEntry) -> Self {
        Self {
            old_entry: Some(old),
            new_entry: Some(new),
            ..Default::default()
        }
    }

    /// A move of `old` to `new` under `new_parent_path`.
    pub fn rename(old: NamespaceEntry, new: NamespaceEntry, new_parent_path: &str) -> Self {
        Self {
            old_entry: Some(old),
            new_entry: Some(new),
            new_parent_path: Some(new_parent_path.to_string()),
            ..Default::default()
        }
    }

    /// Classify by old/new presence; `None` when both are absent.
    pub fn kind(&self) -> Option<ChangeKind> {
        match (&self.old_entry, &self.new_entry) {
            (None, Some(_)) => Some(ChangeKind::Create),
            (Some(_), None) => Some(ChangeKind::Delete),
            (Some(_), Some(_)) => Some(ChangeKind::Modify),
            (None, None) => None,
        }
    }

    /// Full path of the new entry, given the key the message arrived under.
    pub fn new_path(&self, key: &str) -> Option<String> {
        let new_entry = self.new_entry.as_ref()?;
        let parent = match &self.new_parent_path {
            Some(p) if !p.is_empty() => p.clone(),
            _ => parent_dir(key).to_string(),
        };
        Some(join_path(&parent, &new_entry.name))
    }
}

/// Parent directory of a slash-separated path. The root's parent is itself.
pub fn parent_dir(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None if path.starts_with('/') => "/",
        None => "",
    }
}

/// Join a directory and a relative path with exactly one separator.
pub fn join_path(dir: &str, rest: &str) -> String {
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        return if dir.is_empty() { "/".to_string() } else { dir.to_string() };
    }
    if dir.ends_with('/') {
        format!("{}{}", dir, rest)
    } else {
        format!("{}/{}", dir, rest)
    }
}
