#![warn(missing_docs)]

//! Filer change replication: consumes filer change notifications and mirrors
//! every create, update, rename and delete into a pluggable sink.

pub mod cli;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod registry;
pub mod replicator;
pub mod sink;
pub mod source;

pub use config::Config;
pub use engine::{EngineConfig, ReplicateOutcome, ReplicationEngine};
pub use entry::{ChangeKind, ChangeMessage, EntryAttributes, FileChunk, NamespaceEntry};
pub use error::{ReplError, Result};
pub use registry::{Plugin, Registry};
pub use replicator::{LoopStats, Replicator, Startup, StepOutcome};
pub use sink::ReplicationSink;
pub use source::NotificationSource;
