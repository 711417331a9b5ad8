//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use filer_repl::{ChangeMessage, Config, NamespaceEntry, NotificationSource, Plugin, ReplError, ReplicationSink, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A sink call as observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOp {
    Create { key: String, bytes: usize },
    Update { key: String, found: bool },
    Delete { key: String, is_directory: bool },
    Move { from: String, to: String },
}

/// State shared between a [`RecordingSink`] and the test that built it.
#[derive(Default)]
pub struct SinkState {
    pub ops: Vec<SinkOp>,
    pub live: HashSet<String>,
    pub failing_keys: HashSet<String>,
    pub initialized_with: Option<Config>,
}

pub type SharedSink = Arc<Mutex<SinkState>>;

/// Sink that records every call and keeps a set of live keys.
pub struct RecordingSink {
    name: &'static str,
    directory: String,
    state: SharedSink,
}

impl RecordingSink {
    pub fn new(name: &'static str, state: SharedSink) -> Self {
        Self {
            name,
            directory: "/replica".to_string(),
            state,
        }
    }

    pub fn with_directory(mut self, directory: &str) -> Self {
        self.directory = directory.to_string();
        self
    }
}

#[async_trait]
impl Plugin for RecordingSink {
    fn name(&self) -> &str {
        self.name
    }

    async fn initialize(&mut self, section: &Config) -> Result<()> {
        let dir = section.get_string("directory");
        if !dir.is_empty() {
            self.directory = dir;
        }
        self.state.lock().unwrap().initialized_with = Some(section.clone());
        Ok(())
    }
}

#[async_trait]
impl ReplicationSink for RecordingSink {
    fn sink_directory(&self) -> &str {
        &self.directory
    }

    async fn create_entry(&self, key: &str, _entry: &NamespaceEntry, content: Bytes) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_keys.contains(key) {
            return Err(ReplError::Sink {
                op: "create",
                key: key.to_string(),
                msg: "injected failure".to_string(),
            });
        }
        state.ops.push(SinkOp::Create {
            key: key.to_string(),
            bytes: content.len(),
        });
        state.live.insert(key.to_string());
        Ok(())
    }

    async fn update_entry(
        &self,
        key: &str,
        _old_entry: &NamespaceEntry,
        _new_entry: &NamespaceEntry,
        _content: Bytes,
        _delete_chunks: bool,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let found = state.live.contains(key);
        state.ops.push(SinkOp::Update {
            key: key.to_string(),
            found,
        });
        Ok(found)
    }

    async fn delete_entry(&self, key: &str, is_directory: bool, _delete_chunks: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(SinkOp::Delete {
            key: key.to_string(),
            is_directory,
        });
        state.live.remove(key);
        Ok(())
    }

    async fn move_entry(&self, old_key: &str, new_key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(SinkOp::Move {
            from: old_key.to_string(),
            to: new_key.to_string(),
        });
        if state.live.remove(old_key) {
            state.live.insert(new_key.to_string());
        }
        Ok(())
    }
}

pub type Script = Arc<Mutex<VecDeque<Result<(String, ChangeMessage)>>>>;

/// Source that replays a script, then blocks; counts how often it was polled.
pub struct ScriptedSource {
    name: &'static str,
    script: Script,
    polls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(name: &'static str, script: Script, polls: Arc<AtomicUsize>) -> Self {
        Self { name, script, polls }
    }
}

#[async_trait]
impl Plugin for ScriptedSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn initialize(&mut self, _section: &Config) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl NotificationSource for ScriptedSource {
    async fn receive_message(&mut self) -> Result<(String, ChangeMessage)> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(item) => item,
            // like a live stream with nothing new: wait forever
            None => std::future::pending().await,
        }
    }
}

/// Build a script from receive results.
pub fn script(items: Vec<Result<(String, ChangeMessage)>>) -> Script {
    Arc::new(Mutex::new(items.into()))
}

/// A receive failure for `key`.
pub fn receive_error(key: &str) -> Result<(String, ChangeMessage)> {
    Err(ReplError::Receive {
        key: key.to_string(),
        msg: "connection reset".to_string(),
    })
}

/// A directory creation under `key`.
pub fn mkdir(key: &str) -> Result<(String, ChangeMessage)> {
    let name = key.rsplit('/').next().unwrap_or_default();
    Ok((key.to_string(), ChangeMessage::create(NamespaceEntry::directory(name))))
}
