//! The replication service: source/sink selection and the receive loop.
//!
//! Startup runs in two phases. Selection picks the first enabled notification
//! input and sink from their registries, and the guard rejects a sink that
//! would write back into the observed subtree. Either phase failing is fatal.
//! After that the service only receives and replicates, logging and skipping
//! any message that fails, until the process is killed.

use crate::config::Config;
use crate::engine::{EngineConfig, ReplicateOutcome, ReplicationEngine};
use crate::entry::ChangeKind;
use crate::error::{ReplError, Result};
use crate::fetch::ChunkFetcher;
use crate::guard::check_recursive_replication;
use crate::registry::Registry;
use crate::sink::ReplicationSink;
use crate::source::NotificationSource;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info};

const DEFAULT_STATS_INTERVAL: u64 = 1000;

/// Result of startup.
pub enum Startup {
    /// Ready to run.
    Ready(Replicator),
    /// No sink is enabled; the caller lists the available ones and exits.
    NoSink {
        /// Registered sink names.
        available: Vec<String>,
    },
}

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The message was handed to the engine successfully.
    Replicated(ReplicateOutcome),
    /// The source failed to deliver a message.
    ReceiveFailed,
    /// The engine failed to apply the message for `key`.
    ReplicateFailed {
        /// Key of the dropped message.
        key: String,
    },
}

/// Counters kept by the receive loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Messages received successfully.
    pub received: u64,
    /// Received creations.
    pub added: u64,
    /// Received deletions.
    pub deleted: u64,
    /// Received modifications and renames.
    pub modified: u64,
    /// Messages that needed no sink call.
    pub skipped: u64,
    /// Failed receives.
    pub receive_failures: u64,
    /// Messages dropped because replication failed.
    pub replicate_failures: u64,
}

impl LoopStats {
    fn record_kind(&mut self, kind: Option<ChangeKind>) {
        self.received += 1;
        match kind {
            Some(ChangeKind::Create) => self.added += 1,
            Some(ChangeKind::Delete) => self.deleted += 1,
            Some(ChangeKind::Modify) => self.modified += 1,
            None => {}
        }
    }
}

/// Owns the active notification input and the engine bound to the active sink.
pub struct Replicator {
    source: Box<dyn NotificationSource>,
    engine: ReplicationEngine,
    stats: LoopStats,
    stats_interval: u64,
}

impl Replicator {
    /// Assemble a replicator from already initialized parts.
    pub fn new(source: Box<dyn NotificationSource>, engine: ReplicationEngine) -> Self {
        Self {
            source,
            engine,
            stats: LoopStats::default(),
            stats_interval: DEFAULT_STATS_INTERVAL,
        }
    }

    /// Log a stats summary every `interval` received messages; 0 disables it.
    pub fn with_stats_interval(mut self, interval: u64) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Select the notification input, check for recursion, select the sink.
    ///
    /// Errors returned here are all fatal. No message is received before this
    /// returns [`Startup::Ready`].
    pub async fn bootstrap(
        config: &Config,
        sources: &Registry<dyn NotificationSource>,
        sinks: &Registry<dyn ReplicationSink>,
        fetcher: Option<Arc<dyn ChunkFetcher>>,
    ) -> Result<Startup> {
        let source = sources
            .select(config, "notification", "notification input")
            .await?
            .ok_or_else(|| ReplError::NoNotificationInput {
                available: sources.names(),
            })?;

        check_recursive_replication(config, sinks.first_enabled(config, "sink"))?;

        let Some(sink) = sinks.select(config, "sink", "sink").await? else {
            return Ok(Startup::NoSink {
                available: sinks.names(),
            });
        };

        let engine = ReplicationEngine::new(
            EngineConfig::from_source_section(&config.sub("source.filer"))?,
            sink,
            fetcher,
        );
        let stats_interval = config.get_u64("replicate.statsInterval", DEFAULT_STATS_INTERVAL)?;
        Ok(Startup::Ready(
            Replicator::new(source, engine).with_stats_interval(stats_interval),
        ))
    }

    /// The engine messages are applied through.
    pub fn engine(&self) -> &ReplicationEngine {
        &self.engine
    }

    /// Counters so far.
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Receive one message and replicate it.
    ///
    /// Failures are logged with the affected key and counted; they never
    /// escape this call.
    pub async fn step(&mut self) -> StepOutcome {
        let (key, message) = match self.source.receive_message().await {
            Ok(received) => received,
            Err(e) => {
                error!("{}", e);
                self.stats.receive_failures += 1;
                return StepOutcome::ReceiveFailed;
            }
        };

        let kind = message.kind();
        match kind {
            Some(kind) => debug!("{:>6}: {}", kind, key),
            None => debug!("  none: {}", key),
        }
        self.stats.record_kind(kind);

        let outcome = match self.engine.replicate(&key, &message).await {
            Ok(outcome) => {
                if outcome == ReplicateOutcome::Skipped {
                    self.stats.skipped += 1;
                }
                StepOutcome::Replicated(outcome)
            }
            Err(e) => {
                error!("replicate {}: {}", key, e);
                self.stats.replicate_failures += 1;
                StepOutcome::ReplicateFailed { key }
            }
        };

        if self.stats_interval > 0 && self.stats.received % self.stats_interval == 0 && self.stats.received > 0 {
            let s = &self.stats;
            info!(
                "replicated {} messages: {} added, {} deleted, {} modified, {} skipped, {} receive failures, {} dropped",
                s.received, s.added, s.deleted, s.modified, s.skipped, s.receive_failures, s.replicate_failures
            );
        }
        outcome
    }

    /// Run the receive loop forever.
    pub async fn run(mut self) -> Infallible {
        info!(
            "replicating {} from notification input {} to sink {} at {}",
            self.engine.source_directory(),
            self.source.name(),
            self.engine.sink().name(),
            self.engine.sink().sink_directory()
        );
        loop {
            self.step().await;
        }
    }
}
