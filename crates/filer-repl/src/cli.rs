//! Command line interface for the `filer-replicate` binary.

use crate::config::Config;
use crate::fetch::{ChunkFetcher, HttpChunkFetcher};
use crate::replicator::{Replicator, Startup};
use crate::sink::builtin_sinks;
use crate::source::builtin_sources;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const LONG_ABOUT: &str = "\
Replicate file changes to another destination.

filer-replicate listens on filer notifications. If any file is updated, it
fetches the updated content and writes it to the configured sink.

Run `filer-replicate scaffold` to generate a replication.toml file and
customize the parameters.";

/// Annotated configuration template printed by `scaffold`.
pub const SCAFFOLD: &str = r#"# filer-replicate configuration.
# Looked up as ./replication.toml, $HOME/.seaweedfs/replication.toml or
# /etc/seaweedfs/replication.toml unless --config is given.

[source.filer]
enabled = true
grpcAddress = "localhost:18888"
# only entries under this directory are replicated
directory = "/buckets"
# volume server that chunk content is read from
volumeServerUrl = "http://localhost:8080"
# files larger than this many bytes are not replicated
maxFileSize = 1073741824

# Notification inputs: the first enabled one is used.
[notification.log]
enabled = true
# JSON lines: {"key": "/path", "message": {"old_entry": ..., "new_entry": ...}}
path = "/var/log/seaweedfs/filer-changes.jsonl"
pollIntervalMs = 1000

# Sinks: the first enabled one is used.
[sink.local]
enabled = false
directory = "/data/backup"

[replicate]
# log a summary every N messages, 0 disables
statsInterval = 1000
"#;

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "filer-replicate")]
#[command(about = "Replicate filer changes to another destination", long_about = LONG_ABOUT)]
pub struct Cli {
    /// Configuration file (TOML or JSON).
    #[arg(short, long, env = "FILER_REPL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// What to do; defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start replicating (default).
    Run,
    /// Print a replication.toml template.
    Scaffold,
    /// List the registered notification inputs and sinks.
    List,
}

impl Cli {
    /// Execute the selected command.
    pub async fn run(self) -> Result<()> {
        match self.command.clone().unwrap_or(Command::Run) {
            Command::Run => self.replicate().await,
            Command::Scaffold => {
                print!("{}", SCAFFOLD);
                Ok(())
            }
            Command::List => {
                println!("notification inputs:");
                for name in builtin_sources().names() {
                    println!("    {}", name);
                }
                println!("sinks:");
                for name in builtin_sinks().names() {
                    println!("    {}", name);
                }
                Ok(())
            }
        }
    }

    async fn replicate(&self) -> Result<()> {
        let path = Config::locate(self.config.as_deref())?;
        let config = Config::from_file(&path)?;
        info!("Loaded configuration from {}", path.display());

        let fetcher = HttpChunkFetcher::from_config(&config.sub("source.filer"))
            .map(|f| Arc::new(f) as Arc<dyn ChunkFetcher>);

        match Replicator::bootstrap(&config, &builtin_sources(), &builtin_sinks(), fetcher).await? {
            Startup::NoSink { available } => {
                println!("no data sink configured:");
                for name in available {
                    println!("    {}", name);
                }
                Ok(())
            }
            Startup::Ready(replicator) => match replicator.run().await {},
        }
    }
}
