//! Notification inputs: where change messages come from.

pub mod changelog;

use crate::entry::ChangeMessage;
use crate::error::Result;
use crate::registry::{Plugin, Registry};
use async_trait::async_trait;

pub use self::changelog::ChangeLogSource;

/// An ordered stream of filer change messages.
#[async_trait]
pub trait NotificationSource: Plugin {
    /// Wait for the next change and return it with its key.
    ///
    /// May block indefinitely. A failure concerns one message only and is
    /// reported as [`ReplError::Receive`](crate::error::ReplError::Receive)
    /// carrying the key where it is known.
    async fn receive_message(&mut self) -> Result<(String, ChangeMessage)>;
}

/// Notification inputs compiled into the binary, in selection order.
pub fn builtin_sources() -> Registry<dyn NotificationSource> {
    Registry::<dyn NotificationSource>::new().with(ChangeLogSource::NAME, || Box::new(ChangeLogSource::new()))
}
