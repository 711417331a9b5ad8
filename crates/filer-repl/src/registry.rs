//! Named plugin registries.
//!
//! Notification inputs and sinks are registered under a name together with a
//! factory. At startup the registry is scanned in registration order and the
//! first entry whose `<prefix>.<name>.enabled` flag is set is built and
//! initialized with its own config section.

use crate::config::Config;
use crate::error::{ReplError, Result};
use async_trait::async_trait;
use tracing::info;

/// Behaviour shared by every configurable plugin.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Registered name, also the config section name.
    fn name(&self) -> &str;

    /// Apply the plugin's config section (`<prefix>.<name>.*`, prefix stripped).
    async fn initialize(&mut self, section: &Config) -> Result<()>;
}

type Factory<T> = Box<dyn Fn() -> Box<T> + Send + Sync>;

struct Registration<T: ?Sized> {
    name: String,
    factory: Factory<T>,
}

/// Ordered set of plugin factories.
pub struct Registry<T: ?Sized> {
    entries: Vec<Registration<T>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: ?Sized + Plugin> Registry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factory. Later registrations lose ties to earlier ones.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.entries.push(Registration {
            name: name.to_string(),
            factory: Box::new(factory),
        });
    }

    /// Builder-style [`Registry::register`].
    pub fn with<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.name.clone()).collect()
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn enabled_entry(&self, config: &Config, prefix: &str) -> Option<&Registration<T>> {
        self.entries
            .iter()
            .find(|r| config.get_bool(&format!("{}.{}.enabled", prefix, r.name)))
    }

    /// Name of the plugin [`Registry::select`] would pick, without building it.
    pub fn first_enabled(&self, config: &Config, prefix: &str) -> Option<&str> {
        self.enabled_entry(config, prefix).map(|r| r.name.as_str())
    }

    /// Build and initialize the first enabled plugin.
    ///
    /// `prefix` is the config namespace (`notification` or `sink`) and `kind`
    /// labels the plugin family in logs and errors. Returns `Ok(None)` when no
    /// plugin is enabled; an initialization failure is returned as
    /// [`ReplError::InitFailed`] and no later plugin is tried.
    pub async fn select(&self, config: &Config, prefix: &str, kind: &'static str) -> Result<Option<Box<T>>> {
        let Some(registration) = self.enabled_entry(config, prefix) else {
            return Ok(None);
        };

        let section = config.sub(&format!("{}.{}", prefix, registration.name));
        let mut plugin = (registration.factory)();
        if let Err(e) = plugin.initialize(&section).await {
            return Err(ReplError::InitFailed {
                kind,
                name: registration.name.clone(),
                msg: e.to_string(),
            });
        }
        info!("Configure {} to {}", kind, plugin.name());
        Ok(Some(plugin))
    }
}
