//! # Configuration Sources
//!
//! Keys are looked up in the primary source first, then in each alternative
//! source in registration order. Running out of sources is not an error:
//! the lookup resolves to `Ok(None)`.
//!
//! ```text
//! get(key) ──→ [primary] ──miss──→ [source 1] ──miss──→ ... ──miss──→ Ok(None)
//!                  │hit                │hit
//!                  ↓                   ↓
//!              Ok(Some)            Ok(Some)
//! ```

use crate::container::config::ConfigError;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};

/// Prefix of environment variables read by [`EnvSource::dagcoin`].
pub const ENV_PREFIX: &str = "DC_";

/// A place configuration values can come from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Value stored under `key`, `Ok(None)` when this source does not know it.
    async fn get(&self, key: &str) -> Result<Option<String>, ConfigError>;
}

/// In-memory key/value source.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    name: String,
    values: HashMap<String, String>,
}

impl StaticSource {
    /// Empty source called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    /// Source called `name` holding `pairs`.
    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Store `value` under `key`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl ConfigSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.values.get(key).cloned())
    }
}

/// Environment variables, `<prefix><KEY_IN_UPPER_SNAKE_CASE>`.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    /// Variables starting with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Variables starting with [`ENV_PREFIX`].
    #[must_use]
    pub fn dagcoin() -> Self {
        Self::new(ENV_PREFIX)
    }
}

#[async_trait]
impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let variable = env_var_name(&self.prefix, key);
        match std::env::var(&variable) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Source {
                source_name: variable,
                reason: e.to_string(),
            }),
        }
    }
}

/// `prefix` plus `key` in upper snake case: `deviceName` → `DC_DEVICE_NAME`.
#[must_use]
pub fn env_var_name(prefix: &str, key: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + key.len() + 4);
    name.push_str(prefix);

    let mut previous_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() && previous_lower {
            name.push('_');
        }
        previous_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        match c {
            '-' | '.' | ' ' => name.push('_'),
            c => name.push(c.to_ascii_uppercase()),
        }
    }
    name
}

/// A primary source backed by alternatives.
pub struct LayeredConfig {
    primary: Box<dyn ConfigSource>,
    alternatives: Vec<Box<dyn ConfigSource>>,
}

impl LayeredConfig {
    /// Layers with `primary` searched first.
    pub fn new(primary: impl ConfigSource + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            alternatives: Vec::new(),
        }
    }

    /// Search `source` after every source added before it.
    pub fn add_source(&mut self, source: impl ConfigSource + 'static) -> Result<(), ConfigError> {
        if source.name().trim().is_empty() {
            return Err(ConfigError::MissingParameter("source.name"));
        }
        info!(source = source.name(), position = self.alternatives.len(), "Configuration source added");
        self.alternatives.push(Box::new(source));
        Ok(())
    }

    /// Names of all sources in search order.
    #[must_use]
    pub fn source_names(&self) -> Vec<&str> {
        std::iter::once(self.primary.name())
            .chain(self.alternatives.iter().map(|s| s.name()))
            .collect()
    }

    /// First value found for `key`, or `Ok(None)` once every source missed.
    ///
    /// A failing source ends the search with its error.
    pub async fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        if key.trim().is_empty() {
            return Err(ConfigError::MissingParameter("key"));
        }

        debug!(key, source = self.primary.name(), "Looking up configuration");
        if let Some(value) = self.primary.get(key).await? {
            return Ok(Some(value));
        }

        for source in &self.alternatives {
            match source.get(key).await? {
                Some(value) => {
                    debug!(key, source = source.name(), "Configuration found");
                    return Ok(Some(value));
                }
                None => debug!(key, source = source.name(), "Not found, moving on to next source"),
            }
        }

        debug!(key, "All configuration sources explored");
        Ok(None)
    }

    /// [`Self::get`] for every key, in order.
    pub async fn get_many<'k>(
        &self,
        keys: &[&'k str],
    ) -> Result<Vec<(&'k str, Option<String>)>, ConfigError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push((*key, self.get(key).await?));
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[async_trait]
    impl ConfigSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, ConfigError> {
            Err(ConfigError::Source {
                source_name: "broken".into(),
                reason: "unreachable".into(),
            })
        }
    }

    fn layers() -> LayeredConfig {
        let mut layers = LayeredConfig::new(StaticSource::new("conf").with("deviceName", "Primary"));
        layers
            .add_source(StaticSource::new("first").with("hub", "first-hub"))
            .unwrap();
        layers
            .add_source(
                StaticSource::new("second")
                    .with("hub", "second-hub")
                    .with("MIN_PAYMENT_DELAY", "7000"),
            )
            .unwrap();
        layers
    }

    #[tokio::test]
    async fn test_sources_are_searched_in_order() {
        let layers = layers();

        assert_eq!(layers.get("deviceName").await.unwrap().as_deref(), Some("Primary"));
        assert_eq!(layers.get("hub").await.unwrap().as_deref(), Some("first-hub"));
        assert_eq!(
            layers.get("MIN_PAYMENT_DELAY").await.unwrap().as_deref(),
            Some("7000")
        );
        assert_eq!(layers.source_names(), vec!["conf", "first", "second"]);
    }

    #[tokio::test]
    async fn test_exhausted_sources_resolve_to_none() {
        assert_eq!(layers().get("nowhere").await, Ok(None));
    }

    #[tokio::test]
    async fn test_get_many_keeps_key_order() {
        let values = layers().get_many(&["hub", "nowhere"]).await.unwrap();
        assert_eq!(values, vec![("hub", Some("first-hub".to_string())), ("nowhere", None)]);
    }

    #[tokio::test]
    async fn test_failing_source_stops_the_search() {
        let mut layers = LayeredConfig::new(StaticSource::new("conf"));
        layers.add_source(Broken).unwrap();
        layers
            .add_source(StaticSource::new("late").with("hub", "x"))
            .unwrap();

        assert!(matches!(
            layers.get("hub").await,
            Err(ConfigError::Source { .. })
        ));
    }

    #[test]
    fn test_unnamed_source_is_rejected() {
        let mut layers = LayeredConfig::new(StaticSource::new("conf"));
        assert_eq!(
            layers.add_source(StaticSource::new(" ")),
            Err(ConfigError::MissingParameter("source.name"))
        );
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        assert_eq!(
            layers().get("").await,
            Err(ConfigError::MissingParameter("key"))
        );
    }

    #[test]
    fn test_env_var_names() {
        assert_eq!(env_var_name("DC_", "deviceName"), "DC_DEVICE_NAME");
        assert_eq!(env_var_name("DC_", "DAGCOIN_MESSAGE_TIMEOUT"), "DC_DAGCOIN_MESSAGE_TIMEOUT");
        assert_eq!(env_var_name("", "hub"), "HUB");
    }

    #[tokio::test]
    async fn test_env_source_reads_prefixed_variables() {
        std::env::set_var("DCTEST_SOURCE_DEVICE_NAME", "From Env");
        let source = EnvSource::new("DCTEST_SOURCE_");

        assert_eq!(source.get("deviceName").await.unwrap().as_deref(), Some("From Env"));
        assert_eq!(source.get("hub").await.unwrap(), None);
    }
}
