//! Store configuration.

use jsonstore_storage::DEFAULT_RETRY_BUDGET;
use std::time::Duration;

/// Maximum number of queued mutations applied in one file write.
pub const DEFAULT_BATCH_LIMIT: usize = 50;

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Store field and collection names with a lower-case first character
    /// (`name`, `id`); when false, upper-case (`Name`, `Id`).
    pub lower_camel_case: bool,

    /// Name of the identifier field. `None` selects `id` or `Id` according
    /// to `lower_camel_case`.
    pub key_field: Option<String>,

    /// Re-read the file every time a collection view is requested.
    pub reload_before_read: bool,

    /// Passphrase for at-rest encryption. `None` stores plain JSON.
    pub passphrase: Option<String>,

    /// Write minified JSON. Encrypted stores are always minified.
    pub minify: bool,

    /// How long file access retries while the file is in use.
    pub retry_budget: Duration,

    /// Maximum number of mutations applied per file write.
    pub batch_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lower_camel_case: true,
            key_field: None,
            reload_before_read: false,
            passphrase: None,
            minify: false,
            retry_budget: DEFAULT_RETRY_BUDGET,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the casing of the first character of stored names.
    #[must_use]
    pub const fn lower_camel_case(mut self, value: bool) -> Self {
        self.lower_camel_case = value;
        self
    }

    /// Sets the identifier field name.
    #[must_use]
    pub fn key_field(mut self, name: impl Into<String>) -> Self {
        self.key_field = Some(name.into());
        self
    }

    /// Sets whether collection access re-reads the file first.
    #[must_use]
    pub const fn reload_before_read(mut self, value: bool) -> Self {
        self.reload_before_read = value;
        self
    }

    /// Enables encryption with the given passphrase.
    #[must_use]
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Sets whether JSON is written minified.
    #[must_use]
    pub const fn minify(mut self, value: bool) -> Self {
        self.minify = value;
        self
    }

    /// Sets the file access retry budget.
    #[must_use]
    pub const fn retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Sets the maximum batch size of the commit pipeline.
    #[must_use]
    pub const fn batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Returns the identifier field name in effect.
    #[must_use]
    pub fn resolved_key_field(&self) -> String {
        match &self.key_field {
            Some(name) => name.clone(),
            None if self.lower_camel_case => "id".to_string(),
            None => "Id".to_string(),
        }
    }

    /// Whether the written JSON is minified.
    #[must_use]
    pub fn writes_minified(&self) -> bool {
        self.minify || self.passphrase.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert!(config.lower_camel_case);
        assert!(!config.reload_before_read);
        assert!(!config.minify);
        assert!(config.passphrase.is_none());
        assert_eq!(config.retry_budget, Duration::from_secs(10));
        assert_eq!(config.batch_limit, 50);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .lower_camel_case(false)
            .reload_before_read(true)
            .key_field("myId")
            .batch_limit(5);

        assert!(!config.lower_camel_case);
        assert!(config.reload_before_read);
        assert_eq!(config.resolved_key_field(), "myId");
        assert_eq!(config.batch_limit, 5);
    }

    #[test]
    fn key_field_follows_casing() {
        assert_eq!(StoreConfig::new().resolved_key_field(), "id");
        assert_eq!(StoreConfig::new().lower_camel_case(false).resolved_key_field(), "Id");
    }

    #[test]
    fn encryption_forces_minified() {
        assert!(!StoreConfig::new().writes_minified());
        assert!(StoreConfig::new().minify(true).writes_minified());
        assert!(StoreConfig::new().passphrase("pw").writes_minified());
    }
}
