//! Runtime configuration, loaded from the environment (optionally via a
//! `.env` file) the way the CLI's sibling crates do: a small struct with a
//! sane `Default`, overridden by `DOCULITE_*` environment variables.

use std::env;

#[derive(Debug, Clone, PartialEq)]
pub struct DoculiteConfig {
    /// Field used as the primary key for new collections.
    pub primary_key: String,
    /// Default `limit` applied by `find` when the caller passes `0`...
    /// actually `0` always means unlimited per the query contract; this is
    /// only the CLI's own default when no `--limit` flag is given.
    pub default_limit: usize,
}

impl Default for DoculiteConfig {
    fn default() -> Self {
        Self {
            primary_key: "_id".to_string(),
            default_limit: 0,
        }
    }
}

impl DoculiteConfig {
    /// Load a `.env` file if present, then apply any `DOCULITE_PRIMARY_KEY`
    /// / `DOCULITE_DEFAULT_LIMIT` environment overrides on top of defaults.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(key) = env::var("DOCULITE_PRIMARY_KEY") {
            if !key.is_empty() {
                config.primary_key = key;
            }
        }
        if let Ok(limit) = env::var("DOCULITE_DEFAULT_LIMIT") {
            if let Ok(parsed) = limit.parse() {
                config.default_limit = parsed;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_underscore_id() {
        assert_eq!(DoculiteConfig::default().primary_key, "_id");
    }
}
