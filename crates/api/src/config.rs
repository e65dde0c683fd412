//! Application configuration loaded from environment variables.

use crate::flags::FlagRouter;

/// Where workflow runs are journaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalBackend {
    /// Runs are kept in process memory and lost on restart.
    Memory,
    /// Runs are appended to the `workflow_journal` table at this URL.
    Postgres(String),
}

/// Server configuration.
///
/// | variable         | meaning                                   | default   |
/// |------------------|-------------------------------------------|-----------|
/// | `HOST`           | bind address                              | `0.0.0.0` |
/// | `PORT`           | listen port                               | `3000`    |
/// | `RUST_LOG`       | tracing filter directive                  | `info`    |
/// | `DATABASE_URL`   | PostgreSQL journal; memory when unset     | unset     |
/// | `WORKFLOW_FLAGS` | comma-separated flag keys, or `all`       | empty     |
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub journal: JournalBackend,
    pub flags: FlagRouter,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from `lookup`, which returns the value of a
    /// variable if it is set. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let port = match var("PORT").map(|raw| raw.parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "Invalid PORT, using {}", defaults.port);
                defaults.port
            }
            None => defaults.port,
        };

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            journal: var("DATABASE_URL")
                .map(JournalBackend::Postgres)
                .unwrap_or(JournalBackend::Memory),
            flags: var("WORKFLOW_FLAGS")
                .map(|list| FlagRouter::parse(&list))
                .unwrap_or_default(),
        }
    }

    /// The `host:port` address to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            journal: JournalBackend::Memory,
            flags: FlagRouter::new(),
        }
    }
}
