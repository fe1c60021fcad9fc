//! Engine configuration loaded from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `USE_PERSISTENT_STORES` | `false` |
//! | `DATABASE_URL` | required when persistent |
//! | `MINIMART_PAGE_SIZE` | `5` (1..=100) |
//! | `MINIMART_LOG` | `info` |
//! | `MINIMART_SEED` | `true` |

use thiserror::Error;

use crate::repository::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be set when USE_PERSISTENT_STORES=true")]
    Missing { name: &'static str },

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where orders and stock are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory { seed: bool },
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub backend: StoreBackend,
    pub page_size: u32,
    /// Default tracing filter; `RUST_LOG` still takes precedence.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::InMemory { seed: true },
            page_size: DEFAULT_PAGE_SIZE,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let use_persistent = parse_bool("USE_PERSISTENT_STORES", lookup("USE_PERSISTENT_STORES"), false)?;
        let backend = if use_persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing {
                    name: "DATABASE_URL",
                })?;
            StoreBackend::Postgres { database_url }
        } else {
            StoreBackend::InMemory {
                seed: parse_bool("MINIMART_SEED", lookup("MINIMART_SEED"), true)?,
            }
        };

        let page_size = match lookup("MINIMART_PAGE_SIZE") {
            None => defaults.page_size,
            Some(raw) => parse_page_size(&raw)?,
        };

        let log_filter = lookup("MINIMART_LOG")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        Ok(Self {
            backend,
            page_size,
            log_filter,
        })
    }
}

fn parse_bool(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_page_size(raw: &str) -> Result<u32, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: "MINIMART_PAGE_SIZE",
        value: raw.to_string(),
        reason,
    };
    let size: u32 = raw.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(invalid(format!("must be between 1 and {MAX_PAGE_SIZE}")));
    }
    Ok(size)
}
