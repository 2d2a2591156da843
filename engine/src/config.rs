//! Configuration loaded from environment variables.

use crate::{error::StoreResult, reconcile::RetryPolicy, store::MemoryStore, ConfigError};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted retry delay, one week.
const MAX_RETRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Period of the background reconciliation sweep
    pub sweep_interval: Duration,
    /// Per-record retry bookkeeping for the sweeper
    pub retry: RetryPolicy,
    /// Snapshot file backing the local store; volatile when `None`
    pub store_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            store_path: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// - `OFFSYNC_SWEEP_INTERVAL_SECS` (default 300, must not be 0)
    /// - `OFFSYNC_RETRY_BASE_SECS` (default 30, at most one week)
    /// - `OFFSYNC_RETRY_MAX_SECS` (default 900, at most one week)
    /// - `OFFSYNC_DEAD_LETTER_AFTER` (default 8, `0` disables)
    /// - `OFFSYNC_STORE_PATH` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let interval = parse_u64(&lookup, "OFFSYNC_SWEEP_INTERVAL_SECS")?
            .unwrap_or(defaults.sweep_interval.as_secs());
        if interval == 0 {
            return Err(ConfigError::Zero {
                key: "OFFSYNC_SWEEP_INTERVAL_SECS",
            });
        }

        let base = parse_u64(&lookup, "OFFSYNC_RETRY_BASE_SECS")?
            .unwrap_or(defaults.retry.base_delay.as_secs());
        let max = parse_u64(&lookup, "OFFSYNC_RETRY_MAX_SECS")?
            .unwrap_or(defaults.retry.max_delay.as_secs());
        for (key, value) in [
            ("OFFSYNC_RETRY_BASE_SECS", base),
            ("OFFSYNC_RETRY_MAX_SECS", max),
        ] {
            if value > MAX_RETRY_SECS {
                return Err(ConfigError::TooLarge {
                    key,
                    value,
                    limit: MAX_RETRY_SECS,
                });
            }
        }
        if max < base {
            return Err(ConfigError::RetryBounds { base, max });
        }

        let dead_letter_after = match parse_u64(&lookup, "OFFSYNC_DEAD_LETTER_AFTER")? {
            Some(0) => None,
            Some(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
            None => defaults.retry.dead_letter_after,
        };

        let store_path = lookup("OFFSYNC_STORE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            sweep_interval: Duration::from_secs(interval),
            retry: RetryPolicy {
                base_delay: Duration::from_secs(base),
                max_delay: Duration::from_secs(max),
                dead_letter_after,
            },
            store_path,
        })
    }
}

impl SyncConfig {
    /// Open the local store this configuration points at.
    pub fn open_store(&self) -> StoreResult<MemoryStore> {
        match &self.store_path {
            Some(path) => MemoryStore::open(path),
            None => Ok(MemoryStore::new()),
        }
    }
}

fn parse_u64<F>(lookup: &F, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}
