//! # Offsync Remote
//!
//! HTTP implementation of the engine's [`RemoteClient`](offsync_engine::RemoteClient)
//! contract.
//!
//! ```no_run
//! use offsync_remote::{HttpRemoteClient, RemoteConfig};
//!
//! let config = RemoteConfig::from_env()?;
//! let remote = HttpRemoteClient::new(&config)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod config;
pub mod error;

pub use client::HttpRemoteClient;
pub use config::{ConfigError, RemoteConfig};
pub use error::HttpRemoteError;
