//! cassandra-connect: connection configuration core for Cassandra clients
//!
//! Turns a `jdbc:cassandra://` connection string, an optional properties map and
//! environment-provided secret configuration into a [`ClusterConfig`] that a CQL
//! driver can consume, including a mutually authenticated rustls context when SSL
//! is enabled.
//!
//! ```no_run
//! # fn example() -> cassandra_connect::Result<()> {
//! use cassandra_connect::client::{cluster_config, ConnectionProperties};
//! use cassandra_connect::config::SecretResolver;
//!
//! let secrets = SecretResolver::from_env();
//! let props = ConnectionProperties::new().with("user", "cassandra");
//! let cluster = cluster_config(
//!     "jdbc:cassandra://10.0.0.1,10.0.0.2:9042/shop?consistencyLevel=quorum",
//!     &props,
//!     &secrets.load(),
//! )?;
//! println!("{} contact points", cluster.contact_points().len());
//! # Ok(())
//! # }
//! ```
//!
//! Nothing here opens a network connection; host names are resolved to addresses
//! and the rest is handed to the driver.

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub(crate) mod metrics;

pub use client::{cluster_config, ConnectionSettings, ParsedUri};
pub use config::{SecretBundle, SecretResolver};
pub use connection::{ClusterConfig, ConsistencyLevel, TlsMaterial};
pub use error::{Error, Result};
