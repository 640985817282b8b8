//! Connection material
//!
//! This module handles:
//! * Consistency levels
//! * PKCS#12 and PEM keystores, alias selection
//! * TLS context construction
//! * Host resolution and the final cluster configuration

mod cluster;
mod consistency;
mod keystore;
mod resolver;
mod tls;

pub use cluster::{ClusterConfig, Credentials, DEFAULT_PORT};
pub use consistency::ConsistencyLevel;
pub use keystore::{select_alias, KeyEntry, KeyStore, DEFAULT_CLIENT_ALIAS};
pub use resolver::{HostResolver, SystemResolver};
pub use tls::{TlsMaterial, TlsMaterialBuilder};
