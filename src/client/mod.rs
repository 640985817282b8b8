//! Connection string handling
//!
//! This module handles:
//! * Parsing `jdbc:cassandra://` connection strings
//! * Resolving options against properties and defaults
//! * Building a complete cluster configuration in one call

mod connection_string;
mod options;

pub use connection_string::{HostSpec, HostToken, Namespace, ParsedOptions, ParsedUri, PREFIX};
pub use options::{
    defaults, is_true, names, property_info, resolve_settings, ConnectionProperties,
    ConnectionSettings, DriverPropertyInfo,
};

use crate::config::SecretBundle;
use crate::connection::{ClusterConfig, HostResolver, SystemResolver, TlsMaterial};
use crate::Result;

/// Whether `url` is a connection string this crate handles
pub fn accepts_url(url: &str) -> bool {
    url.starts_with(PREFIX)
}

/// Build a cluster configuration from a connection string
///
/// # Examples
///
/// ```no_run
/// # fn example() -> cassandra_connect::Result<()> {
/// use cassandra_connect::client::{cluster_config, ConnectionProperties};
/// use cassandra_connect::config::SecretResolver;
///
/// let secrets = SecretResolver::from_env().load();
/// let cluster = cluster_config(
///     "jdbc:cassandra://db1.internal:9042/shop?user=app&password=secret",
///     &ConnectionProperties::new(),
///     &secrets,
/// )?;
/// assert!(cluster.credentials().is_some());
/// # Ok(())
/// # }
/// ```
pub fn cluster_config(
    uri: &str,
    properties: &ConnectionProperties,
    secrets: &SecretBundle,
) -> Result<ClusterConfig> {
    cluster_config_with_resolver(uri, properties, secrets, &SystemResolver)
}

/// Build a cluster configuration, resolving hosts with `resolver`
pub fn cluster_config_with_resolver(
    uri: &str,
    properties: &ConnectionProperties,
    secrets: &SecretBundle,
    resolver: &dyn HostResolver,
) -> Result<ClusterConfig> {
    let parsed = ParsedUri::parse(uri)?;
    let settings = resolve_settings(&parsed, properties, secrets);
    tracing::debug!(?settings, "resolved connection settings");

    let tls = if settings.ssl_enabled {
        tracing::info!("Configuring SSL");
        let material = TlsMaterial::builder(secrets)
            .verify_server_cert(settings.verify_server_cert)
            .build()
            .map_err(|e| {
                crate::metrics::counters::error(&e);
                e
            })?;
        Some(material)
    } else {
        None
    };

    ClusterConfig::build(&settings, tls, resolver)
}
