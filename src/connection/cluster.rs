//! Cluster configuration handed to the CQL driver

use super::consistency::ConsistencyLevel;
use super::resolver::HostResolver;
use super::tls::TlsMaterial;
use crate::client::ConnectionSettings;
use crate::{Error, Result};
use std::net::{IpAddr, SocketAddr};

/// Native protocol port drivers use when none is configured
pub const DEFAULT_PORT: u16 = 9042;

/// Username and password for password authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Final, immutable cluster configuration.
///
/// Contact points are resolved addresses in connection string order. All of them
/// share one port and, when SSL is enabled, one TLS context.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    contact_points: Vec<IpAddr>,
    port: Option<u16>,
    credentials: Option<Credentials>,
    consistency_level: ConsistencyLevel,
    tls: Option<TlsMaterial>,
    keyspace: Option<String>,
}

impl ClusterConfig {
    /// Combine resolved settings and optional TLS material.
    ///
    /// Every host must resolve; the first failure aborts the build with
    /// [`Error::UnknownHost`]. The port is the last inline port among the hosts.
    /// Credentials are attached only for a non-empty user with a password.
    pub fn build(
        settings: &ConnectionSettings,
        tls: Option<TlsMaterial>,
        resolver: &dyn HostResolver,
    ) -> Result<Self> {
        let result = Self::build_inner(settings, tls, resolver);
        match &result {
            Ok(config) => crate::metrics::counters::cluster_config_built(config.tls.is_some()),
            Err(e) => crate::metrics::counters::error(e),
        }
        result
    }

    fn build_inner(
        settings: &ConnectionSettings,
        tls: Option<TlsMaterial>,
        resolver: &dyn HostResolver,
    ) -> Result<Self> {
        tracing::info!("Creating cluster");

        let port = settings.hosts.shared_port();
        let mut contact_points = Vec::with_capacity(settings.hosts.tokens().len());
        for token in settings.hosts.tokens() {
            tracing::info!("Adding contact point: {} with port {:?}", token.host, port);
            let addr = resolver
                .resolve(&token.host)
                .map_err(|e| Error::UnknownHost {
                    host: token.host.clone(),
                    reason: e.to_string(),
                })?;
            contact_points.push(addr);
        }

        let credentials = match (&settings.user, &settings.password) {
            (Some(user), Some(password)) if !user.is_empty() => {
                tracing::info!("Using authentication as user '{}'", user);
                Some(Credentials::new(user, password))
            }
            _ => None,
        };

        Ok(Self {
            contact_points,
            port,
            credentials,
            consistency_level: settings.consistency_level,
            tls,
            keyspace: settings.namespace.as_ref().map(|ns| ns.keyspace.clone()),
        })
    }

    /// Resolved contact point addresses
    pub fn contact_points(&self) -> &[IpAddr] {
        &self.contact_points
    }

    /// Port shared by all contact points, if one was given
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Contact points with the shared port, or [`DEFAULT_PORT`]
    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        let port = self.port.unwrap_or(DEFAULT_PORT);
        self.contact_points
            .iter()
            .map(|ip| SocketAddr::new(*ip, port))
            .collect()
    }

    /// Credentials, when authentication is configured
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Consistency level for statements
    pub fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency_level
    }

    /// TLS context applied to every contact point
    pub fn tls(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }

    /// Keyspace to switch to after connecting
    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    /// Keyspace as a quoted CQL identifier, ready for `USE`
    pub fn quoted_keyspace(&self) -> Option<String> {
        self.keyspace.as_deref().filter(|ks| !ks.is_empty()).map(quote_identifier)
    }
}

/// Double-quote a CQL identifier unless it already is
fn quote_identifier(ident: &str) -> String {
    if ident.len() >= 2 && ident.starts_with('"') && ident.ends_with('"') {
        return ident.to_string();
    }
    format!("\"{}\"", ident.replace('"', "\"\""))
}
