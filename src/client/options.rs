//! Option resolution
//!
//! Every named option is looked up in the properties map first, then in the
//! connection string options (last value wins), then falls back to a default.

use super::connection_string::{HostSpec, Namespace, ParsedOptions, ParsedUri};
use crate::config::SecretBundle;
use crate::connection::ConsistencyLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Recognized option names (matched case-insensitively)
pub mod names {
    /// Username
    pub const USER: &str = "user";
    /// Password
    pub const PASSWORD: &str = "password";
    /// Enable SSL
    pub const SSL_ENABLED: &str = "sslenabled";
    /// Verify the server certificate
    pub const VERIFY_SERVER_CERTIFICATE: &str = "verifyservercertificate";
    /// Consistency level
    pub const CONSISTENCY_LEVEL: &str = "consistencylevel";
}

/// Built-in option defaults
pub mod defaults {
    /// Default for [`super::names::VERIFY_SERVER_CERTIFICATE`]
    pub const VERIFY_SERVER_CERTIFICATE: &str = "true";
    /// Default for [`super::names::CONSISTENCY_LEVEL`]
    pub const CONSISTENCY_LEVEL: &str = "ONE";
}

/// Truthy-string parser shared by every boolean option: `1` or `true` (any case)
pub fn is_true(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Explicit connection properties supplied next to the connection string.
///
/// Keys are case-insensitive. Values here take precedence over options embedded
/// in the connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionProperties {
    values: HashMap<String, String>,
}

impl ConnectionProperties {
    /// Empty properties
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a property, replacing any previous value for the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into().to_lowercase(), value.into());
    }

    /// Look up a property (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_lowercase())
            .or_else(|| {
                // deserialized maps keep their original key casing
                self.values
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConnectionProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

/// Resolved, typed connection settings
#[derive(Clone)]
pub struct ConnectionSettings {
    /// Username
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Whether a TLS context should be built
    pub ssl_enabled: bool,
    /// Requested server certificate verification (see `TlsMaterial::build`)
    pub verify_server_cert: bool,
    /// Consistency level
    pub consistency_level: ConsistencyLevel,
    /// Hosts from the connection string
    pub hosts: HostSpec,
    /// Keyspace and collection
    pub namespace: Option<Namespace>,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl_enabled", &self.ssl_enabled)
            .field("verify_server_cert", &self.verify_server_cert)
            .field("consistency_level", &self.consistency_level)
            .field("hosts", &self.hosts)
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Properties value, else last connection string value
fn lookup<'a>(
    properties: &'a ConnectionProperties,
    options: &'a ParsedOptions,
    name: &str,
) -> Option<&'a str> {
    properties.get(name).or_else(|| options.last(name))
}

/// Merge properties, connection string options and defaults into settings.
///
/// The SSL flag defaults to the secret bundle's enable flag when neither the
/// properties nor the connection string set it.
pub fn resolve_settings(
    parsed: &ParsedUri,
    properties: &ConnectionProperties,
    secrets: &SecretBundle,
) -> ConnectionSettings {
    let options = parsed.options();

    let user = lookup(properties, options, names::USER).map(str::to_string);
    let password = lookup(properties, options, names::PASSWORD).map(str::to_string);

    let ssl_enabled = lookup(properties, options, names::SSL_ENABLED)
        .map(is_true)
        .unwrap_or_else(|| secrets.enable_ssl());

    let verify_server_cert = is_true(
        lookup(properties, options, names::VERIFY_SERVER_CERTIFICATE)
            .unwrap_or(defaults::VERIFY_SERVER_CERTIFICATE),
    );

    let level = lookup(properties, options, names::CONSISTENCY_LEVEL)
        .unwrap_or(defaults::CONSISTENCY_LEVEL);
    let consistency_level = match ConsistencyLevel::parse(level) {
        Some(level) => level,
        None => {
            tracing::debug!(
                "unrecognized consistency level '{}', using {}",
                level,
                ConsistencyLevel::DRIVER_DEFAULT
            );
            ConsistencyLevel::DRIVER_DEFAULT
        }
    };

    ConnectionSettings {
        user,
        password,
        ssl_enabled,
        verify_server_cert,
        consistency_level,
        hosts: parsed.hosts().clone(),
        namespace: parsed.namespace().cloned(),
    }
}

/// Description of a recognized connection option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverPropertyInfo {
    /// Option name
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Default value, if any
    pub default: Option<&'static str>,
    /// Allowed values; empty means free-form
    pub choices: Vec<&'static str>,
}

/// Every option the resolver understands
pub fn property_info() -> Vec<DriverPropertyInfo> {
    vec![
        DriverPropertyInfo {
            name: names::USER,
            description: "Username for password authentication",
            default: None,
            choices: Vec::new(),
        },
        DriverPropertyInfo {
            name: names::PASSWORD,
            description: "Password for password authentication",
            default: None,
            choices: Vec::new(),
        },
        DriverPropertyInfo {
            name: names::SSL_ENABLED,
            description: "Enable SSL; defaults to the CASS_CLIENT_ENABLE_SSL environment flag",
            default: Some("false"),
            choices: vec!["true", "false"],
        },
        DriverPropertyInfo {
            name: names::VERIFY_SERVER_CERTIFICATE,
            description: "Verify the server certificate",
            default: Some(defaults::VERIFY_SERVER_CERTIFICATE),
            choices: vec!["true", "false"],
        },
        DriverPropertyInfo {
            name: names::CONSISTENCY_LEVEL,
            description: "Consistency level applied to statements",
            default: Some(defaults::CONSISTENCY_LEVEL),
            choices: ConsistencyLevel::ALL_LEVELS
                .iter()
                .map(ConsistencyLevel::as_str)
                .collect(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::connection_string::PREFIX;

    fn parse(rest: &str) -> ParsedUri {
        ParsedUri::parse(&format!("{}{}", PREFIX, rest)).unwrap()
    }

    #[test]
    fn test_is_true() {
        assert!(is_true("true"));
        assert!(is_true("TRUE"));
        assert!(is_true("1"));
        assert!(!is_true("yes"));
        assert!(!is_true("0"));
        assert!(!is_true(""));
    }

    #[test]
    fn test_defaults() {
        let settings = resolve_settings(
            &parse("localhost"),
            &ConnectionProperties::new(),
            &SecretBundle::default(),
        );
        assert_eq!(settings.user, None);
        assert_eq!(settings.password, None);
        assert!(!settings.ssl_enabled);
        assert!(settings.verify_server_cert);
        assert_eq!(settings.consistency_level, ConsistencyLevel::One);
    }

    #[test]
    fn test_properties_take_precedence() {
        let props = ConnectionProperties::new().with("user", "X");
        let settings = resolve_settings(
            &parse("localhost/ks?user=Y&password=p"),
            &props,
            &SecretBundle::default(),
        );
        assert_eq!(settings.user.as_deref(), Some("X"));
        assert_eq!(settings.password.as_deref(), Some("p"));
    }

    #[test]
    fn test_property_keys_case_insensitive() {
        let props = ConnectionProperties::new().with("ConsistencyLevel", "quorum");
        let settings = resolve_settings(&parse("h/ks"), &props, &SecretBundle::default());
        assert_eq!(settings.consistency_level, ConsistencyLevel::Quorum);
    }

    #[test]
    fn test_last_uri_value_wins() {
        let settings = resolve_settings(
            &parse("h/ks?consistencyLevel=one&consistencyLevel=two"),
            &ConnectionProperties::new(),
            &SecretBundle::default(),
        );
        assert_eq!(settings.consistency_level, ConsistencyLevel::Two);
    }

    #[test]
    fn test_invalid_consistency_falls_back() {
        let settings = resolve_settings(
            &parse("h/ks?consistencyLevel=sometimes"),
            &ConnectionProperties::new(),
            &SecretBundle::default(),
        );
        assert_eq!(settings.consistency_level, ConsistencyLevel::DRIVER_DEFAULT);
    }

    #[test]
    fn test_ssl_flag_from_secrets() {
        let secrets = SecretBundle::default().with_enable_ssl(true);
        let settings = resolve_settings(&parse("h"), &ConnectionProperties::new(), &secrets);
        assert!(settings.ssl_enabled);

        let settings = resolve_settings(&parse("h/?sslEnabled=false"), &ConnectionProperties::new(), &secrets);
        assert!(!settings.ssl_enabled);
    }

    #[test]
    fn test_ssl_flag_from_uri_and_properties() {
        let secrets = SecretBundle::default();
        let settings = resolve_settings(&parse("h/?sslenabled=1"), &ConnectionProperties::new(), &secrets);
        assert!(settings.ssl_enabled);

        let props = ConnectionProperties::new().with("sslEnabled", "false");
        let settings = resolve_settings(&parse("h/?sslenabled=true"), &props, &secrets);
        assert!(!settings.ssl_enabled);
    }

    #[test]
    fn test_verify_server_cert_option() {
        let settings = resolve_settings(
            &parse("h/?verifyServerCertificate=false"),
            &ConnectionProperties::new(),
            &SecretBundle::default(),
        );
        assert!(!settings.verify_server_cert);
    }

    #[test]
    fn test_settings_carry_hosts_and_namespace() {
        let settings = resolve_settings(
            &parse("h1:9000,h2/ks.coll"),
            &ConnectionProperties::new(),
            &SecretBundle::default(),
        );
        assert_eq!(settings.hosts.shared_port(), Some(9000));
        let ns = settings.namespace.unwrap();
        assert_eq!(ns.keyspace, "ks");
        assert_eq!(ns.collection.as_deref(), Some("coll"));
    }

    #[test]
    fn test_settings_debug_redacts_password() {
        let settings = resolve_settings(
            &parse("h/?user=u&password=s3cret"),
            &ConnectionProperties::new(),
            &SecretBundle::default(),
        );
        let debug_str = format!("{:?}", settings);
        assert!(!debug_str.contains("s3cret"));
        assert!(debug_str.contains("<redacted>"));
    }

    #[test]
    fn test_properties_from_json() {
        let props: ConnectionProperties =
            serde_json::from_str(r#"{"User": "json-user", "consistencyLevel": "ALL"}"#).unwrap();
        assert_eq!(props.get("user"), Some("json-user"));
        assert_eq!(props.get("CONSISTENCYLEVEL"), Some("ALL"));
    }

    #[test]
    fn test_properties_from_iter() {
        let props: ConnectionProperties = [("USER", "a"), ("password", "b")].into_iter().collect();
        assert_eq!(props.get("user"), Some("a"));
        assert_eq!(props.get("Password"), Some("b"));
    }

    #[test]
    fn test_property_info() {
        let info = property_info();
        let names: Vec<_> = info.iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec!["user", "password", "sslenabled", "verifyservercertificate", "consistencylevel"]
        );
        let level = info.iter().find(|p| p.name == names::CONSISTENCY_LEVEL).unwrap();
        assert_eq!(level.default, Some("ONE"));
        assert_eq!(level.choices.len(), 11);
    }
}
