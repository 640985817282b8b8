//! SSL secret material read from environment-style configuration

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Configuration keys consulted by [`SecretResolver`]
pub mod keys {
    /// `"true"` (any case) enables SSL when no connection option says otherwise
    pub const ENABLE_SSL: &str = "CASS_CLIENT_ENABLE_SSL";
    /// Path to the keystore (PKCS#12 or PEM) holding client keys and certificates
    pub const KEYSTORE: &str = "CASS_CLIENT_KEYSTORE";
    /// Keystore password
    pub const KEYSTORE_PASSWORD: &str = "CASS_CLIENT_KEYSTORE_PASSWORD";
    /// Path to the truststore (PKCS#12 or PEM)
    pub const TRUSTSTORE: &str = "CASS_CLIENT_TRUSTSTORE";
    /// Truststore password
    pub const TRUSTSTORE_PASSWORD: &str = "CASS_CLIENT_TRUSTSTORE_PASSWORD";
    /// Alias of the keystore entry to present
    pub const KEY_ALIAS: &str = "CASS_CLIENT_KEY_ALIAS";
    /// Comma-separated cipher suite names
    pub const CIPHER_SUITE: &str = "CASS_CLIENT_CIPHER_SUITE";
}

/// Cipher suites applied when [`keys::CIPHER_SUITE`] is unset
pub const DEFAULT_CIPHER_SUITES: &[&str] = &[
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
];

/// A source of secret configuration values.
///
/// The process environment is the usual source; maps are handy for tests and for
/// callers that keep secrets elsewhere.
pub trait SecretSource {
    /// Look up a raw value
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl SecretSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl<S: BuildHasher> SecretSource for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// A store file together with the password that unlocks it
#[derive(Clone, PartialEq, Eq)]
pub struct StorePair {
    path: PathBuf,
    password: String,
}

impl StorePair {
    /// Pair a store path with its password
    pub fn new(path: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            password: password.into(),
        }
    }

    /// Store file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store password
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for StorePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePair")
            .field("path", &self.path)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Immutable SSL secret configuration.
///
/// Built once from a [`SecretSource`] (see [`SecretResolver`]) and shared by
/// reference with option resolution and TLS context construction. The `with_*`
/// methods consume the bundle and exist for callers assembling one by hand.
#[derive(Debug, Clone)]
pub struct SecretBundle {
    enable_ssl: bool,
    keystore: Option<StorePair>,
    truststore: Option<StorePair>,
    key_alias: Option<String>,
    cipher_suites: Vec<String>,
}

impl Default for SecretBundle {
    fn default() -> Self {
        Self {
            enable_ssl: false,
            keystore: None,
            truststore: None,
            key_alias: None,
            cipher_suites: DEFAULT_CIPHER_SUITES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SecretBundle {
    /// Read every secret key from `source` exactly once.
    ///
    /// A store whose path or password is missing is left out; the TLS builder
    /// reports it when SSL is actually configured.
    pub fn from_source(source: &dyn SecretSource) -> Self {
        let get = |key: &str| source.get(key).filter(|v| !v.is_empty());

        let enable_ssl = get(keys::ENABLE_SSL)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let truststore = store_pair(get(keys::TRUSTSTORE), get(keys::TRUSTSTORE_PASSWORD));
        let keystore = store_pair(get(keys::KEYSTORE), get(keys::KEYSTORE_PASSWORD));

        let cipher_suites = match get(keys::CIPHER_SUITE) {
            Some(list) => parse_cipher_list(&list),
            None => DEFAULT_CIPHER_SUITES.iter().map(|s| s.to_string()).collect(),
        };

        let bundle = Self {
            enable_ssl,
            keystore,
            truststore,
            key_alias: get(keys::KEY_ALIAS),
            cipher_suites,
        };
        tracing::debug!(
            enable_ssl = bundle.enable_ssl,
            keystore = bundle.keystore.is_some(),
            truststore = bundle.truststore.is_some(),
            key_alias = ?bundle.key_alias,
            "loaded SSL secret configuration"
        );
        bundle
    }

    /// Whether the environment asks for SSL
    pub fn enable_ssl(&self) -> bool {
        self.enable_ssl
    }

    /// Keystore location and password, if both were configured
    pub fn keystore(&self) -> Option<&StorePair> {
        self.keystore.as_ref()
    }

    /// Truststore location and password, if both were configured
    pub fn truststore(&self) -> Option<&StorePair> {
        self.truststore.as_ref()
    }

    /// Explicitly configured key alias
    pub fn key_alias(&self) -> Option<&str> {
        self.key_alias.as_deref()
    }

    /// Cipher suite names to apply, in configured order
    pub fn cipher_suites(&self) -> &[String] {
        &self.cipher_suites
    }

    /// Set the SSL enable flag
    pub fn with_enable_ssl(mut self, enable: bool) -> Self {
        self.enable_ssl = enable;
        self
    }

    /// Set the keystore
    pub fn with_keystore(mut self, store: StorePair) -> Self {
        self.keystore = Some(store);
        self
    }

    /// Set the truststore
    pub fn with_truststore(mut self, store: StorePair) -> Self {
        self.truststore = Some(store);
        self
    }

    /// Set the explicit key alias
    pub fn with_key_alias(mut self, alias: impl Into<String>) -> Self {
        self.key_alias = Some(alias.into());
        self
    }

    /// Replace the cipher suite list
    pub fn with_cipher_suites<I, S>(mut self, suites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cipher_suites = suites.into_iter().map(Into::into).collect();
        self
    }
}

fn store_pair(path: Option<String>, password: Option<String>) -> Option<StorePair> {
    path.zip(password)
        .map(|(path, password)| StorePair::new(path, password))
}

fn parse_cipher_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lazily loads a [`SecretBundle`] and hands out the same instance afterwards.
///
/// Construct one at startup and pass the loaded bundle to the pieces that need it.
/// Concurrent readers are fine once the bundle has been loaded.
pub struct SecretResolver {
    source: Box<dyn SecretSource + Send + Sync>,
    bundle: OnceLock<Arc<SecretBundle>>,
}

impl SecretResolver {
    /// Resolver over an arbitrary source
    pub fn new(source: impl SecretSource + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(source),
            bundle: OnceLock::new(),
        }
    }

    /// Resolver over the process environment
    pub fn from_env() -> Self {
        Self::new(EnvSource)
    }

    /// Load the bundle on first call, return the cached one afterwards
    pub fn load(&self) -> Arc<SecretBundle> {
        self.bundle
            .get_or_init(|| Arc::new(SecretBundle::from_source(self.source.as_ref())))
            .clone()
    }
}

impl std::fmt::Debug for SecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretResolver")
            .field("loaded", &self.bundle.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    struct CountingSource {
        inner: HashMap<String, String>,
        reads: Arc<AtomicUsize>,
    }

    impl SecretSource for CountingSource {
        fn get(&self, key: &str) -> Option<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).cloned()
        }
    }

    #[test]
    fn test_empty_source_defaults() {
        let bundle = SecretBundle::from_source(&source(&[]));
        assert!(!bundle.enable_ssl());
        assert!(bundle.keystore().is_none());
        assert!(bundle.truststore().is_none());
        assert!(bundle.key_alias().is_none());
        assert_eq!(bundle.cipher_suites(), DEFAULT_CIPHER_SUITES);
    }

    #[test]
    fn test_full_source() {
        let bundle = SecretBundle::from_source(&source(&[
            (keys::ENABLE_SSL, "TRUE"),
            (keys::KEYSTORE, "/etc/cass/keystore.pem"),
            (keys::KEYSTORE_PASSWORD, "kspass"),
            (keys::TRUSTSTORE, "/etc/cass/truststore.pem"),
            (keys::TRUSTSTORE_PASSWORD, "tspass"),
            (keys::KEY_ALIAS, "app"),
            (keys::CIPHER_SUITE, "TLS_AES_128_GCM_SHA256, TLS_AES_256_GCM_SHA384 ,"),
        ]));

        assert!(bundle.enable_ssl());
        let ks = bundle.keystore().unwrap();
        assert_eq!(ks.path(), Path::new("/etc/cass/keystore.pem"));
        assert_eq!(ks.password(), "kspass");
        assert_eq!(bundle.truststore().unwrap().password(), "tspass");
        assert_eq!(bundle.key_alias(), Some("app"));
        assert_eq!(
            bundle.cipher_suites(),
            &["TLS_AES_128_GCM_SHA256", "TLS_AES_256_GCM_SHA384"]
        );
    }

    #[test]
    fn test_missing_password_drops_store() {
        let bundle = SecretBundle::from_source(&source(&[
            (keys::KEYSTORE, "/etc/cass/keystore.pem"),
            (keys::TRUSTSTORE_PASSWORD, "tspass"),
        ]));
        assert!(bundle.keystore().is_none());
        assert!(bundle.truststore().is_none());
    }

    #[test]
    fn test_stores_are_independent() {
        let bundle = SecretBundle::from_source(&source(&[
            (keys::TRUSTSTORE, "/etc/cass/truststore.pem"),
            (keys::TRUSTSTORE_PASSWORD, "tspass"),
            (keys::KEYSTORE, "/etc/cass/keystore.pem"),
        ]));
        assert!(bundle.truststore().is_some());
        assert!(bundle.keystore().is_none());
    }

    #[test]
    fn test_enable_ssl_parsing() {
        for (raw, expected) in [("true", true), ("True", true), ("1", false), ("yes", false)] {
            let bundle = SecretBundle::from_source(&source(&[(keys::ENABLE_SSL, raw)]));
            assert_eq!(bundle.enable_ssl(), expected, "value {:?}", raw);
        }
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let bundle = SecretBundle::default().with_keystore(StorePair::new("/ks.pem", "hunter2"));
        let debug_str = format!("{:?}", bundle);
        assert!(debug_str.contains("/ks.pem"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_resolver_reads_source_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let resolver = SecretResolver::new(CountingSource {
            inner: source(&[(keys::ENABLE_SSL, "true")]),
            reads: reads.clone(),
        });

        let first = resolver.load();
        let after_first = reads.load(Ordering::SeqCst);
        let second = resolver.load();

        assert_eq!(after_first, 7);
        assert_eq!(reads.load(Ordering::SeqCst), after_first);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.enable_ssl());
    }
}
