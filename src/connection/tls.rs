//! TLS context construction for Cassandra connections.
//!
//! Builds a rustls [`ClientConfig`] from the secret bundle: truststore material,
//! client key material selected by alias, and an explicit cipher suite list.
//! Stores may be PKCS#12 or PEM, see [`KeyStore`].

use super::keystore::{load_trusted_certificates, KeyStore};
use crate::config::{SecretBundle, StorePair};
use crate::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{aws_lc_rs, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme, SupportedCipherSuite,
    SupportedProtocolVersion,
};
use std::sync::Arc;

/// Constructed TLS context plus what went into it.
///
/// Built fresh for every cluster configuration and attached to all contact points.
///
/// # Examples
///
/// ```ignore
/// use cassandra_connect::config::SecretResolver;
/// use cassandra_connect::connection::TlsMaterial;
///
/// let secrets = SecretResolver::from_env().load();
/// let tls = TlsMaterial::builder(&secrets)
///     .verify_server_cert(true)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsMaterial {
    client_config: Arc<ClientConfig>,
    cipher_suites: Vec<String>,
    key_alias: Option<String>,
    verifies_server_certificates: bool,
    trust_anchors: usize,
}

impl TlsMaterial {
    /// Create a builder over the given secrets
    pub fn builder(secrets: &SecretBundle) -> TlsMaterialBuilder<'_> {
        TlsMaterialBuilder {
            secrets,
            verify_server_cert: true,
        }
    }

    /// Build with default settings
    pub fn build(secrets: &SecretBundle) -> Result<Self> {
        Self::builder(secrets).build()
    }

    /// Get the rustls ClientConfig for this TLS context.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Cipher suites applied to the context, in configured order
    pub fn cipher_suites(&self) -> &[String] {
        &self.cipher_suites
    }

    /// Alias of the client key presented, if any
    pub fn key_alias(&self) -> Option<&str> {
        self.key_alias.as_deref()
    }

    /// Whether server certificate chains are validated.
    ///
    /// `false` whenever a truststore is configured: its material is loaded but
    /// every server chain is accepted.
    pub fn verifies_server_certificates(&self) -> bool {
        self.verifies_server_certificates
    }

    /// Number of trust anchors loaded (truststore or platform roots)
    pub fn trust_anchor_count(&self) -> usize {
        self.trust_anchors
    }
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("cipher_suites", &self.cipher_suites)
            .field("key_alias", &self.key_alias)
            .field(
                "verifies_server_certificates",
                &self.verifies_server_certificates,
            )
            .field("trust_anchors", &self.trust_anchors)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for [`TlsMaterial`].
pub struct TlsMaterialBuilder<'a> {
    secrets: &'a SecretBundle,
    verify_server_cert: bool,
}

impl<'a> TlsMaterialBuilder<'a> {
    /// Record the requested server certificate verification (default: enabled).
    ///
    /// This does not switch validation on or off. With a truststore configured,
    /// every server chain is accepted regardless; a warning is logged when this is
    /// `true` in that case.
    pub fn verify_server_cert(mut self, verify: bool) -> Self {
        self.verify_server_cert = verify;
        self
    }

    /// Build the TLS context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsConfig`] if:
    /// - a store file cannot be read, holds invalid PEM, or is a PKCS#12 store
    ///   the password does not open
    /// - the truststore contains no usable certificates
    /// - the configured alias is missing, or the keystore has no key entries
    /// - none of the configured cipher suites is supported
    pub fn build(self) -> Result<TlsMaterial> {
        let secrets = self.secrets;
        let base = aws_lc_rs::default_provider();
        let (suites, applied) = select_cipher_suites(&base.cipher_suites, secrets.cipher_suites())?;
        let provider = Arc::new(CryptoProvider {
            cipher_suites: suites,
            ..base
        });
        let versions = protocol_versions(&provider.cipher_suites);

        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(&versions)?;

        if secrets.truststore().is_none() {
            tracing::warn!(
                "truststore or its password is not defined; truststore won't be applied to the TLS context"
            );
        }
        if secrets.keystore().is_none() {
            tracing::warn!(
                "keystore or its password is not defined; keystore won't be applied to the TLS context"
            );
        }

        let (builder, trust_anchors, verifies) = match secrets.truststore() {
            Some(store) => {
                let roots = load_truststore(store)?;
                if self.verify_server_cert {
                    tracing::warn!(
                        "truststore configured: server certificates are accepted without validation even though verification was requested"
                    );
                }
                let builder = builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert::new(
                        provider.clone(),
                    )));
                (builder, roots.len(), false)
            }
            None => {
                let roots = platform_roots();
                let count = roots.len();
                (builder.with_root_certificates(roots), count, true)
            }
        };

        let (client_config, key_alias) = match secrets.keystore() {
            Some(store) => {
                let keystore = KeyStore::load(store)?;
                let entry = keystore.select(secrets.key_alias())?;
                if entry.chain().is_empty() {
                    return Err(Error::tls(format!(
                        "keystore entry '{}' has no certificate",
                        entry.alias()
                    )));
                }
                tracing::info!(
                    alias = entry.alias(),
                    fingerprint = entry.fingerprint().as_deref().unwrap_or(""),
                    "presenting client certificate"
                );
                let config =
                    builder.with_client_auth_cert(entry.chain().to_vec(), entry.key().clone_key())?;
                (config, Some(entry.alias().to_string()))
            }
            None => (builder.with_no_client_auth(), None),
        };

        crate::metrics::counters::tls_context_built(key_alias.is_some());
        tracing::info!(
            cipher_suites = ?applied,
            client_auth = key_alias.is_some(),
            verifies_server_certificates = verifies,
            "TLS context built"
        );

        Ok(TlsMaterial {
            client_config: Arc::new(client_config),
            cipher_suites: applied,
            key_alias,
            verifies_server_certificates: verifies,
            trust_anchors,
        })
    }
}

/// Whether a provider suite answers to a configured name.
///
/// IANA names are accepted for TLS 1.3 suites (`TLS_AES_128_GCM_SHA256`) as well
/// as rustls' `TLS13_` spelling.
fn suite_matches(suite: &SupportedCipherSuite, configured: &str) -> bool {
    let name = format!("{:?}", suite.suite());
    if name.eq_ignore_ascii_case(configured) {
        return true;
    }
    suite.tls13().is_some()
        && configured
            .get(..4)
            .is_some_and(|p| p.eq_ignore_ascii_case("TLS_"))
        && name.eq_ignore_ascii_case(&format!("TLS13_{}", &configured[4..]))
}

/// Pick provider suites for the configured names, preserving configured order
fn select_cipher_suites(
    available: &[SupportedCipherSuite],
    configured: &[String],
) -> Result<(Vec<SupportedCipherSuite>, Vec<String>)> {
    let mut suites = Vec::new();
    let mut applied = Vec::new();

    for name in configured {
        match available.iter().find(|s| suite_matches(s, name)) {
            Some(suite) if !suites.contains(suite) => {
                suites.push(*suite);
                applied.push(name.clone());
            }
            Some(_) => {}
            None => tracing::warn!("cipher suite '{}' is not supported, ignoring", name),
        }
    }

    if suites.is_empty() {
        return Err(Error::tls(format!(
            "none of the configured cipher suites are supported: {}",
            configured.join(", ")
        )));
    }
    Ok((suites, applied))
}

fn protocol_versions(suites: &[SupportedCipherSuite]) -> Vec<&'static SupportedProtocolVersion> {
    let mut versions = Vec::new();
    if suites.iter().any(|s| s.tls13().is_some()) {
        versions.push(&rustls::version::TLS13);
    }
    if suites.iter().any(|s| s.tls13().is_none()) {
        versions.push(&rustls::version::TLS12);
    }
    versions
}

/// Trust anchors from the truststore; at least one must be usable.
fn load_truststore(store: &StorePair) -> Result<RootCertStore> {
    let certs = load_trusted_certificates(store)?;
    root_store(certs)
        .map_err(|e| e.in_tls_context(format!("truststore '{}'", store.path().display())))
}

fn root_store(certs: Vec<CertificateDer<'static>>) -> Result<RootCertStore> {
    let found = certs.len();
    let mut roots = RootCertStore::empty();
    let (added, rejected) = roots.add_parsable_certificates(certs);
    if rejected > 0 {
        tracing::warn!("{} of {} truststore certificates could not be parsed", rejected, found);
    }
    if added == 0 {
        return Err(Error::tls("No valid certificates found"));
    }

    tracing::debug!("loaded {} truststore certificates", added);
    Ok(roots)
}

/// System roots via rustls-native-certs, falling back to the bundled webpki roots.
fn platform_roots() -> RootCertStore {
    let result = rustls_native_certs::load_native_certs();

    let mut store = RootCertStore::empty();
    for cert in result.certs {
        let _ = store.add_parsable_certificates(std::iter::once(cert));
    }

    if store.is_empty() {
        if !result.errors.is_empty() {
            tracing::debug!("native root certificates unavailable: {:?}", result.errors);
        }
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    store
}

/// Accepts every server certificate chain; handshake signatures are still checked.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl AcceptAnyServerCert {
    fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
