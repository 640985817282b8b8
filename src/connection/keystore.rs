//! Keystores with aliased key entries.
//!
//! Two on-disk formats are read:
//!
//! * PKCS#12 (`.p12`/`.pfx`, as written by `keytool` or `openssl pkcs12 -export`).
//!   The store password checks the MAC and decrypts the bags; aliases are the
//!   native `friendlyName`s and come back in sorted order.
//! * PEM text as produced by `openssl pkcs12 -in store.p12`: each block may be
//!   preceded by `Bag Attributes` carrying a `friendlyName` (the alias) and a
//!   `localKeyID` that ties a certificate to its private key. Plain PEM files
//!   without attributes work too.
//!
//! In PEM stores every private key becomes one entry. Its alias is the
//! `friendlyName`, else the `localKeyID`, else its zero-based position.
//! Certificates join the entry with the same `localKeyID` (or `friendlyName`);
//! certificates with neither attribute are appended to every chain.
//! `ENCRYPTED PRIVATE KEY` blocks are decrypted with the keystore password.

use crate::config::StorePair;
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rustls_pemfile::Item;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use sha2::{Digest, Sha256};
use std::fs;

/// Alias preferred when none is configured
pub const DEFAULT_CLIENT_ALIAS: &str = "client";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct BagAttributes {
    friendly_name: Option<String>,
    local_key_id: Option<String>,
}

impl BagAttributes {
    /// Whether a certificate with `cert` attributes belongs to the key carrying `self`
    fn binds(&self, cert: &BagAttributes) -> bool {
        match (&self.local_key_id, &cert.local_key_id) {
            (Some(key_id), Some(cert_id)) => key_id == cert_id,
            _ => self.friendly_name.is_some() && self.friendly_name == cert.friendly_name,
        }
    }

    fn is_unbound(&self) -> bool {
        self.friendly_name.is_none() && self.local_key_id.is_none()
    }
}

struct PemBlock {
    label: String,
    pem: String,
    attrs: BagAttributes,
}

/// Private key plus the certificate chain presented with it
pub struct KeyEntry {
    alias: String,
    key: PrivateKeyDer<'static>,
    chain: Vec<CertificateDer<'static>>,
}

impl KeyEntry {
    /// Entry alias
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Private key
    pub fn key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }

    /// Certificate chain, leaf first when the store is ordered that way
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Hex SHA-256 fingerprint of the first certificate in the chain
    pub fn fingerprint(&self) -> Option<String> {
        let leaf = self.chain.first()?;
        let digest = Sha256::digest(leaf.as_ref());
        Some(
            digest
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(":"),
        )
    }
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntry")
            .field("alias", &self.alias)
            .field("key", &"<private key>")
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// Ordered collection of key entries
#[derive(Debug, Default)]
pub struct KeyStore {
    entries: Vec<KeyEntry>,
}

impl KeyStore {
    /// Read and parse the keystore file; the file is closed before parsing starts
    pub fn load(store: &StorePair) -> Result<Self> {
        let path = store.path();
        let data = fs::read(path).map_err(|e| {
            Error::tls(format!(
                "Failed to read keystore file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_bytes(&data, store.password())
            .map_err(|e| e.in_tls_context(format!("keystore '{}'", path.display())))
    }

    /// Parse keystore contents, PKCS#12 or PEM
    pub fn from_bytes(data: &[u8], password: &str) -> Result<Self> {
        if is_pkcs12(data) {
            Self::from_pkcs12(data, password)
        } else {
            Self::from_pem(data, password)
        }
    }

    /// Parse a PKCS#12 keystore; trusted certificate entries are skipped
    pub fn from_pkcs12(data: &[u8], password: &str) -> Result<Self> {
        let store = open_pkcs12(data, password)?;

        let entries = store
            .entries()
            .filter_map(|(alias, entry)| match entry {
                p12_keystore::KeyStoreEntry::PrivateKeyChain(chain) => Some(KeyEntry {
                    alias: alias.clone(),
                    key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(chain.key().to_vec())),
                    chain: chain
                        .chain()
                        .iter()
                        .map(|cert| CertificateDer::from(cert.as_der().to_vec()))
                        .collect(),
                }),
                p12_keystore::KeyStoreEntry::Certificate(_) => None,
            })
            .collect();

        Ok(Self { entries })
    }

    /// Parse PEM keystore contents
    pub fn from_pem(data: &[u8], password: &str) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::tls("keystore is neither PKCS#12 nor PEM text"))?;

        let mut keys = Vec::new();
        let mut certs = Vec::new();
        for block in split_blocks(text)? {
            match decode_block(&block, password)? {
                Some(Decoded::Key(key)) => keys.push((block.attrs, key)),
                Some(Decoded::Cert(cert)) => certs.push((block.attrs, cert)),
                None => {}
            }
        }

        let entries = keys
            .into_iter()
            .enumerate()
            .map(|(idx, (attrs, key))| {
                let alias = attrs
                    .friendly_name
                    .clone()
                    .or_else(|| attrs.local_key_id.clone())
                    .unwrap_or_else(|| idx.to_string());
                let mut chain: Vec<_> = certs
                    .iter()
                    .filter(|(cert_attrs, _)| attrs.binds(cert_attrs))
                    .map(|(_, cert)| cert.clone())
                    .collect();
                chain.extend(
                    certs
                        .iter()
                        .filter(|(cert_attrs, _)| cert_attrs.is_unbound())
                        .map(|(_, cert)| cert.clone()),
                );
                KeyEntry { alias, key, chain }
            })
            .collect();

        Ok(Self { entries })
    }

    /// Aliases in file order
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.alias.as_str())
    }

    /// Entry for `alias`
    pub fn get(&self, alias: &str) -> Option<&KeyEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    /// Number of key entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no key entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick the entry to present, see [`select_alias`]
    pub fn select(&self, explicit: Option<&str>) -> Result<&KeyEntry> {
        let aliases: Vec<&str> = self.aliases().collect();
        let alias = select_alias(&aliases, explicit)?;
        self.get(alias)
            .ok_or_else(|| Error::tls(format!("alias '{}' vanished from keystore", alias)))
    }
}

/// Resolve which alias to present.
///
/// 1. An explicit alias must exist in the store.
/// 2. Otherwise `client`, when present.
/// 3. Otherwise the first alias; an empty store is an error.
pub fn select_alias<'a>(aliases: &[&'a str], explicit: Option<&str>) -> Result<&'a str> {
    if let Some(wanted) = explicit {
        return aliases.iter().copied().find(|a| *a == wanted).ok_or_else(|| {
            Error::tls(format!(
                "Keystore alias was explicitly defined but not found in keystore: {}",
                wanted
            ))
        });
    }

    if let Some(alias) = aliases.iter().copied().find(|a| *a == DEFAULT_CLIENT_ALIAS) {
        return Ok(alias);
    }

    aliases
        .first()
        .copied()
        .ok_or_else(|| Error::tls("No alias found in keystore"))
}

/// Trust anchors from a truststore file.
///
/// PKCS#12 stores contribute their trusted certificate entries, PEM files every
/// certificate block. The password is only needed for PKCS#12.
pub(crate) fn load_trusted_certificates(store: &StorePair) -> Result<Vec<CertificateDer<'static>>> {
    let path = store.path();
    let data = fs::read(path).map_err(|e| {
        Error::tls(format!(
            "Failed to read truststore file '{}': {}",
            path.display(),
            e
        ))
    })?;
    trusted_certificates(&data, store.password())
        .map_err(|e| e.in_tls_context(format!("truststore '{}'", path.display())))
}

fn trusted_certificates(data: &[u8], password: &str) -> Result<Vec<CertificateDer<'static>>> {
    if is_pkcs12(data) {
        let store = open_pkcs12(data, password)?;
        return Ok(store
            .entries()
            .filter_map(|(_, entry)| match entry {
                p12_keystore::KeyStoreEntry::Certificate(cert) => {
                    Some(CertificateDer::from(cert.as_der().to_vec()))
                }
                p12_keystore::KeyStoreEntry::PrivateKeyChain(_) => None,
            })
            .collect());
    }

    rustls_pemfile::certs(&mut &data[..])
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::tls(format!("invalid PEM certificate: {}", e)))
}

/// DER `SEQUENCE` with a long-form length; PEM text never starts this way
fn is_pkcs12(data: &[u8]) -> bool {
    matches!(data, [0x30, len, ..] if *len >= 0x80)
}

fn open_pkcs12(data: &[u8], password: &str) -> Result<p12_keystore::KeyStore> {
    p12_keystore::KeyStore::from_pkcs12(data, password)
        .map_err(|e| Error::tls(format!("invalid PKCS#12 store: {}", e)))
}

fn split_blocks(text: &str) -> Result<Vec<PemBlock>> {
    let mut blocks = Vec::new();
    let mut attrs = BagAttributes::default();
    let mut open: Option<(&str, String)> = None;

    for line in text.lines() {
        let line = line.trim();

        if let Some((label, mut pem)) = open.take() {
            pem.push_str(line);
            pem.push('\n');
            if line.starts_with("-----END ") {
                blocks.push(PemBlock {
                    label: label.to_string(),
                    pem,
                    attrs: std::mem::take(&mut attrs),
                });
            } else {
                open = Some((label, pem));
            }
            continue;
        }

        if let Some(label) = line
            .strip_prefix("-----BEGIN ")
            .and_then(|l| l.strip_suffix("-----"))
        {
            open = Some((label, format!("{}\n", line)));
        } else if line.starts_with("Bag Attributes") {
            attrs = BagAttributes::default();
        } else if let Some(name) = line.strip_prefix("friendlyName:") {
            attrs.friendly_name = Some(name.trim().to_string());
        } else if let Some(id) = line.strip_prefix("localKeyID:") {
            attrs.local_key_id = Some(id.trim().to_string());
        }
    }

    if let Some((label, _)) = open {
        return Err(Error::tls(format!("unterminated PEM block '{}'", label)));
    }
    Ok(blocks)
}

enum Decoded {
    Key(PrivateKeyDer<'static>),
    Cert(CertificateDer<'static>),
}

fn decode_block(block: &PemBlock, password: &str) -> Result<Option<Decoded>> {
    if block.label == "ENCRYPTED PRIVATE KEY" {
        return decrypt_pkcs8(&block.pem, password).map(|key| Some(Decoded::Key(key)));
    }

    match rustls_pemfile::read_one(&mut block.pem.as_bytes()) {
        Ok(Some(Item::X509Certificate(cert))) => Ok(Some(Decoded::Cert(cert))),
        Ok(Some(Item::Pkcs8Key(key))) => Ok(Some(Decoded::Key(key.into()))),
        Ok(Some(Item::Pkcs1Key(key))) => Ok(Some(Decoded::Key(key.into()))),
        Ok(Some(Item::Sec1Key(key))) => Ok(Some(Decoded::Key(key.into()))),
        Ok(_) => {
            tracing::debug!("skipping PEM block '{}'", block.label);
            Ok(None)
        }
        Err(e) => Err(Error::tls(format!(
            "invalid PEM block '{}': {}",
            block.label, e
        ))),
    }
}

fn decrypt_pkcs8(pem: &str, password: &str) -> Result<PrivateKeyDer<'static>> {
    let body: String = pem
        .lines()
        .filter(|l| !l.starts_with("-----") && !l.contains(':'))
        .collect();
    let der = BASE64
        .decode(body.as_bytes())
        .map_err(|e| Error::tls(format!("invalid encrypted key encoding: {}", e)))?;

    let info = pkcs8::EncryptedPrivateKeyInfo::try_from(der.as_slice())
        .map_err(|e| Error::tls(format!("invalid encrypted key: {}", e)))?;
    let document = info
        .decrypt(password)
        .map_err(|e| Error::tls(format!("failed to decrypt private key: {}", e)))?;

    Ok(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        document.as_bytes().to_vec(),
    )))
}
