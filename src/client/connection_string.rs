//! Connection string parsing
//!
//! Supports the format:
//! * jdbc:cassandra://host[:port](,host[:port])*[/keyspace[.collection]][?key=value(&|;)key=value...]
//!
//! Options need the `/` separator; a `?` in the host segment is rejected. All hosts
//! share one port: the last inline port wins.

use crate::{Error, Result};
use std::collections::HashMap;

/// Literal every connection string starts with
pub const PREFIX: &str = "jdbc:cassandra://";

/// Options from the query part of a connection string.
///
/// Keys are stored lowercase; every occurrence of a key is kept in order, and
/// lookups return the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOptions {
    values: HashMap<String, Vec<String>>,
}

impl ParsedOptions {
    /// Parse an options string (the part after `?`)
    pub fn parse(options: &str) -> Self {
        let mut parsed = Self::default();
        for pair in options.split(['&', ';']) {
            if let Some((key, value)) = pair.split_once('=') {
                parsed.push(key, value);
            }
        }
        parsed
    }

    /// Append a value for `key`
    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        self.values
            .entry(key.to_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Last value recorded for `key` (case-insensitive)
    pub fn last(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_lowercase())
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// Every value recorded for `key`, in encounter order
    pub fn all(&self, key: &str) -> &[String] {
        self.values
            .get(&key.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no options were given
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A single host from the host segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostToken {
    /// Host name or address literal
    pub host: String,
    /// Inline port, if the token carried one
    pub port: Option<u16>,
}

impl HostToken {
    fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        match token.find(':') {
            Some(idx) if idx > 0 => {
                let port = token[idx + 1..].trim();
                let port = port.parse::<u16>().map_err(|_| {
                    Error::MalformedUri(format!("invalid port '{}' for host '{}'", port, token))
                })?;
                Ok(Self {
                    host: token[..idx].trim().to_string(),
                    port: Some(port),
                })
            }
            _ => Ok(Self {
                host: token.to_string(),
                port: None,
            }),
        }
    }
}

/// Ordered, non-empty list of hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    tokens: Vec<HostToken>,
}

impl HostSpec {
    fn parse(segment: &str) -> Result<Self> {
        let tokens = segment
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .map(HostToken::parse)
            .collect::<Result<Vec<_>>>()?;

        if tokens.is_empty() {
            return Err(Error::MalformedUri("no hosts given".into()));
        }
        Ok(Self { tokens })
    }

    /// Hosts in connection string order
    pub fn tokens(&self) -> &[HostToken] {
        &self.tokens
    }

    /// Host names without ports
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|t| t.host.as_str())
    }

    /// Port shared by every host: the last inline port observed
    pub fn shared_port(&self) -> Option<u16> {
        self.tokens.iter().filter_map(|t| t.port).last()
    }
}

/// Keyspace and collection addressed by the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Keyspace name
    pub keyspace: String,
    /// Collection, present only when the segment had a `.`
    pub collection: Option<String>,
}

impl Namespace {
    fn parse(segment: &str) -> Option<Self> {
        if segment.is_empty() {
            return None;
        }
        Some(match segment.split_once('.') {
            Some((keyspace, collection)) => Self {
                keyspace: keyspace.to_string(),
                collection: Some(collection.to_string()),
            },
            None => Self {
                keyspace: segment.to_string(),
                collection: None,
            },
        })
    }
}

/// Parsed connection string
#[derive(Debug, Clone)]
pub struct ParsedUri {
    raw: String,
    hosts: HostSpec,
    namespace: Option<Namespace>,
    options: ParsedOptions,
}

impl ParsedUri {
    /// Parse connection string
    pub fn parse(s: &str) -> Result<Self> {
        let result = Self::parse_inner(s);
        match &result {
            Ok(parsed) => {
                crate::metrics::counters::uri_parsed();
                tracing::debug!(
                    hosts = parsed.hosts.tokens().len(),
                    keyspace = ?parsed.keyspace(),
                    options = parsed.options.len(),
                    "parsed connection string"
                );
            }
            Err(e) => crate::metrics::counters::error(e),
        }
        result
    }

    fn parse_inner(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| Error::MalformedUri(format!("URI needs to start with {}", PREFIX)))?;

        // options need a namespace separator ahead of them
        if let Some(q) = rest.find('?') {
            if !rest[..q].contains('/') {
                return Err(Error::MalformedUri(
                    "URI contains options without trailing slash".into(),
                ));
            }
        }

        let (server_part, ns_part, options) = match rest.rfind('/') {
            None => (rest, "", ParsedOptions::default()),
            Some(pos) => {
                let (server, ns) = (&rest[..pos], &rest[pos + 1..]);
                match ns.split_once('?') {
                    Some((ns, query)) => (server, ns, ParsedOptions::parse(query)),
                    None => (server, ns, ParsedOptions::default()),
                }
            }
        };

        Ok(Self {
            raw: s.to_string(),
            hosts: HostSpec::parse(server_part)?,
            namespace: Namespace::parse(ns_part),
            options,
        })
    }

    /// The unparsed connection string
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Hosts
    pub fn hosts(&self) -> &HostSpec {
        &self.hosts
    }

    /// Namespace, if the connection string named a keyspace
    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    /// Keyspace name
    pub fn keyspace(&self) -> Option<&str> {
        self.namespace.as_ref().map(|ns| ns.keyspace.as_str())
    }

    /// Collection name
    pub fn collection(&self) -> Option<&str> {
        self.namespace
            .as_ref()
            .and_then(|ns| ns.collection.as_deref())
    }

    /// Query options
    pub fn options(&self) -> &ParsedOptions {
        &self.options
    }
}

impl std::fmt::Display for ParsedUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for ParsedUri {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(rest: &str) -> String {
        format!("{}{}", PREFIX, rest)
    }

    #[test]
    fn test_parse_full() {
        let parsed = ParsedUri::parse(&uri("h1,h2:9042/ks.coll?user=a&password=b")).unwrap();
        assert_eq!(parsed.hosts().hosts().collect::<Vec<_>>(), vec!["h1", "h2"]);
        assert_eq!(parsed.hosts().shared_port(), Some(9042));
        assert_eq!(parsed.keyspace(), Some("ks"));
        assert_eq!(parsed.collection(), Some("coll"));
        assert_eq!(parsed.options().last("user"), Some("a"));
        assert_eq!(parsed.options().last("password"), Some("b"));
    }

    #[test]
    fn test_parse_host_only() {
        let parsed = ParsedUri::parse(&uri("localhost")).unwrap();
        assert_eq!(parsed.hosts().tokens().len(), 1);
        assert_eq!(parsed.hosts().shared_port(), None);
        assert!(parsed.namespace().is_none());
        assert!(parsed.options().is_empty());
    }

    #[test]
    fn test_parse_missing_prefix() {
        for bad in [
            "cassandra://localhost",
            "jdbc:mongodb://localhost/db",
            "",
            "JDBC:CASSANDRA://localhost",
        ] {
            let result = ParsedUri::parse(bad);
            assert!(matches!(result, Err(Error::MalformedUri(_))), "{:?}", bad);
        }
    }

    #[test]
    fn test_parse_options_without_slash() {
        let result = ParsedUri::parse(&uri("localhost?user=a"));
        assert!(matches!(result, Err(Error::MalformedUri(_))));
    }

    #[test]
    fn test_parse_options_before_first_slash() {
        for bad in ["h1?user=a/ks", "h1,h2?x=1/ks?y=2", "h1:9042?/ks"] {
            let result = ParsedUri::parse(&uri(bad));
            assert!(matches!(result, Err(Error::MalformedUri(_))), "{:?}", bad);
        }
    }

    #[test]
    fn test_parse_empty_namespace_with_options() {
        let parsed = ParsedUri::parse(&uri("localhost/?consistencyLevel=ALL")).unwrap();
        assert!(parsed.namespace().is_none());
        assert_eq!(parsed.options().last("consistencylevel"), Some("ALL"));
    }

    #[test]
    fn test_parse_keyspace_without_collection() {
        let parsed = ParsedUri::parse(&uri("localhost/shop")).unwrap();
        assert_eq!(parsed.keyspace(), Some("shop"));
        assert_eq!(parsed.collection(), None);
    }

    #[test]
    fn test_parse_collection_splits_on_first_dot() {
        let parsed = ParsedUri::parse(&uri("localhost/shop.orders.archive")).unwrap();
        assert_eq!(parsed.keyspace(), Some("shop"));
        assert_eq!(parsed.collection(), Some("orders.archive"));
    }

    #[test]
    fn test_parse_last_slash_splits_namespace() {
        let parsed = ParsedUri::parse(&uri("a/b/ks")).unwrap();
        assert_eq!(parsed.hosts().hosts().collect::<Vec<_>>(), vec!["a/b"]);
        assert_eq!(parsed.keyspace(), Some("ks"));
    }

    #[test]
    fn test_options_last_value_wins() {
        let options = ParsedOptions::parse("level=one&level=two");
        assert_eq!(options.last("level"), Some("two"));
        assert_eq!(options.all("level"), &["one", "two"]);
    }

    #[test]
    fn test_options_semicolon_separator() {
        let options = ParsedOptions::parse("user=a;password=b&sslEnabled=true");
        assert_eq!(options.last("user"), Some("a"));
        assert_eq!(options.last("password"), Some("b"));
        assert_eq!(options.last("sslenabled"), Some("true"));
    }

    #[test]
    fn test_options_keys_lowercased() {
        let options = ParsedOptions::parse("ConsistencyLevel=quorum&CONSISTENCYLEVEL=all");
        assert_eq!(options.last("consistencyLevel"), Some("all"));
        assert_eq!(options.len(), 1);
    }

    #[test]
    fn test_options_split_on_first_equals() {
        let options = ParsedOptions::parse("password=a=b=c");
        assert_eq!(options.last("password"), Some("a=b=c"));
    }

    #[test]
    fn test_options_without_equals_ignored() {
        let options = ParsedOptions::parse("flag&user=a&&");
        assert_eq!(options.last("flag"), None);
        assert_eq!(options.len(), 1);
    }

    #[test]
    fn test_shared_port_last_wins() {
        let parsed = ParsedUri::parse(&uri("h1:9001,h2,h3:9003/ks")).unwrap();
        assert_eq!(parsed.hosts().shared_port(), Some(9003));
        assert_eq!(parsed.hosts().tokens()[1].port, None);
    }

    #[test]
    fn test_host_tokens_trimmed() {
        let parsed = ParsedUri::parse(&uri(" h1 , h2 : 9042 ,/ks")).unwrap();
        let tokens = parsed.hosts().tokens();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].host, "h1");
        assert_eq!(tokens[1].host, "h2");
        assert_eq!(tokens[1].port, Some(9042));
    }

    #[test]
    fn test_invalid_port() {
        let result = ParsedUri::parse(&uri("h1:notaport/ks"));
        assert!(matches!(result, Err(Error::MalformedUri(_))));

        let result = ParsedUri::parse(&uri("h1:70000"));
        assert!(matches!(result, Err(Error::MalformedUri(_))));
    }

    #[test]
    fn test_empty_host_list() {
        let result = ParsedUri::parse(&uri("/ks"));
        assert!(matches!(result, Err(Error::MalformedUri(_))));
    }

    #[test]
    fn test_display_is_raw() {
        let raw = uri("h1:9042/ks?user=a");
        let parsed: ParsedUri = raw.parse().unwrap();
        assert_eq!(parsed.to_string(), raw);
        assert_eq!(parsed.raw(), raw);
    }
}
