#![no_main]

use cassandra_connect::client::{resolve_settings, ConnectionProperties, ParsedUri, PREFIX};
use cassandra_connect::config::SecretBundle;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Raw input exercises the prefix check; prefixed input reaches the parser proper.
    let _ = ParsedUri::parse(text);

    let uri = format!("{}{}", PREFIX, text);
    if let Ok(parsed) = ParsedUri::parse(&uri) {
        assert!(!parsed.hosts().tokens().is_empty());
        assert_eq!(parsed.raw(), uri);
        let _ = resolve_settings(&parsed, &ConnectionProperties::new(), &SecretBundle::default());
    }
});
