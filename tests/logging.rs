//! Log output around secret loading and TLS construction

use cassandra_connect::client::{cluster_config, ConnectionProperties};
use cassandra_connect::config::{keys, SecretResolver};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture_logs(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(captured.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = captured.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

fn env(pairs: &[(&str, &str)]) -> SecretResolver {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    SecretResolver::new(map)
}

#[test]
fn test_missing_store_pair_silent_without_ssl() {
    let logs = capture_logs(|| {
        let secrets = env(&[(keys::KEYSTORE, "/etc/cassandra/client.p12")]).load();
        assert!(secrets.keystore().is_none());
        cluster_config(
            "jdbc:cassandra://127.0.0.1/ks",
            &ConnectionProperties::new(),
            &secrets,
        )
        .unwrap();
    });
    assert!(!logs.contains("won't be applied"), "{}", logs);
}

#[test]
fn test_missing_store_pair_warned_when_configuring_ssl() {
    let logs = capture_logs(|| {
        let secrets = env(&[
            (keys::ENABLE_SSL, "true"),
            (keys::KEYSTORE, "/etc/cassandra/client.p12"),
        ])
        .load();
        cluster_config(
            "jdbc:cassandra://127.0.0.1/ks",
            &ConnectionProperties::new(),
            &secrets,
        )
        .unwrap();
    });
    assert!(
        logs.contains("keystore or its password is not defined"),
        "{}",
        logs
    );
    assert!(
        logs.contains("truststore or its password is not defined"),
        "{}",
        logs
    );
}
