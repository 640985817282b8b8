#![no_main]

use cassandra_connect::connection::KeyStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(store) = KeyStore::from_bytes(data, "changeit") {
        // Selection must never panic, whatever the store holds
        let _ = store.select(None);
        let _ = store.select(Some("client"));
    }
});
