//! Metrics for connection configuration
//!
//! Counters are recorded through the `metrics` facade; nothing is exported
//! unless the application installs a recorder.

pub(crate) mod labels {
    pub const CATEGORY: &str = "category";
    pub const CLIENT_AUTH: &str = "client_auth";
    pub const TLS: &str = "tls";

    pub fn bool_label(value: bool) -> &'static str {
        if value {
            "true"
        } else {
            "false"
        }
    }
}

pub(crate) mod counters {
    use super::labels;
    use crate::Error;

    pub fn uri_parsed() {
        metrics::counter!("cassandra_connect_uri_parsed_total").increment(1);
    }

    pub fn error(err: &Error) {
        metrics::counter!(
            "cassandra_connect_errors_total",
            labels::CATEGORY => err.category()
        )
        .increment(1);
    }

    pub fn tls_context_built(client_auth: bool) {
        metrics::counter!(
            "cassandra_connect_tls_contexts_total",
            labels::CLIENT_AUTH => labels::bool_label(client_auth)
        )
        .increment(1);
    }

    pub fn cluster_config_built(tls: bool) {
        metrics::counter!(
            "cassandra_connect_cluster_configs_total",
            labels::TLS => labels::bool_label(tls)
        )
        .increment(1);
    }
}
