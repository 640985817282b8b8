//! Environment-provided configuration
//!
//! This module handles:
//! * Reading SSL secret material (store paths, passwords, alias, cipher suites)
//! * Caching the resulting bundle for the life of a resolver

mod secrets;

pub use secrets::{
    keys, EnvSource, SecretBundle, SecretResolver, SecretSource, StorePair, DEFAULT_CIPHER_SUITES,
};
