//! Host name resolution for contact points

use std::io;
use std::net::{IpAddr, ToSocketAddrs};

/// Resolves a host token to a single address.
pub trait HostResolver {
    /// Resolve `host` (no port) to an address
    fn resolve(&self, host: &str) -> io::Result<IpAddr>;
}

/// Resolves through the operating system; address literals skip the lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }
        (host, 0)
            .to_socket_addrs()?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses found"))
    }
}

impl<F> HostResolver for F
where
    F: Fn(&str) -> io::Result<IpAddr>,
{
    fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        self(host)
    }
}
