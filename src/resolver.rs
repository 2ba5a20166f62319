use crate::{
    error::{ProbeError, ResolveCause},
    timeout::race,
};
use std::{
    future::Future,
    io,
    net::{IpAddr, SocketAddr},
    time::Duration,
};
use tokio::net::lookup_host;
use tracing::debug;

/// Turns a hostname into the single address a probe will connect to
pub trait Resolve: Send + Sync {
    fn resolve(&self, hostname: &str) -> impl Future<Output = Result<IpAddr, ProbeError>> + Send;
}

/// Raw name lookup, every address the resolver returned in its order
pub trait Lookup: Send + Sync {
    fn lookup(&self, hostname: &str) -> impl Future<Output = io::Result<Vec<SocketAddr>>> + Send;
}

/// The operating system resolver via `tokio::net::lookup_host`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl Lookup for SystemLookup {
    async fn lookup(&self, hostname: &str) -> io::Result<Vec<SocketAddr>> {
        Ok(lookup_host((hostname, 0)).await?.collect())
    }
}

/// Resolver bounded by the DNS timeout, without caching
#[derive(Debug, Clone, Copy)]
pub struct DnsResolver<L = SystemLookup> {
    timeout: Duration,
    lookup: L,
}

impl DnsResolver {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            lookup: SystemLookup,
        }
    }
}

impl<L: Lookup> DnsResolver<L> {
    #[must_use]
    pub const fn with_lookup(timeout: Duration, lookup: L) -> Self {
        Self { timeout, lookup }
    }
}

impl<L: Lookup> Resolve for DnsResolver<L> {
    async fn resolve(&self, hostname: &str) -> Result<IpAddr, ProbeError> {
        let failed = |cause| ProbeError::Resolution {
            hostname: hostname.to_string(),
            cause,
        };

        let addresses = race(self.timeout, self.lookup.lookup(hostname))
            .await
            .map_err(|_| failed(ResolveCause::Timeout))?
            .map_err(|e| failed(ResolveCause::Lookup(e.to_string())))?;

        let address = first_ipv4(addresses)
            .ok_or_else(|| failed(ResolveCause::Lookup("no IPv4 address found".to_string())))?;

        debug!(hostname, %address, "resolved");

        Ok(address)
    }
}

/// First IPv4 address in resolver order
fn first_ipv4<I>(addresses: I) -> Option<IpAddr>
where
    I: IntoIterator<Item = SocketAddr>,
{
    addresses
        .into_iter()
        .map(|socket| socket.ip())
        .find(IpAddr::is_ipv4)
}
