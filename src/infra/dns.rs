//! Hostname lookup infrastructure.
//!
//! Provides a trait-based abstraction over the hostname-to-address lookup,
//! allowing the DNS resolver to be tested without touching the network.

use crate::error::LookupError;
use hickory_resolver::{config::*, TokioAsyncResolver};
use std::{future::Future, net::IpAddr, pin::Pin};

/// Trait for hostname lookups.
///
/// This abstraction allows for different lookup implementations
/// and makes testing easier by allowing mock implementations.
pub trait HostLookup: Send + Sync {
    /// Resolves a hostname to a list of IP addresses.
    ///
    /// # Arguments
    ///
    /// * `host` - The hostname to resolve
    ///
    /// # Returns
    ///
    /// A future that resolves to the addresses in answer order. An empty
    /// answer is `Ok(vec![])`, not an error.
    fn lookup<'a>(
        &'a self,
        host: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<IpAddr>, LookupError>> + Send + 'a>>;
}

/// Lookup implementation using hickory-resolver (formerly trust-dns).
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    /// Creates a lookup using the default upstream configuration.
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    /// Creates a lookup from the system configuration, e.g. `/etc/resolv.conf`.
    pub fn from_system_conf() -> Result<Self, LookupError> {
        Ok(Self {
            resolver: TokioAsyncResolver::tokio_from_system_conf()?,
        })
    }
}

impl Default for HickoryLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl HostLookup for HickoryLookup {
    fn lookup<'a>(
        &'a self,
        host: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<IpAddr>, LookupError>> + Send + 'a>> {
        Box::pin(async move {
            // Check if already an IP address
            if let Ok(ip) = host.parse::<IpAddr>() {
                return Ok(vec![ip]);
            }

            let response = self.resolver.lookup_ip(host).await?;
            tracing::debug!(host, valid_until = ?response.valid_until(), "DNS answer received");
            Ok(response.iter().collect())
        })
    }
}
