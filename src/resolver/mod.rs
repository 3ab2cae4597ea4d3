//! Name resolution for client-side load balancing.
//!
//! A [`ResolverRegistry`] picks a [`ResolverFactory`] by the target URI's
//! scheme; the factory builds a [`Resolver`] that, once started, pushes a
//! [`ResolutionOutcome`] to its [`ResultListener`] after every attempt.

pub mod dns;
mod lifecycle;
pub mod rate_limiter;
mod registry;
pub mod types;

pub use dns::{DnsResolver, DnsResolverFactory, DNS_SCHEME};
pub use lifecycle::{Resolve, Resolver, ResolverState, ResultListener};
pub use rate_limiter::{RateLimiter, MIN_RESOLUTION_INTERVAL};
pub use registry::{ResolverFactory, ResolverRegistry};
pub use types::*;
