//! DNS resolution of `dns:` targets.

use super::lifecycle::{Resolve, Resolver};
use super::rate_limiter::RateLimiter;
use super::registry::ResolverFactory;
use super::types::{AddressRecord, ResolutionOutcome, ResolverTarget, Status, StatusCode};
use crate::config::ResolverOptions;
use crate::error::ResolverError;
use crate::infra::{Clock, HickoryLookup, HostLookup};
use std::{future::Future, net::SocketAddr, pin::Pin, sync::Arc};
use url::Url;

/// Scheme handled by [`DnsResolverFactory`].
pub const DNS_SCHEME: &str = "dns";

/// Resolves a hostname to A/AAAA addresses, no more often than the rate
/// limiter allows.
pub struct DnsResolver {
    target: ResolverTarget,
    lookup: Arc<dyn HostLookup>,
    rate_limiter: RateLimiter,
}

impl DnsResolver {
    pub fn new(target: ResolverTarget, lookup: Arc<dyn HostLookup>, clock: Arc<dyn Clock>) -> Self {
        Self {
            target,
            lookup,
            rate_limiter: RateLimiter::new(clock),
        }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(host = %self.target.host))]
    async fn resolve_once(&mut self) -> ResolutionOutcome {
        let delay = self.rate_limiter.time_until_next_allowed();
        if !delay.is_zero() {
            tracing::debug!(?delay, "Rate limited, delaying resolution");
            tokio::time::sleep(delay).await;
        }
        self.rate_limiter.record_start();

        let host = self.target.host.as_str();
        if host.is_empty() {
            tracing::warn!("Target has no host, skipping lookup");
            return ResolutionOutcome::Failed(Status::new(
                StatusCode::InvalidArgument,
                "Invalid target: no host. Use dns:host[:port] or dns:///host[:port]",
            ));
        }

        match self.lookup.lookup(host).await {
            Ok(ips) => {
                tracing::debug!(count = ips.len(), "Lookup completed");
                let port = self.target.port;
                let addresses = ips
                    .into_iter()
                    .map(|ip| AddressRecord::new(SocketAddr::new(ip, port)))
                    .collect();
                ResolutionOutcome::from_addresses(addresses, host)
            }
            Err(e) => {
                tracing::warn!(error = %e, timeout = e.is_timeout(), "Lookup failed");
                ResolutionOutcome::Failed(
                    Status::new(
                        StatusCode::Unavailable,
                        format!("Error resolving '{}': {}", host, e),
                    )
                    .with_cause(e),
                )
            }
        }
    }
}

impl Resolve for DnsResolver {
    fn resolve(&mut self) -> Pin<Box<dyn Future<Output = ResolutionOutcome> + Send + '_>> {
        Box::pin(self.resolve_once())
    }
}

/// Builds [`DnsResolver`]s for `dns:` targets.
pub struct DnsResolverFactory {
    lookup: Arc<dyn HostLookup>,
}

impl DnsResolverFactory {
    /// Creates a factory whose resolvers query the system's configured name
    /// servers, falling back to hickory's defaults when that configuration
    /// cannot be read.
    pub fn new() -> Self {
        let lookup = HickoryLookup::from_system_conf().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Cannot read system DNS configuration, using defaults");
            HickoryLookup::new()
        });
        Self::with_lookup(Arc::new(lookup))
    }

    pub fn with_lookup(lookup: Arc<dyn HostLookup>) -> Self {
        Self { lookup }
    }
}

impl Default for DnsResolverFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverFactory for DnsResolverFactory {
    fn scheme(&self) -> &str {
        DNS_SCHEME
    }

    fn create(&self, target: &Url, options: &ResolverOptions) -> Result<Resolver, ResolverError> {
        let parsed = ResolverTarget::from_url(target, options.default_port)?;
        let dns = DnsResolver::new(parsed, self.lookup.clone(), options.clock.clone());
        Ok(Resolver::new(
            target.as_str(),
            Box::new(dns),
            options.refresh_interval,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::resolver::lifecycle::ResultListener;
    use parking_lot::Mutex;
    use std::{io, net::IpAddr, time::Duration};
    use tokio::{
        sync::mpsc::{self, UnboundedReceiver},
        time::Instant,
    };

    /// Answers every lookup the same way after `latency`, recording when
    /// each lookup began.
    struct MockLookup {
        answer: fn() -> Result<Vec<IpAddr>, LookupError>,
        latency: Duration,
        calls: Mutex<Vec<Instant>>,
    }

    impl MockLookup {
        fn new(answer: fn() -> Result<Vec<IpAddr>, LookupError>) -> Arc<Self> {
            Self::slow(answer, Duration::ZERO)
        }

        fn slow(answer: fn() -> Result<Vec<IpAddr>, LookupError>, latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                answer,
                latency,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().clone()
        }
    }

    impl HostLookup for MockLookup {
        fn lookup<'a>(
            &'a self,
            _host: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<IpAddr>, LookupError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.lock().push(Instant::now());
                tokio::time::sleep(self.latency).await;
                (self.answer)()
            })
        }
    }

    fn two_hosts() -> Result<Vec<IpAddr>, LookupError> {
        Ok(vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()])
    }

    fn one_host() -> Result<Vec<IpAddr>, LookupError> {
        Ok(vec!["10.0.0.1".parse().unwrap()])
    }

    fn no_hosts() -> Result<Vec<IpAddr>, LookupError> {
        Ok(Vec::new())
    }

    fn unreachable() -> Result<Vec<IpAddr>, LookupError> {
        Err(io::Error::new(io::ErrorKind::NetworkUnreachable, "network is unreachable").into())
    }

    fn start(
        target: &str,
        lookup: Arc<MockLookup>,
    ) -> (Resolver, UnboundedReceiver<ResolutionOutcome>) {
        let options = ResolverOptions::default()
            .with_default_port(443)
            .with_refresh_interval(None);
        start_with(target, DnsResolverFactory::with_lookup(lookup), &options)
    }

    fn start_with(
        target: &str,
        factory: DnsResolverFactory,
        options: &ResolverOptions,
    ) -> (Resolver, UnboundedReceiver<ResolutionOutcome>) {
        let resolver = factory
            .create(&Url::parse(target).unwrap(), options)
            .unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let listener: Arc<dyn ResultListener> = Arc::new(move |outcome: ResolutionOutcome| {
            let _ = tx.send(outcome);
        });
        resolver.start(listener).unwrap();
        (resolver, rx)
    }

    fn addrs(outcome: &ResolutionOutcome) -> Vec<String> {
        outcome
            .addresses()
            .expect("resolved outcome")
            .iter()
            .map(|r| r.to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_port() {
        let lookup = MockLookup::new(two_hosts);
        let (_resolver, mut rx) = start("dns:///example.test:1234", lookup);

        let outcome = rx.recv().await.unwrap();
        assert_eq!(addrs(&outcome), vec!["10.0.0.1:1234", "10.0.0.2:1234"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_port() {
        let lookup = MockLookup::new(one_host);
        let (_resolver, mut rx) = start("dns:///example.test", lookup);

        let outcome = rx.recv().await.unwrap();
        assert_eq!(addrs(&outcome), vec!["10.0.0.1:443"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_host_skips_lookup() {
        let lookup = MockLookup::new(one_host);
        let (_resolver, mut rx) = start("dns:///", lookup.clone());

        let outcome = rx.recv().await.unwrap();
        let status = outcome.status().expect("failed outcome");
        assert_eq!(status.code, StatusCode::InvalidArgument);
        assert!(status.message.contains("Invalid target"));
        assert!(lookup.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_error_is_unavailable() {
        let lookup = MockLookup::new(unreachable);
        let (_resolver, mut rx) = start("dns:///example.test", lookup);

        let outcome = rx.recv().await.unwrap();
        let status = outcome.status().expect("failed outcome");
        assert_eq!(status.code, StatusCode::Unavailable);
        assert!(status.message.contains("example.test"));

        let cause = status.cause.as_ref().expect("cause attached");
        match cause.downcast_ref::<LookupError>() {
            Some(LookupError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NetworkUnreachable),
            other => panic!("unexpected cause: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_answer_is_failure() {
        let lookup = MockLookup::new(no_hosts);
        let (_resolver, mut rx) = start("dns:///example.test", lookup);

        let outcome = rx.recv().await.unwrap();
        assert!(!outcome.is_resolved());
        assert_eq!(outcome.status().unwrap().code, StatusCode::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_are_rate_limited_and_coalesced() {
        let lookup = MockLookup::slow(one_host, Duration::from_secs(5));
        let (resolver, mut rx) = start("dns:///example.test", lookup.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        resolver.refresh();
        tokio::time::sleep(Duration::from_secs(1)).await;
        resolver.refresh();

        assert!(rx.recv().await.unwrap().is_resolved());
        assert!(rx.recv().await.unwrap().is_resolved());
        tokio::time::sleep(Duration::from_secs(60)).await;

        let calls = lookup.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1] - calls[0] >= Duration::from_secs(15));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_refreshes_are_not_delayed() {
        let lookup = MockLookup::new(one_host);
        let (resolver, mut rx) = start("dns:///example.test", lookup.clone());
        rx.recv().await.unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        let requested = Instant::now();
        resolver.refresh();
        rx.recv().await.unwrap();

        let calls = lookup.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], requested);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_during_rate_limit_delay() {
        let lookup = MockLookup::new(one_host);
        let (resolver, mut rx) = start("dns:///example.test", lookup.clone());
        rx.recv().await.unwrap();

        resolver.refresh();
        tokio::time::sleep(Duration::from_secs(5)).await;
        resolver.dispose();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(lookup.calls().len(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_during_lookup() {
        let lookup = MockLookup::slow(one_host, Duration::from_secs(10));
        let (resolver, mut rx) = start("dns:///example.test", lookup.clone());

        tokio::time::sleep(Duration::from_secs(2)).await;
        resolver.dispose();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(lookup.calls().len(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_outpaces_short_refresh_interval() {
        let lookup = MockLookup::new(one_host);
        let options =
            ResolverOptions::default().with_refresh_interval(Some(Duration::from_secs(10)));
        let factory = DnsResolverFactory::with_lookup(lookup.clone());
        let (_resolver, _rx) = start_with("dns:///example.test", factory, &options);

        tokio::time::sleep(Duration::from_secs(70)).await;

        let calls = lookup.calls();
        assert!(calls.len() >= 4, "only {} lookups", calls.len());
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(15));
        }
    }

    #[tokio::test]
    async fn test_default_factory_resolves_ip_literal() {
        let options = ResolverOptions::default().with_refresh_interval(None);
        let (_resolver, mut rx) =
            start_with("dns:///127.0.0.1:8080", DnsResolverFactory::new(), &options);

        let outcome = rx.recv().await.unwrap();
        assert_eq!(addrs(&outcome), vec!["127.0.0.1:8080"]);
    }

    #[test]
    fn test_factory_rejects_bad_port() {
        let factory = DnsResolverFactory::with_lookup(MockLookup::new(one_host));
        let err = factory
            .create(
                &Url::parse("dns:///example.test:99999").unwrap(),
                &ResolverOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidTarget(_)));
    }
}
