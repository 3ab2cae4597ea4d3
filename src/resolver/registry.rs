//! Scheme-keyed selection of resolver implementations.

use super::dns::DnsResolverFactory;
use super::lifecycle::Resolver;
use crate::config::ResolverOptions;
use crate::error::ResolverError;
use std::{collections::HashMap, sync::Arc};
use url::Url;

/// Builds resolvers for one URI scheme.
pub trait ResolverFactory: Send + Sync {
    /// The scheme this factory handles, matched exactly (e.g. `"dns"`).
    fn scheme(&self) -> &str;

    /// Creates an unstarted resolver for `target`.
    fn create(&self, target: &Url, options: &ResolverOptions) -> Result<Resolver, ResolverError>;
}

/// Maps URI schemes to resolver factories.
#[derive(Default, Clone)]
pub struct ResolverRegistry {
    factories: HashMap<String, Arc<dyn ResolverFactory>>,
}

impl ResolverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the `dns` scheme registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            super::dns::DNS_SCHEME.to_string(),
            Arc::new(DnsResolverFactory::new()),
        );
        registry
    }

    /// Registers `factory` under its scheme.
    ///
    /// A second factory for the same scheme is rejected rather than replacing
    /// the first.
    pub fn register(&mut self, factory: Arc<dyn ResolverFactory>) -> Result<(), ResolverError> {
        let scheme = factory.scheme().to_string();
        if self.factories.contains_key(&scheme) {
            return Err(ResolverError::DuplicateScheme(scheme));
        }
        tracing::debug!(%scheme, "Registered resolver factory");
        self.factories.insert(scheme, factory);
        Ok(())
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.factories.contains_key(scheme)
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Parses `target` and builds a resolver with the factory for its scheme.
    pub fn create(
        &self,
        target: &str,
        options: &ResolverOptions,
    ) -> Result<Resolver, ResolverError> {
        let url = Url::parse(target).map_err(|source| ResolverError::InvalidUri {
            uri: target.to_string(),
            source,
        })?;
        let factory = self
            .factories
            .get(url.scheme())
            .ok_or_else(|| ResolverError::UnknownScheme(url.scheme().to_string()))?;
        factory.create(&url, options)
    }
}
