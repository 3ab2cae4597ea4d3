use crate::error::ResolverError;
use serde::Serialize;
use std::{
    collections::HashMap,
    error::Error as StdError,
    fmt,
    net::{IpAddr, SocketAddr},
    ops::Deref,
    sync::Arc,
};
use url::Url;

/// A resolved backend endpoint.
///
/// Attributes are opaque metadata passed through to the load balancer.
/// Two records are equal when their socket addresses are equal.
#[derive(Debug, Clone, Serialize)]
pub struct AddressRecord {
    addr: SocketAddr,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, serde_json::Value>,
}

impl AddressRecord {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn address(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn attributes(&self) -> &HashMap<String, serde_json::Value> {
        &self.attributes
    }
}

impl PartialEq for AddressRecord {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for AddressRecord {}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}

/// Returned when building an [`AddressList`] from no addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyAddressList;

/// A non-empty, ordered sequence of addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AddressList(Vec<AddressRecord>);

impl TryFrom<Vec<AddressRecord>> for AddressList {
    type Error = EmptyAddressList;

    fn try_from(addresses: Vec<AddressRecord>) -> Result<Self, Self::Error> {
        if addresses.is_empty() {
            Err(EmptyAddressList)
        } else {
            Ok(Self(addresses))
        }
    }
}

impl Deref for AddressList {
    type Target = [AddressRecord];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a AddressList {
    type Item = &'a AddressRecord;
    type IntoIter = std::slice::Iter<'a, AddressRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Category of a failed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// The target itself is unusable.
    InvalidArgument,
    /// The upstream service failed or returned nothing.
    Unavailable,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::Unavailable => "UNAVAILABLE",
        }
    }
}

/// Structured failure reported to the listener.
#[derive(Debug, Clone)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
    pub cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

/// Result of one resolution attempt.
#[derive(Debug, Clone)]
pub enum ResolutionOutcome {
    Resolved(AddressList),
    Failed(Status),
}

impl ResolutionOutcome {
    /// Builds a `Resolved` outcome, or a `Failed` one when nothing was found.
    pub fn from_addresses(addresses: Vec<AddressRecord>, host: &str) -> Self {
        match AddressList::try_from(addresses) {
            Ok(list) => ResolutionOutcome::Resolved(list),
            Err(EmptyAddressList) => ResolutionOutcome::Failed(Status::new(
                StatusCode::Unavailable,
                format!("No addresses found for '{}'", host),
            )),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(_))
    }

    pub fn addresses(&self) -> Option<&AddressList> {
        match self {
            ResolutionOutcome::Resolved(list) => Some(list),
            ResolutionOutcome::Failed(_) => None,
        }
    }

    pub fn status(&self) -> Option<&Status> {
        match self {
            ResolutionOutcome::Resolved(_) => None,
            ResolutionOutcome::Failed(status) => Some(status),
        }
    }
}

/// Parsed `scheme:[//authority/]host[:port]` target.
///
/// Host and port come from the path, never the authority. The host may be
/// empty; resolvers reject that when they run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverTarget {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl ResolverTarget {
    pub fn from_url(url: &Url, default_port: u16) -> Result<Self, ResolverError> {
        let path = url.path().trim_start_matches('/');
        let (host, port) = split_host_port(path)?;
        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port: port.unwrap_or(default_port),
        })
    }

    pub fn parse(target: &str, default_port: u16) -> Result<Self, ResolverError> {
        let url = Url::parse(target).map_err(|source| ResolverError::InvalidUri {
            uri: target.to_string(),
            source,
        })?;
        Self::from_url(&url, default_port)
    }
}

fn split_host_port(value: &str) -> Result<(&str, Option<u16>), ResolverError> {
    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| ResolverError::InvalidTarget(format!("unclosed '[' in '{}'", value)))?;
        match after {
            "" => (host, None),
            _ => match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => {
                    return Err(ResolverError::InvalidTarget(format!(
                        "unexpected '{}' after IPv6 address",
                        after
                    )))
                }
            },
        }
    } else {
        match value.rsplit_once(':') {
            // A bare IPv6 literal has more than one colon and no port.
            Some((host, port)) if !host.contains(':') => (host, Some(port)),
            _ => (value, None),
        }
    };

    let port = port
        .map(|p| {
            p.parse::<u16>()
                .map_err(|_| ResolverError::InvalidTarget(format!("invalid port '{}'", p)))
        })
        .transpose()?;
    Ok((host, port))
}
