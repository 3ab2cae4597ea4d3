use thiserror::Error;

/// Configuration and lifecycle errors, surfaced synchronously to the caller.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Invalid target URI '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("No resolver registered for scheme '{0}'")]
    UnknownScheme(String),

    #[error("A resolver is already registered for scheme '{0}'")]
    DuplicateScheme(String),

    #[error("Invalid resolver state: {0}")]
    InvalidState(String),
}

/// Failure of a single hostname lookup.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("DNS lookup failed: {0}")]
    Resolve(#[from] hickory_resolver::error::ResolveError),

    #[error("DNS lookup failed: {0}")]
    Io(#[from] std::io::Error),
}

impl LookupError {
    /// Whether the lookup gave up waiting on the upstream service.
    pub fn is_timeout(&self) -> bool {
        match self {
            LookupError::Resolve(e) => matches!(
                e.kind(),
                hickory_resolver::error::ResolveErrorKind::Timeout
            ),
            LookupError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
        }
    }
}
