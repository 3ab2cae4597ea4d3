use crate::infra::{Clock, SystemClock};
use std::{env, fmt, sync::Arc, time::Duration};

/// Default cadence of periodic re-resolution.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Port used when the target does not name one.
pub const DEFAULT_PORT: u16 = 443;

/// Options handed to every resolver factory.
#[derive(Clone)]
pub struct ResolverOptions {
    /// `None` disables periodic refresh.
    pub refresh_interval: Option<Duration>,
    pub default_port: u16,
    pub clock: Arc<dyn Clock>,
}

impl ResolverOptions {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            refresh_interval: env::var("RESOLVER_REFRESH_INTERVAL_SECS")
                .ok()
                .and_then(|v| parse_refresh_interval(&v))
                .unwrap_or(defaults.refresh_interval),
            default_port: env::var("RESOLVER_DEFAULT_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.default_port),
            clock: defaults.clock,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Some(DEFAULT_REFRESH_INTERVAL),
            default_port: DEFAULT_PORT,
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for ResolverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverOptions")
            .field("refresh_interval", &self.refresh_interval)
            .field("default_port", &self.default_port)
            .finish_non_exhaustive()
    }
}

/// `Some(None)` for "infinite" or zero, `Some(Some(d))` for a positive
/// number of seconds, `None` when the value cannot be parsed.
fn parse_refresh_interval(value: &str) -> Option<Option<Duration>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("infinite") {
        return Some(None);
    }
    match value.parse::<u64>().ok()? {
        0 => Some(None),
        secs => Some(Some(Duration::from_secs(secs))),
    }
}
