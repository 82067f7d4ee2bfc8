//! Instrumentation configuration
//!
//! Provides a builder-pattern configuration for the RED wrapper.

use crate::error::{RedError, Result};
use crate::metrics::{default_duration_buckets, DEFAULT_METRICS_PATH};
use crate::parse::{parse_bool, parse_buckets};
use std::net::SocketAddr;
use tracing::warn;

/// Configuration for request instrumentation.
///
/// # Example
///
/// ```
/// use redmetrics::RedConfig;
///
/// let config = RedConfig::builder()
///     .hostname("web-1")
///     .program("checkout")
///     .duration_buckets(vec![5.0, 50.0, 500.0])
///     .build();
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RedConfig {
    /// Hostname label override. `None` uses the OS hostname.
    pub hostname: Option<String>,

    /// Program label override. `None` uses the executable name.
    pub program: Option<String>,

    /// Path of the scrape endpoint.
    pub metrics_path: String,

    /// Mount the scrape endpoint on frameworked applications.
    /// Disable when serving scrapes from a separate listener.
    pub mount_metrics_route: bool,

    /// Duration histogram buckets in milliseconds.
    pub duration_buckets: Vec<f64>,

    /// Address of a standalone scrape listener, if any.
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for RedConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            program: None,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            mount_metrics_route: true,
            duration_buckets: default_duration_buckets(),
            metrics_listen: None,
        }
    }
}

impl RedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RED_HOSTNAME`: hostname label (default: OS hostname)
    /// - `RED_PROGRAM`: program label (default: executable name)
    /// - `RED_METRICS_PATH`: scrape path (default: "/metrics")
    /// - `RED_MOUNT_METRICS_ROUTE`: "true"/"false" (default: "true")
    /// - `RED_DURATION_BUCKETS`: comma-separated milliseconds (default: geometric latency bins)
    /// - `RED_METRICS_LISTEN`: standalone scrape address, e.g. "0.0.0.0:9090" (default: none)
    ///
    /// Unparseable values are logged and replaced by their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let hostname = lookup("RED_HOSTNAME").filter(|s| !s.is_empty());
        let program = lookup("RED_PROGRAM").filter(|s| !s.is_empty());

        let metrics_path = lookup("RED_METRICS_PATH")
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.metrics_path);

        let mount_metrics_route = match lookup("RED_MOUNT_METRICS_ROUTE") {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Invalid RED_MOUNT_METRICS_ROUTE, using default");
                defaults.mount_metrics_route
            }),
            None => defaults.mount_metrics_route,
        };

        let duration_buckets = match lookup("RED_DURATION_BUCKETS") {
            Some(raw) => match parse_buckets(&raw) {
                Some(buckets) if !buckets.is_empty() => buckets,
                _ => {
                    warn!(value = %raw, "Invalid RED_DURATION_BUCKETS, using default buckets");
                    defaults.duration_buckets
                }
            },
            None => defaults.duration_buckets,
        };

        let metrics_listen = lookup("RED_METRICS_LISTEN").and_then(|raw| match raw.parse() {
            Ok(addr) => Some(addr),
            Err(e) => {
                warn!(value = %raw, error = %e, "Invalid RED_METRICS_LISTEN, standalone listener disabled");
                None
            }
        });

        Self {
            hostname,
            program,
            metrics_path,
            mount_metrics_route,
            duration_buckets,
            metrics_listen,
        }
    }

    /// Create a new builder for programmatic configuration.
    pub fn builder() -> RedConfigBuilder {
        RedConfigBuilder::default()
    }

    /// Check the configuration for values the wrapper cannot use.
    pub fn validate(&self) -> Result<()> {
        if !self.metrics_path.starts_with('/') {
            return Err(RedError::InvalidConfig(format!(
                "metrics path must start with '/': {}",
                self.metrics_path
            )));
        }

        if self.duration_buckets.is_empty() {
            return Err(RedError::InvalidConfig(
                "duration buckets must not be empty".to_string(),
            ));
        }

        if self.duration_buckets.iter().any(|b| !b.is_finite()) {
            return Err(RedError::InvalidConfig(
                "duration buckets must be finite".to_string(),
            ));
        }

        if self.duration_buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RedError::InvalidConfig(
                "duration buckets must be strictly increasing".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for RedConfig
#[derive(Debug, Clone, Default)]
pub struct RedConfigBuilder {
    config: RedConfig,
}

impl RedConfigBuilder {
    /// Override the hostname label.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.config.hostname = Some(hostname.into());
        self
    }

    /// Override the program label.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.config.program = Some(program.into());
        self
    }

    /// Set the scrape endpoint path.
    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.config.metrics_path = path.into();
        self
    }

    /// Do not mount the scrape endpoint on the instrumented application.
    pub fn without_metrics_route(mut self) -> Self {
        self.config.mount_metrics_route = false;
        self
    }

    /// Set duration histogram buckets in milliseconds.
    pub fn duration_buckets(mut self, buckets: Vec<f64>) -> Self {
        self.config.duration_buckets = buckets;
        self
    }

    /// Serve scrapes from a standalone listener.
    pub fn metrics_listen(mut self, addr: SocketAddr) -> Self {
        self.config.metrics_listen = Some(addr);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RedConfig {
        self.config
    }
}
