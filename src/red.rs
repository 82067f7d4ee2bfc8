//! Instrumentation entry point
//!
//! [`RedMetrics`] bundles everything the wrapper needs at construction: the
//! registry handle, the process identity and the optional grouper override.

use crate::adapter::{AdapterSelector, Instrumented};
use crate::config::RedConfig;
use crate::error::Result;
use crate::metrics::{MetricRegistry, MetricsHandle, MetricsServer};
use crate::middleware::{Grouper, RedLayer};
use crate::process::ProcessIdentity;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared instrumentation state.
///
/// # Example
///
/// ```
/// use axum::{routing::get, Router};
/// use redmetrics::{RedConfig, RedMetrics};
///
/// let red = RedMetrics::from_config(&RedConfig::default()).unwrap();
/// let app: Router = Router::new().route("/name/{name}", get(|| async { "hello" }));
/// let service = red.instrument(app).unwrap();
/// assert_eq!(service.adapter(), "axum");
/// ```
#[derive(Debug, Clone)]
pub struct RedMetrics {
    handle: MetricsHandle,
    identity: ProcessIdentity,
    metrics_path: String,
    mount_metrics_route: bool,
    metrics_listen: Option<SocketAddr>,
    grouper: Option<Grouper>,
}

impl RedMetrics {
    /// Record into an existing registry.
    ///
    /// The registry should contain the RED metrics; see
    /// [`MetricRegistryBuilder::with_red_metrics`](crate::metrics::MetricRegistryBuilder::with_red_metrics).
    pub fn new(registry: Arc<MetricRegistry>, config: &RedConfig) -> Self {
        Self {
            handle: MetricsHandle::new(registry),
            identity: ProcessIdentity::with_overrides(
                config.hostname.as_deref(),
                config.program.as_deref(),
            ),
            metrics_path: config.metrics_path.clone(),
            mount_metrics_route: config.mount_metrics_route,
            metrics_listen: config.metrics_listen,
            grouper: None,
        }
    }

    /// Validate `config` and build a fresh registry from it.
    pub fn from_config(config: &RedConfig) -> Result<Self> {
        config.validate()?;

        let registry = MetricRegistry::builder()
            .with_red_metrics_buckets(&config.duration_buckets)
            .build();

        Ok(Self::new(Arc::new(registry), config))
    }

    /// Use `grouper` instead of the adapter's default.
    pub fn with_grouper(mut self, grouper: Grouper) -> Self {
        self.grouper = Some(grouper);
        self
    }

    /// Registry observations are recorded into.
    pub fn registry(&self) -> &Arc<MetricRegistry> {
        self.handle.registry()
    }

    /// Recording handle.
    pub fn handle(&self) -> &MetricsHandle {
        &self.handle
    }

    /// Hostname and program labels.
    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    /// Path of the scrape endpoint.
    pub fn metrics_path(&self) -> &str {
        &self.metrics_path
    }

    /// Whether adapters mount the scrape endpoint on the application.
    pub fn mount_metrics_route(&self) -> bool {
        self.mount_metrics_route
    }

    /// Wrapper layer, grouping with the override or else `default_grouper`.
    pub fn layer(&self, default_grouper: Grouper) -> RedLayer {
        RedLayer::new(
            self.handle.clone(),
            self.identity.clone(),
            self.grouper.clone().unwrap_or(default_grouper),
        )
    }

    /// Instrument `app` with the default adapters.
    ///
    /// # Errors
    ///
    /// [`RedError::UnsupportedApplicationType`](crate::RedError::UnsupportedApplicationType)
    /// when `app` is neither an axum `Router` nor a [`Handler`](crate::Handler).
    pub fn instrument<T: Any + Send>(&self, app: T) -> Result<Instrumented> {
        AdapterSelector::with_defaults().select(app, self)
    }

    /// Bind the standalone scrape listener, if one is configured.
    pub async fn bind_metrics_server(&self) -> Result<Option<MetricsServer>> {
        match self.metrics_listen {
            Some(addr) => {
                let server =
                    MetricsServer::bind(addr, self.registry().clone(), &self.metrics_path).await?;
                Ok(Some(server))
            }
            None => Ok(None),
        }
    }
}
