//! Resilience configuration with builder pattern
//!
//! Covers the knobs the client has over its own behaviour: request timeouts,
//! how many deletes may be in flight at once, and request logging. Failed
//! calls are never retried.

use std::time::Duration;

/// Global resilience configuration for API operations
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Upper bound for a whole request, including reading the body
    pub request_timeout: Duration,
    /// Upper bound for establishing the TCP/TLS connection
    pub connect_timeout: Duration,
    pub concurrency: ConcurrencyConfig,
    pub monitoring: MonitoringConfig,
}

/// Fan-out for per-record deletes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyConfig {
    /// Maximum deletes in flight at the same time
    pub max_concurrent_deletes: usize,
    /// When disabled, deletes run strictly one after another
    pub enabled: bool,
}

/// Request logging configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Log every outgoing request as an operation line
    pub request_logging: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            concurrency: ConcurrencyConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self::sequential()
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
        }
    }
}

impl ConcurrencyConfig {
    /// One delete at a time
    pub fn sequential() -> Self {
        Self {
            max_concurrent_deletes: 1,
            enabled: false,
        }
    }

    /// Up to `max` deletes in flight; `max <= 1` is the same as [`ConcurrencyConfig::sequential`]
    pub fn bounded(max: usize) -> Self {
        if max <= 1 {
            return Self::sequential();
        }
        Self {
            max_concurrent_deletes: max,
            enabled: true,
        }
    }

    /// Effective number of deletes allowed in flight
    pub fn fan_out(&self) -> usize {
        if self.enabled {
            self.max_concurrent_deletes.max(1)
        } else {
            1
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Short timeouts and no request logging, for tests against local servers
    pub fn testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            concurrency: ConcurrencyConfig::sequential(),
            monitoring: MonitoringConfig {
                request_logging: false,
            },
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Set the whole-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Configure delete fan-out
    pub fn concurrency_config(mut self, concurrency: ConcurrencyConfig) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Enable/disable request logging
    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
