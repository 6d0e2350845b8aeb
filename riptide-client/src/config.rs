//! Client configuration.
//!
//! All knobs are supplied by the embedding layer and passed through
//! opaquely; the engine itself has no environment or on-disk configuration.

use std::time::Duration;

/// Options for constructing a client.
///
/// ## Usage
///
/// ```ignore
/// let options = ClientOptions::builder()
///     .seed_endpoints(["10.0.0.1:2379", "10.0.0.2:2379"])
///     .rpc_timeout(Duration::from_secs(5))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    seed_endpoints: Vec<String>,
    rpc_timeout: Duration,
    retry_interval: Duration,
    fast_path: bool,
}

impl ClientOptions {
    /// Start building client options.
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder {
            seed_endpoints: Vec::new(),
            rpc_timeout: None,
            retry_interval: None,
            fast_path: None,
        }
    }

    /// Addresses used to discover the cluster at startup.
    pub fn seed_endpoints(&self) -> &[String] {
        &self.seed_endpoints
    }

    /// Deadline applied to every outbound RPC.
    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    /// Pause between discovery or retry attempts.
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Whether proposes race the fast path by default.
    pub fn fast_path(&self) -> bool {
        self.fast_path
    }
}

/// Builder for [`ClientOptions`].
#[derive(Debug)]
pub struct ClientOptionsBuilder {
    seed_endpoints: Vec<String>,
    rpc_timeout: Option<Duration>,
    retry_interval: Option<Duration>,
    fast_path: Option<bool>,
}

impl ClientOptionsBuilder {
    /// Set the seed endpoints used for cluster discovery.
    pub fn seed_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seed_endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-RPC deadline (default: 10s).
    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = Some(timeout);
        self
    }

    /// Set the pause between retry attempts (default: 50ms).
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    /// Set whether proposes use the fast path by default (default: true).
    pub fn fast_path(mut self, enabled: bool) -> Self {
        self.fast_path = Some(enabled);
        self
    }

    /// Build the options.
    ///
    /// # Errors
    ///
    /// Returns an error if no seed endpoint was provided or a zero
    /// duration was configured.
    pub fn build(self) -> Result<ClientOptions, ConfigError> {
        if self.seed_endpoints.is_empty() {
            return Err(ConfigError::MissingSeedEndpoints);
        }
        let rpc_timeout = self.rpc_timeout.unwrap_or(Duration::from_secs(10));
        let retry_interval = self.retry_interval.unwrap_or(Duration::from_millis(50));
        if rpc_timeout.is_zero() || retry_interval.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        Ok(ClientOptions {
            seed_endpoints: self.seed_endpoints,
            rpc_timeout,
            retry_interval,
            fast_path: self.fast_path.unwrap_or(true),
        })
    }
}

/// Errors from building [`ClientOptions`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No seed endpoint was provided.
    #[error("client options require at least one seed endpoint")]
    MissingSeedEndpoints,

    /// A timeout or interval was configured as zero.
    #[error("timeouts and intervals must be non-zero")]
    ZeroDuration,
}
