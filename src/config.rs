use std::time::Duration;

use crate::ClientError;

/// Client configuration.
///
/// Construct with [`Config::default`] for sensible defaults, or [`Config::builder`] for
/// ergonomic overrides.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deadline for synchronous commands, and for individual frame writes.
    pub request_timeout: Duration,
    /// Channels whose name starts with this prefix require `OnPrivateSub` signing.
    pub private_channel_prefix: String,
    /// Enables verbose (`debug`-level) logging of wire traffic.
    pub debug: bool,
    /// Capacity of the bounded outbound (write) queue.
    pub send_queue_capacity: usize,
    /// Capacity of the bounded inbound (read) queue.
    pub recv_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(1),
            private_channel_prefix: "$".to_string(),
            debug: false,
            send_queue_capacity: 64,
            recv_queue_capacity: 64,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`]. `build()` validates queue capacities are non-zero.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    inner: ConfigOverrides,
}

#[derive(Debug, Default)]
struct ConfigOverrides {
    request_timeout: Option<Duration>,
    private_channel_prefix: Option<String>,
    debug: Option<bool>,
    send_queue_capacity: Option<usize>,
    recv_queue_capacity: Option<usize>,
}

impl ConfigBuilder {
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.inner.request_timeout = Some(timeout);
        self
    }

    pub fn private_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner.private_channel_prefix = Some(prefix.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.inner.debug = Some(debug);
        self
    }

    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.inner.send_queue_capacity = Some(capacity);
        self
    }

    pub fn recv_queue_capacity(mut self, capacity: usize) -> Self {
        self.inner.recv_queue_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> Result<Config, crate::ClientError> {
        let defaults = Config::default();
        let send_queue_capacity =
            self.inner.send_queue_capacity.unwrap_or(defaults.send_queue_capacity);
        let recv_queue_capacity =
            self.inner.recv_queue_capacity.unwrap_or(defaults.recv_queue_capacity);

        if send_queue_capacity == 0 {
            return Err(crate::ClientError::Config("send_queue_capacity must be non-zero".into()));
        }
        if recv_queue_capacity == 0 {
            return Err(crate::ClientError::Config("recv_queue_capacity must be non-zero".into()));
        }

        Ok(Config {
            request_timeout: self.inner.request_timeout.unwrap_or(defaults.request_timeout),
            private_channel_prefix: self
                .inner
                .private_channel_prefix
                .unwrap_or(defaults.private_channel_prefix),
            debug: self.inner.debug.unwrap_or(defaults.debug),
            send_queue_capacity,
            recv_queue_capacity,
        })
    }
}
