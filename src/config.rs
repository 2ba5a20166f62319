use crate::error::ProbeError;
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_DNS_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

/// User supplied overrides, every field optional
#[derive(Debug, Clone, Default)]
pub struct ProbeOptions {
    /// Connect + handshake timeout in milliseconds
    pub timeout: Option<u64>,
    pub port: Option<u16>,
    /// Reject peers whose certificate does not verify
    pub verify: Option<bool>,
    pub concurrency: Option<usize>,
    /// DNS lookup timeout in milliseconds
    pub dns_timeout: Option<u64>,
    pub retries: Option<u32>,
    /// Fixed delay between attempts in milliseconds
    pub retry_delay: Option<u64>,
    /// Extra PEM bundle added to the trusted roots
    pub ca_file: Option<PathBuf>,
}

/// Validated probe configuration, read-only once built
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    connect_timeout: Duration,
    dns_timeout: Duration,
    port: u16,
    verify_certificate: bool,
    concurrency: usize,
    retries: u32,
    retry_delay: Duration,
    ca_file: Option<PathBuf>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            dns_timeout: Duration::from_millis(DEFAULT_DNS_TIMEOUT_MS),
            port: DEFAULT_PORT,
            verify_certificate: false,
            concurrency: DEFAULT_CONCURRENCY,
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            ca_file: None,
        }
    }
}

impl ProbeConfig {
    /// Apply `options` on top of the defaults and validate the result
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::ConfigValidation` naming the first field that is
    /// zero where a positive number is required
    pub fn from_options(options: ProbeOptions) -> Result<Self, ProbeError> {
        let defaults = Self::default();

        let timeout = options.timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS);
        if timeout == 0 {
            return Err(ProbeError::not_positive("timeout"));
        }

        let port = options.port.unwrap_or(defaults.port);
        if port == 0 {
            return Err(ProbeError::not_positive("port"));
        }

        let concurrency = options.concurrency.unwrap_or(defaults.concurrency);
        if concurrency == 0 {
            return Err(ProbeError::not_positive("concurrency"));
        }

        let dns_timeout = options.dns_timeout.unwrap_or(DEFAULT_DNS_TIMEOUT_MS);
        if dns_timeout == 0 {
            return Err(ProbeError::not_positive("dnsTimeout"));
        }

        Ok(Self {
            connect_timeout: Duration::from_millis(timeout),
            dns_timeout: Duration::from_millis(dns_timeout),
            port,
            verify_certificate: options.verify.unwrap_or(defaults.verify_certificate),
            concurrency,
            retries: options.retries.unwrap_or(defaults.retries),
            retry_delay: options
                .retry_delay
                .map_or(defaults.retry_delay, Duration::from_millis),
            ca_file: options.ca_file,
        })
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub const fn dns_timeout(&self) -> Duration {
        self.dns_timeout
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub const fn verify_certificate(&self) -> bool {
        self.verify_certificate
    }

    /// Maximum number of probes in flight
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// Total attempts per host, the first try plus every retry
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    #[must_use]
    pub fn ca_file(&self) -> Option<&std::path::Path> {
        self.ca_file.as_deref()
    }
}
