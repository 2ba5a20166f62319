//! Per-host probing with retries.
//!
//! One attempt is resolve, connect, read the certificate and metadata, then
//! close. `retry` repeats attempts that failed for a retryable reason until
//! the attempt budget runs out.

use crate::{
    config::ProbeConfig,
    error::ProbeError,
    metrics::{ATTEMPTS_TOTAL, ERRORS},
    resolver::{DnsResolver, Resolve},
    tls::{CertificateInfo, Connect, SecureConnector, Session, TlsMetadata},
};
use chrono::{DateTime, Utc};
use std::{future::Future, net::IpAddr, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, warn};

/// What a successful probe learned about a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub ip: IpAddr,
    pub tls: TlsMetadata,
    pub certificate: CertificateInfo,
    pub checked_at: DateTime<Utc>,
}

/// Run `operation` up to `attempts` times.
///
/// The operation receives the 1-based attempt number. A retryable failure
/// with attempts left waits `delay` and tries again; any other failure, or
/// the failure of the last attempt, is returned as is. `attempts` below one
/// still runs the operation once.
///
/// # Errors
///
/// Returns the error of the last attempt made
pub async fn retry<T, F, Fut>(
    attempts: u32,
    delay: Duration,
    mut operation: F,
) -> Result<T, ProbeError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProbeError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < attempts => {
                warn!(attempt, attempts, error = %err, "attempt failed, retrying");
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Probes hosts with a resolver and a connector sharing one configuration
#[derive(Debug)]
pub struct Prober<R, C> {
    config: Arc<ProbeConfig>,
    resolver: R,
    connector: C,
}

impl Prober<DnsResolver, SecureConnector> {
    /// Prober backed by the system resolver and rustls
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::ConfigValidation` if the CA bundle cannot be used
    pub async fn system(config: Arc<ProbeConfig>) -> Result<Self, ProbeError> {
        let resolver = DnsResolver::new(config.dns_timeout());
        let connector = SecureConnector::from_config(&config).await?;
        Ok(Self::new(config, resolver, connector))
    }
}

impl<R, C> Prober<R, C>
where
    R: Resolve,
    C: Connect,
{
    #[must_use]
    pub const fn new(config: Arc<ProbeConfig>, resolver: R, connector: C) -> Self {
        Self {
            config,
            resolver,
            connector,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe `hostname`, retrying per the configuration
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt once every attempt has failed
    pub async fn probe(&self, hostname: &str) -> Result<HostReport, ProbeError> {
        retry(
            self.config.max_attempts(),
            self.config.retry_delay(),
            |attempt| self.attempt(hostname, attempt),
        )
        .await
    }

    async fn attempt(&self, hostname: &str, attempt: u32) -> Result<HostReport, ProbeError> {
        let result = self.connect_and_inspect(hostname).await;

        match &result {
            Ok(report) => {
                ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
                debug!(hostname, attempt, ip = %report.ip, "attempt succeeded");
            }
            Err(err) => {
                ATTEMPTS_TOTAL.with_label_values(&["error"]).inc();
                ERRORS.with_label_values(&[err.kind()]).inc();
                debug!(hostname, attempt, error = %err, "attempt failed");
            }
        }

        result
    }

    async fn connect_and_inspect(&self, hostname: &str) -> Result<HostReport, ProbeError> {
        let ip = self.resolver.resolve(hostname).await?;
        let session = self.connector.connect(hostname, ip).await?;

        let certificate = session.certificate();
        let tls = session.metadata();
        session.close().await;

        Ok(HostReport {
            ip,
            tls,
            certificate: certificate?,
            checked_at: Utc::now(),
        })
    }
}
