//! Error types for host probing.
//!
//! `ProbeError` separates the failures that belong to a single host attempt
//! (resolution, connection, certificate extraction) from the ones that make a
//! whole run impossible (bad configuration, malformed host list). Only the
//! former take part in the retry policy.

use std::{io, net::SocketAddr, time::Duration};
use thiserror::Error;

/// Why an address lookup did not produce an address
#[derive(Debug, Error)]
pub enum ResolveCause {
    /// The lookup did not answer within the DNS timeout
    #[error("DNS lookup timeout")]
    Timeout,
    /// The resolver answered with an error or without a usable address
    #[error("{0}")]
    Lookup(String),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The host list is not a list of hostnames
    #[error("Hostnames must be an array: {reason}")]
    InvalidInput { reason: String },

    #[error("DNS resolution failed for {hostname}: {cause}")]
    Resolution {
        hostname: String,
        #[source]
        cause: ResolveCause,
    },

    #[error("Connection timed out after {}ms", .after.as_millis())]
    ConnectTimeout { after: Duration },

    #[error("Connection to {address} failed: {source}")]
    Connect {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Certificate error: {reason}")]
    Certificate { reason: String },

    #[error("{field} {reason}")]
    ConfigValidation { field: &'static str, reason: String },
}

impl ProbeError {
    /// Build the validation error for a numeric field that must be above zero
    #[must_use]
    pub fn not_positive(field: &'static str) -> Self {
        Self::ConfigValidation {
            field,
            reason: "must be a positive number".to_string(),
        }
    }

    /// Whether another attempt for the same host may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Resolution { .. }
                | Self::ConnectTimeout { .. }
                | Self::Connect { .. }
                | Self::Certificate { .. }
        )
    }

    /// Short label used for the `error_type` metric
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "input",
            Self::Resolution {
                cause: ResolveCause::Timeout,
                ..
            } => "dns_timeout",
            Self::Resolution { .. } => "dns",
            Self::ConnectTimeout { .. } => "connect_timeout",
            Self::Connect { .. } => "connect",
            Self::Certificate { .. } => "certificate",
            Self::ConfigValidation { .. } => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_resolution_error_display() {
        let err = ProbeError::Resolution {
            hostname: "example.com".to_string(),
            cause: ResolveCause::Timeout,
        };
        assert_eq!(
            err.to_string(),
            "DNS resolution failed for example.com: DNS lookup timeout"
        );
        assert!(err.source().is_some());
        assert_eq!(err.kind(), "dns_timeout");
    }

    #[test]
    fn test_connect_timeout_display() {
        let err = ProbeError::ConnectTimeout {
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Connection timed out after 1500ms");
    }

    #[test]
    fn test_connect_error_display() {
        let err = ProbeError::Connect {
            address: "127.0.0.1:443".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "Connection to 127.0.0.1:443 failed: connection refused"
        );
    }

    #[test]
    fn test_config_validation_names_field() {
        let err = ProbeError::not_positive("timeout");
        assert_eq!(err.to_string(), "timeout must be a positive number");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(
            ProbeError::Resolution {
                hostname: "a".to_string(),
                cause: ResolveCause::Lookup("NXDOMAIN".to_string()),
            }
            .is_retryable()
        );
        assert!(
            ProbeError::ConnectTimeout {
                after: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(
            ProbeError::Certificate {
                reason: "no certificate".to_string()
            }
            .is_retryable()
        );
        assert!(
            !ProbeError::InvalidInput {
                reason: "not a list".to_string()
            }
            .is_retryable()
        );
    }
}
