use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Registry, opts, register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_vec_with_registry,
    register_int_gauge_with_registry,
};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

trait ResultExt<T> {
    fn or_exit(self, context: &str) -> T;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn or_exit(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                eprintln!("failed to initialize metric ({context}): {err}");
                std::process::exit(1);
            }
        }
    }
}

pub static RUNTIME: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram_with_registry!(
        HistogramOpts::new("tlspulse_runtime", "batch latency in seconds"),
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "tlspulse_probes_in_flight",
        "Probes currently holding a concurrency slot",
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static ATTEMPTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!("tlspulse_attempts_total", "Total probe attempts by status"),
        &["status"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static HOSTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "tlspulse_hosts_total",
            "Total host outcomes (after retries) by status"
        ),
        &["status"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!("tlspulse_errors_total", "Total attempt errors by type"),
        &["error_type"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

// TLS-specific metrics
pub static TLS_HANDSHAKE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram_with_registry!(
        HistogramOpts::new(
            "tlspulse_tls_handshake_duration_seconds",
            "TCP connect plus TLS handshake duration in seconds"
        ),
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static TLS_INFO: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        opts!(
            "tlspulse_tls_info",
            "TLS connection info (version, cipher) - value is always 1"
        ),
        &["hostname", "version", "cipher"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static TLS_CERT_EXPIRY_DAYS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        opts!(
            "tlspulse_tls_cert_expiry_days",
            "Days until TLS certificate expiration (negative if expired)"
        ),
        &["hostname"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static TLS_AUTHORIZED: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        opts!(
            "tlspulse_tls_authorized",
            "1 if the peer certificate passed verification"
        ),
        &["hostname"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static HOST_UP: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        opts!("tlspulse_host_up", "1 ok, 0 error"),
        &["hostname"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static LAST_SUCCESS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        opts!(
            "tlspulse_last_success_timestamp_seconds",
            "Unix timestamp of last successful check"
        ),
        &["hostname"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static PANICS_RECOVERED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter_with_registry!(
        opts!(
            "tlspulse_panics_recovered_total",
            "Total panics recovered from"
        ),
        &REGISTRY
    )
    .or_exit("metric can be created")
});

/// Encode and return metrics for HTTP export
///
/// # Errors
///
/// Returns an error if metrics encoding fails
pub fn encode_metrics() -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();

    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| format!("could not encode custom metrics: {e}"))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_metrics_labels() {
        ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
        HOSTS_TOTAL.with_label_values(&["error"]).inc();
        ERRORS.with_label_values(&["dns_timeout"]).inc();
        TLS_INFO
            .with_label_values(&["example.com", "TLSv1.3", "TLS13_AES_256_GCM_SHA384"])
            .set(1);
        TLS_CERT_EXPIRY_DAYS
            .with_label_values(&["example.com"])
            .set(90);
        TLS_AUTHORIZED.with_label_values(&["example.com"]).set(1);
        HOST_UP.with_label_values(&["example.com"]).set(1);
        LAST_SUCCESS
            .with_label_values(&["example.com"])
            .set(1_234_567_890);
    }

    #[test]
    fn test_histogram_metrics() {
        RUNTIME.start_timer().observe_duration();
        TLS_HANDSHAKE_DURATION.observe(0.05);
    }

    #[test]
    fn test_encode_metrics() {
        // Initialize at least one metric to ensure non-empty output
        PANICS_RECOVERED.inc();

        let buffer = encode_metrics().unwrap();
        assert!(!buffer.is_empty());

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("tlspulse_panics_recovered_total"));
    }

    #[test]
    fn test_registry() {
        let _ = &*RUNTIME;
        let _ = &*IN_FLIGHT;
        ERRORS.with_label_values(&["connect"]).inc();

        let metric_names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|m| m.name().to_string())
            .collect();

        assert!(metric_names.contains(&"tlspulse_runtime".to_string()));
        assert!(metric_names.contains(&"tlspulse_probes_in_flight".to_string()));
        assert!(metric_names.contains(&"tlspulse_errors_total".to_string()));
    }
}
