use crate::{
    config::ProbeConfig,
    metrics::{
        HOST_UP, HOSTS_TOTAL, LAST_SUCCESS, PANICS_RECOVERED, RUNTIME, TLS_AUTHORIZED,
        TLS_CERT_EXPIRY_DAYS, TLS_INFO, encode_metrics,
    },
    probe::Prober,
    report::ScanReport,
    resolver::{DnsResolver, Resolve},
    scheduler::{HostOutcome, Scheduler},
    tls::{Connect, SecureConnector, TlsMetadata},
};
use anyhow::Context;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{Duration, Utc};
use futures::FutureExt;
use std::{collections::HashMap, net::IpAddr, sync::Arc};
use tokio::{net::TcpListener, time};
use tracing::{error, info, warn};

type SystemScheduler = Scheduler<DnsResolver, SecureConnector>;

/// Last `(version, cipher)` label pair exported per host
type TlsInfoLabels = HashMap<String, (String, String)>;

/// Probe `hostnames` once
///
/// # Errors
///
/// Returns an error if the connector cannot be built from `config`
pub async fn check(hostnames: Vec<String>, config: ProbeConfig) -> anyhow::Result<ScanReport> {
    let scheduler = system_scheduler(config).await?;
    let outcomes = scan(&scheduler, hostnames).await;
    Ok(ScanReport::from_outcomes(outcomes))
}

/// Run one batch, recording the batch runtime and host totals
pub async fn scan<R, C>(scheduler: &Scheduler<R, C>, hostnames: Vec<String>) -> Vec<HostOutcome>
where
    R: Resolve,
    C: Connect,
{
    let total = hostnames.len();
    let timer = RUNTIME.start_timer();
    let outcomes = scheduler.run_all(hostnames).await;
    let elapsed = timer.stop_and_record();

    let successful = outcomes.iter().filter(|o| o.is_success()).count();
    HOSTS_TOTAL
        .with_label_values(&["success"])
        .inc_by(u64::try_from(successful).unwrap_or(u64::MAX));
    HOSTS_TOTAL
        .with_label_values(&["error"])
        .inc_by(u64::try_from(total - successful).unwrap_or(u64::MAX));

    info!(
        total,
        successful,
        failed = total - successful,
        concurrency = scheduler.limit(),
        elapsed_seconds = elapsed,
        "scan finished"
    );

    outcomes
}

/// Start the monitoring service
///
/// # Errors
///
/// Returns an error if the service fails to start or bind to the port
pub async fn start(
    hostnames: &[String],
    config: ProbeConfig,
    interval: u16,
    listen: Option<IpAddr>,
    port: u16,
) -> anyhow::Result<()> {
    let scheduler = system_scheduler(config).await?;

    let app = Router::new().route("/metrics", get(metrics_handler));

    // Bind to socket with smart fallback
    let (listener, bind_addr) = match listen {
        Some(addr) => {
            let socket_addr = std::net::SocketAddr::new(addr, port).to_string();
            let listener = TcpListener::bind(&socket_addr)
                .await
                .with_context(|| format!("failed to bind {socket_addr}"))?;
            (listener, socket_addr)
        }
        None => {
            // Auto mode: try IPv6 first, fallback to IPv4
            if let Ok(l) = TcpListener::bind(format!("[::]:{port}")).await {
                (l, format!("[::]:{port}"))
            } else {
                let socket_addr = format!("0.0.0.0:{port}");
                let listener = TcpListener::bind(&socket_addr)
                    .await
                    .with_context(|| format!("failed to bind {socket_addr}"))?;
                (listener, socket_addr)
            }
        }
    };

    info!(
        listen = %bind_addr,
        interval,
        hosts = hostnames.len(),
        "monitoring started"
    );

    let server = axum::serve(listener, app.into_make_service());

    // The monitor loop only returns if something is badly wrong
    tokio::select! {
        result = server => {
            result.context("metrics server failed")?;
        }
        () = run_loop(&scheduler, hostnames, interval) => {
            error!("monitoring loop exited unexpectedly");
            anyhow::bail!("Monitoring loop stopped");
        }
    }

    Ok(())
}

async fn system_scheduler(config: ProbeConfig) -> anyhow::Result<SystemScheduler> {
    let prober = Prober::system(Arc::new(config))
        .await
        .context("failed to prepare the TLS connector")?;
    Ok(Scheduler::new(prober))
}

async fn metrics_handler() -> impl IntoResponse {
    match encode_metrics() {
        Ok(buffer) => (StatusCode::OK, buffer),
        Err(e) => {
            error!("{e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
        }
    }
}

#[inline]
fn remaining_sleep_duration(wait_time: Duration, runtime: Duration) -> Option<time::Duration> {
    wait_time
        .checked_sub(&runtime)
        .and_then(|remaining| remaining.to_std().ok())
        .filter(|duration| !duration.is_zero())
}

/// Export the TLS info series for a host, dropping the previous label pair
/// when version or cipher changed
fn update_tls_info_metric(hostname: &str, metadata: &TlsMetadata, last: &mut TlsInfoLabels) {
    let version = metadata.version.as_deref().unwrap_or("unknown");
    let cipher = metadata.cipher.as_deref().unwrap_or("unknown");

    if let Some((previous_version, previous_cipher)) = last.get(hostname)
        && (previous_version != version || previous_cipher != cipher)
    {
        let _ = TLS_INFO.remove_label_values(&[
            hostname,
            previous_version.as_str(),
            previous_cipher.as_str(),
        ]);
    }

    TLS_INFO
        .with_label_values(&[hostname, version, cipher])
        .set(1);

    last.insert(
        hostname.to_string(),
        (version.to_string(), cipher.to_string()),
    );
}

fn clear_tls_info_metric(hostname: &str, last: &mut TlsInfoLabels) {
    if let Some((version, cipher)) = last.remove(hostname) {
        let _ = TLS_INFO.remove_label_values(&[hostname, version.as_str(), cipher.as_str()]);
    }
}

fn record_host_metrics(outcome: &HostOutcome, last_tls_info: &mut TlsInfoLabels) {
    let hostname = outcome.hostname.as_str();

    match &outcome.result {
        Ok(report) => {
            HOST_UP.with_label_values(&[hostname]).set(1);
            LAST_SUCCESS
                .with_label_values(&[hostname])
                .set(report.checked_at.timestamp());
            TLS_CERT_EXPIRY_DAYS
                .with_label_values(&[hostname])
                .set(report.certificate.expiry_days);
            TLS_AUTHORIZED
                .with_label_values(&[hostname])
                .set(i64::from(report.tls.authorized));
            update_tls_info_metric(hostname, &report.tls, last_tls_info);
        }
        Err(e) => {
            HOST_UP.with_label_values(&[hostname]).set(0);
            clear_tls_info_metric(hostname, last_tls_info);
            warn!(hostname, error = %e, "host check failed");
        }
    }
}

async fn run_loop<R, C>(scheduler: &Scheduler<R, C>, hostnames: &[String], every: u16)
where
    R: Resolve,
    C: Connect,
{
    let mut last_tls_info = TlsInfoLabels::new();

    loop {
        // Catch panics in individual iterations to keep loop alive
        let iteration_result = std::panic::AssertUnwindSafe(async {
            let now = Utc::now();
            let wait_time = Duration::seconds(every.into());

            let outcomes = scan(scheduler, hostnames.to_vec()).await;
            for outcome in &outcomes {
                record_host_metrics(outcome, &mut last_tls_info);
            }

            let report = ScanReport::from_outcomes(outcomes);
            match serde_json::to_string(&report) {
                Ok(serialized) => println!("{serialized}"),
                Err(e) => error!("failed to serialize report: {e}"),
            }

            let runtime = Utc::now().signed_duration_since(now);

            // Sleep for remaining interval time to maintain fixed interval
            if let Some(remaining) = remaining_sleep_duration(wait_time, runtime) {
                time::sleep(remaining).await;
            }
        })
        .catch_unwind()
        .await;

        if let Err(panic_info) = iteration_result {
            error!("Panic in monitoring loop iteration: {panic_info:?}");
            PANICS_RECOVERED.inc();
            time::sleep(time::Duration::from_secs(every.into())).await;
        }
    }
}
