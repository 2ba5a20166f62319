use crate::{
    scheduler::HostOutcome,
    tls::{CertificateInfo, TlsMetadata},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::net::IpAddr;

/// One entry of the `scans` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HostRecord {
    Success {
        hostname: String,
        ip: IpAddr,
        tls: TlsMetadata,
        certificate: CertificateInfo,
        timestamp: String,
    },
    Error {
        hostname: String,
        error: String,
        timestamp: String,
    },
}

impl HostRecord {
    #[must_use]
    pub fn hostname(&self) -> &str {
        match self {
            Self::Success { hostname, .. } | Self::Error { hostname, .. } => hostname,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<HostOutcome> for HostRecord {
    fn from(outcome: HostOutcome) -> Self {
        match outcome.result {
            Ok(report) => Self::Success {
                hostname: outcome.hostname,
                ip: report.ip,
                tls: report.tls,
                certificate: report.certificate,
                timestamp: rfc3339(report.checked_at),
            },
            Err(err) => Self::Error {
                hostname: outcome.hostname,
                error: err.to_string(),
                timestamp: rfc3339(outcome.finished_at),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Aggregated result of one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub summary: Summary,
    pub scans: Vec<HostRecord>,
    pub scan_time: String,
}

impl ScanReport {
    /// Build the report, keeping the order of `outcomes`
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<HostOutcome>) -> Self {
        let scans: Vec<HostRecord> = outcomes.into_iter().map(HostRecord::from).collect();
        let successful = scans.iter().filter(|scan| scan.is_success()).count();

        Self {
            summary: Summary {
                total: scans.len(),
                successful,
                failed: scans.len() - successful,
            },
            scans,
            scan_time: rfc3339(Utc::now()),
        }
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
