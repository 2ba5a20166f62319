use crate::error::ProbeError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::net::IpAddr;
use x509_parser::{
    prelude::{FromDer, GeneralName, X509Certificate},
    time::ASN1Time,
    x509::X509Name,
};

/// Leaf certificate fields reported for a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    /// Subject common name
    pub subject: Option<String>,
    /// Issuer common name
    pub issuer: Option<String>,
    /// Start of the validity window, RFC 3339
    pub valid_from: String,
    /// End of the validity window, RFC 3339
    pub valid_to: String,
    pub alt_names: Vec<String>,
    /// Days until expiration (negative if expired)
    pub expiry_days: i64,
}

impl CertificateInfo {
    /// Extract the reported fields from a DER-encoded certificate
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Certificate` if the certificate cannot be parsed
    /// or carries an out of range validity date
    pub fn from_der(cert_der: &[u8]) -> Result<Self, ProbeError> {
        let (_, cert) = X509Certificate::from_der(cert_der).map_err(|e| ProbeError::Certificate {
            reason: format!("failed to parse certificate: {e}"),
        })?;

        let validity = cert.validity();
        let not_before = to_utc(&validity.not_before)?;
        let not_after = to_utc(&validity.not_after)?;

        Ok(Self {
            subject: common_name(cert.subject()),
            issuer: common_name(cert.issuer()),
            valid_from: not_before.to_rfc3339_opts(SecondsFormat::Secs, true),
            valid_to: not_after.to_rfc3339_opts(SecondsFormat::Secs, true),
            alt_names: parse_alt_names(render_alt_names(&cert).as_deref()),
            expiry_days: (not_after - Utc::now()).num_days(),
        })
    }
}

/// Split a rendered alternate-name list into names.
///
/// Entries are separated by `", "`; a leading `DNS:` is stripped and any
/// other entry (`IP:192.168.1.1`, `email:…`) is kept verbatim.
#[must_use]
pub fn parse_alt_names(alt_names: Option<&str>) -> Vec<String> {
    match alt_names {
        Some(list) if !list.is_empty() => list
            .split(", ")
            .map(|name| name.strip_prefix("DNS:").unwrap_or(name).to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Render the SAN extension as `DNS:a.com, IP:1.2.3.4`
fn render_alt_names(cert: &X509Certificate<'_>) -> Option<String> {
    let san = cert.subject_alternative_name().ok().flatten()?;
    let names: Vec<String> = san
        .value
        .general_names
        .iter()
        .map(render_general_name)
        .collect();
    Some(names.join(", "))
}

fn render_general_name(name: &GeneralName<'_>) -> String {
    match name {
        GeneralName::DNSName(dns) => format!("DNS:{dns}"),
        GeneralName::IPAddress(bytes) => format!("IP:{}", render_ip(bytes)),
        GeneralName::RFC822Name(email) => format!("email:{email}"),
        GeneralName::URI(uri) => format!("URI:{uri}"),
        other => format!("{other:?}"),
    }
}

fn render_ip(bytes: &[u8]) -> String {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return IpAddr::from(octets).to_string();
    }
    if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        return IpAddr::from(octets).to_string();
    }
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn common_name(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
}

fn to_utc(time: &ASN1Time) -> Result<DateTime<Utc>, ProbeError> {
    let raw = time.to_datetime();
    DateTime::<Utc>::from_timestamp(raw.unix_timestamp(), raw.nanosecond()).ok_or_else(|| {
        ProbeError::Certificate {
            reason: "invalid certificate validity timestamp".to_string(),
        }
    })
}
