use rustls::ProtocolVersion;
use serde::Serialize;

/// TLS connection metadata extracted after handshake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TlsMetadata {
    /// TLS protocol version (e.g., "TLSv1.3")
    pub version: Option<String>,
    /// Cipher suite used (e.g., `TLS13_AES_256_GCM_SHA384`)
    pub cipher: Option<String>,
    /// Whether the peer certificate passed verification
    pub authorized: bool,
}

/// Human readable protocol label, "TLSv1.3" rather than `TLSv1_3`
#[must_use]
pub fn protocol_label(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        ProtocolVersion::TLSv1_1 => "TLSv1.1".to_string(),
        ProtocolVersion::TLSv1_0 => "TLSv1".to_string(),
        other => format!("{other:?}"),
    }
}
