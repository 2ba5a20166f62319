//! TLS connection and certificate inspection
//!
//! # Module Organization
//!
//! - `connector` - Connection attempts with their timeout and lifecycle
//! - `verifier` - Certificate verifier that records the verification verdict
//! - `certificate` - Leaf certificate field extraction
//! - `metadata` - Negotiated protocol and cipher
//!
//! # Example
//!
//! ```rust,ignore
//! use tlspulse::tls::{Connect, SecureConnector, Session};
//!
//! let connector = SecureConnector::from_config(&config).await?;
//! let session = connector.connect("example.com", address).await?;
//! let certificate = session.certificate();
//! session.close().await;
//! ```

pub mod certificate;
pub mod connector;
pub mod metadata;
pub mod verifier;

use std::sync::OnceLock;
use tracing::debug;

// Re-export commonly used types
pub use certificate::{CertificateInfo, parse_alt_names};
pub use connector::{Connect, SecureConnector, Session, TlsSession};
pub use metadata::TlsMetadata;
pub use verifier::AuthorizingVerifier;

static CRYPTO_PROVIDER_INIT: OnceLock<()> = OnceLock::new();

/// Ensure the rustls crypto provider is initialized
///
/// This should be called before any TLS operations. It's safe to call
/// multiple times as initialization only happens once.
pub fn ensure_crypto_provider() {
    CRYPTO_PROVIDER_INIT.get_or_init(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            debug!("rustls crypto provider already installed");
        }
    });
}

#[cfg(test)]
pub(crate) mod testing {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use rcgen::{
        BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
        SanType,
    };
    use rustls::pki_types::CertificateDer;
    use std::net::{IpAddr, Ipv4Addr};

    /// A throwaway CA and a `localhost` leaf signed by it
    pub struct TestPki {
        pub ca_der: CertificateDer<'static>,
        pub leaf_der: CertificateDer<'static>,
        pub leaf_key_der: Vec<u8>,
    }

    impl TestPki {
        pub fn generate() -> Self {
            let mut ca_params = CertificateParams::new(Vec::default()).unwrap();
            ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            let mut ca_dn = DistinguishedName::new();
            ca_dn.push(DnType::CommonName, "tlspulse test CA");
            ca_params.distinguished_name = ca_dn;
            let ca_key = KeyPair::generate().unwrap();
            let ca_cert = ca_params.clone().self_signed(&ca_key).unwrap();
            let issuer = Issuer::new(ca_params, ca_key);

            let mut leaf_params = CertificateParams::new(Vec::default()).unwrap();
            leaf_params.subject_alt_names = vec![
                SanType::DnsName("localhost".try_into().unwrap()),
                SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ];
            let mut leaf_dn = DistinguishedName::new();
            leaf_dn.push(DnType::CommonName, "localhost");
            leaf_params.distinguished_name = leaf_dn;
            let leaf_key = KeyPair::generate().unwrap();
            let leaf_cert = leaf_params.signed_by(&leaf_key, &issuer).unwrap();

            Self {
                ca_der: CertificateDer::from(ca_cert.der().to_vec()),
                leaf_der: CertificateDer::from(leaf_cert.der().to_vec()),
                leaf_key_der: leaf_key.serialize_der(),
            }
        }
    }
}
