use rustls::{
    DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
    client::{
        WebPkiServerVerifier,
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
    pki_types::{CertificateDer, ServerName, UnixTime},
};
use std::{
    fmt,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// Build the `WebPKI` verifier shared by every connection attempt.
///
/// Roots are the bundled Mozilla set plus any `extra_roots`.
///
/// # Errors
///
/// Returns an error if an extra root is not a usable trust anchor or the
/// verifier cannot be built
pub fn webpki_verifier(
    extra_roots: Vec<CertificateDer<'static>>,
) -> Result<Arc<WebPkiServerVerifier>, TlsError> {
    let mut root_store: RootCertStore = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    for root in extra_roots {
        root_store.add(root)?;
    }

    WebPkiServerVerifier::builder(Arc::new(root_store))
        .build()
        .map_err(|e| TlsError::General(format!("failed to build WebPKI verifier: {e}")))
}

/// A certificate verifier that always runs the real `WebPKI` checks and
/// records the verdict for the connection it belongs to.
///
/// With `enforce` set a failed verification aborts the handshake. Without it
/// the handshake proceeds so misconfigured servers can still be inspected,
/// and the recorded verdict is reported as the peer-authorized flag.
///
/// One verifier serves exactly one connection attempt.
#[derive(Clone)]
pub struct AuthorizingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    enforce: bool,
    /// `None` until the peer certificate has been checked
    verdict: Arc<Mutex<Option<bool>>>,
}

impl fmt::Debug for AuthorizingVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizingVerifier")
            .field("inner", &"WebPkiServerVerifier")
            .field("enforce", &self.enforce)
            .field("verdict", &self.verdict)
            .finish()
    }
}

impl AuthorizingVerifier {
    #[must_use]
    pub fn new(inner: Arc<WebPkiServerVerifier>, enforce: bool) -> Self {
        Self {
            inner,
            enforce,
            verdict: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether the peer certificate passed verification
    ///
    /// Returns `false` before the certificate has been seen.
    #[must_use]
    pub fn authorized(&self) -> bool {
        self.verdict
            .lock()
            .ok()
            .and_then(|verdict| *verdict)
            .unwrap_or(false)
    }

    fn record(&self, passed: bool) {
        if let Ok(mut verdict) = self.verdict.lock() {
            // a later failure (signature) overrides an earlier pass
            *verdict = Some(verdict.unwrap_or(true) && passed);
        }
    }

    fn settle<T>(&self, result: Result<T, TlsError>, accept: T) -> Result<T, TlsError> {
        match result {
            Ok(value) => {
                self.record(true);
                Ok(value)
            }
            Err(err) => {
                self.record(false);
                if self.enforce {
                    Err(err)
                } else {
                    debug!(error = %err, "accepting unverified peer");
                    Ok(accept)
                }
            }
        }
    }
}

impl ServerCertVerifier for AuthorizingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let result = self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        );
        self.settle(result, ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        let result = self.inner.verify_tls12_signature(message, cert, dss);
        self.settle(result, HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        let result = self.inner.verify_tls13_signature(message, cert, dss);
        self.settle(result, HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
