use super::{
    CertificateInfo, TlsMetadata, ensure_crypto_provider,
    metadata::protocol_label,
    verifier::{AuthorizingVerifier, webpki_verifier},
};
use crate::{config::ProbeConfig, error::ProbeError, metrics::TLS_HANDSHAKE_DURATION, timeout::race};
use rustls::{
    ClientConfig,
    client::WebPkiServerVerifier,
    pki_types::{CertificateDer, ServerName},
};
use rustls_pemfile::certs;
use std::{
    fmt,
    future::Future,
    io::{self, Cursor},
    net::{IpAddr, SocketAddr},
    path::Path,
    sync::Arc,
    time::Duration,
};
use tokio::{fs, io::AsyncWriteExt, net::TcpStream};
use tokio_rustls::{TlsConnector, client::TlsStream};
use tracing::debug;

/// Opens secure connections to a resolved address
pub trait Connect: Send + Sync {
    type Session: Session;

    /// Connect to `address`, presenting `hostname` for certificate matching
    fn connect(
        &self,
        hostname: &str,
        address: IpAddr,
    ) -> impl Future<Output = Result<Self::Session, ProbeError>> + Send;
}

/// An established secure connection.
///
/// Sessions are not closed on drop by the probe logic; callers release them
/// with `close` once the fields they need have been read.
pub trait Session: Send {
    /// Negotiated protocol, cipher and verification verdict
    fn metadata(&self) -> TlsMetadata;

    /// Fields of the peer leaf certificate
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Certificate` if the peer sent no certificate or it
    /// cannot be parsed
    fn certificate(&self) -> Result<CertificateInfo, ProbeError>;

    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Lifecycle of one connection attempt
#[derive(Debug)]
enum Attempt<S> {
    Connecting,
    Secured(S),
    Failed(io::Error),
    TimedOut,
}

impl<S> Attempt<S> {
    const fn state(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Secured(_) => "secured",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
        }
    }

    /// Drive a connecting attempt until it is secured, fails or runs out of
    /// time. The handshake future owns the socket, so losing the race drops
    /// (closes) it before this returns.
    async fn settle<F>(self, limit: Duration, handshake: F) -> Self
    where
        F: Future<Output = io::Result<S>>,
    {
        match self {
            Self::Connecting => match race(limit, handshake).await {
                Ok(Ok(stream)) => Self::Secured(stream),
                Ok(Err(err)) => Self::Failed(err),
                Err(_) => Self::TimedOut,
            },
            settled => settled,
        }
    }

    /// The single exit of an attempt
    fn finish(self, address: SocketAddr, limit: Duration) -> Result<S, ProbeError> {
        match self {
            Self::Secured(stream) => Ok(stream),
            Self::Failed(source) => Err(ProbeError::Connect { address, source }),
            Self::TimedOut => Err(ProbeError::ConnectTimeout { after: limit }),
            Self::Connecting => Err(ProbeError::Connect {
                address,
                source: io::Error::other("connection attempt never settled"),
            }),
        }
    }
}

/// rustls client bounded by the connect timeout
#[derive(Debug, Clone)]
pub struct SecureConnector {
    port: u16,
    timeout: Duration,
    verify: bool,
    webpki: Arc<WebPkiServerVerifier>,
}

impl SecureConnector {
    /// Build a connector from the probe configuration, loading the optional
    /// CA bundle into the trusted roots
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::ConfigValidation` if the CA bundle cannot be read
    /// or used
    pub async fn from_config(config: &ProbeConfig) -> Result<Self, ProbeError> {
        ensure_crypto_provider();

        let extra_roots = match config.ca_file() {
            Some(path) => load_cert_chain(path).await?,
            None => Vec::new(),
        };

        let webpki = webpki_verifier(extra_roots).map_err(|e| ProbeError::ConfigValidation {
            field: "caFile",
            reason: e.to_string(),
        })?;

        Ok(Self {
            port: config.port(),
            timeout: config.connect_timeout(),
            verify: config.verify_certificate(),
            webpki,
        })
    }
}

impl Connect for SecureConnector {
    type Session = TlsSession;

    async fn connect(&self, hostname: &str, address: IpAddr) -> Result<TlsSession, ProbeError> {
        let target = SocketAddr::new(address, self.port);
        let server_name = server_name_from_host(hostname).map_err(|source| ProbeError::Connect {
            address: target,
            source,
        })?;

        let verifier = Arc::new(AuthorizingVerifier::new(
            Arc::clone(&self.webpki),
            self.verify,
        ));
        let connector = tls_connector(Arc::clone(&verifier));

        let timer = TLS_HANDSHAKE_DURATION.start_timer();
        let handshake = async {
            let stream = TcpStream::connect(target).await?;
            connector.connect(server_name, stream).await
        };

        let attempt = Attempt::Connecting.settle(self.timeout, handshake).await;
        debug!(hostname, %target, state = attempt.state(), "connection attempt settled");

        if matches!(attempt, Attempt::Secured(_)) {
            timer.observe_duration();
        } else {
            timer.stop_and_discard();
        }

        let stream = attempt.finish(target, self.timeout)?;

        Ok(TlsSession {
            stream,
            verifier,
            close_timeout: self.timeout,
        })
    }
}

/// A live rustls session
pub struct TlsSession {
    stream: TlsStream<TcpStream>,
    verifier: Arc<AuthorizingVerifier>,
    close_timeout: Duration,
}

impl fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSession")
            .field("verifier", &self.verifier)
            .field("close_timeout", &self.close_timeout)
            .finish_non_exhaustive()
    }
}

impl Session for TlsSession {
    fn metadata(&self) -> TlsMetadata {
        let (_, connection) = self.stream.get_ref();
        TlsMetadata {
            version: connection.protocol_version().map(protocol_label),
            cipher: connection
                .negotiated_cipher_suite()
                .map(|suite| format!("{:?}", suite.suite())),
            authorized: self.verifier.authorized(),
        }
    }

    fn certificate(&self) -> Result<CertificateInfo, ProbeError> {
        let (_, connection) = self.stream.get_ref();
        let cert = connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| ProbeError::Certificate {
                reason: "peer presented no certificate".to_string(),
            })?;

        CertificateInfo::from_der(cert.as_ref())
    }

    async fn close(mut self) {
        match race(self.close_timeout, self.stream.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(error = %err, "TLS shutdown failed"),
            Err(err) => debug!(error = %err, "TLS shutdown timed out"),
        }
    }
}

/// One client config per attempt, so the verifier verdict belongs to a
/// single connection
fn tls_connector(verifier: Arc<AuthorizingVerifier>) -> TlsConnector {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

fn server_name_from_host(host: &str) -> io::Result<ServerName<'static>> {
    host.parse::<IpAddr>().map_or_else(
        |_| {
            ServerName::try_from(host.to_string()).map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid server name: {host}"),
                )
            })
        },
        |ip| Ok(ServerName::from(ip)),
    )
}

async fn load_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>, ProbeError> {
    let invalid = |reason: String| ProbeError::ConfigValidation {
        field: "caFile",
        reason,
    };

    let data = fs::read(path)
        .await
        .map_err(|e| invalid(format!("failed to read {}: {e}", path.display())))?;
    let mut reader = Cursor::new(data);
    let parsed = certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(format!("invalid certificate PEM: {e}")))?;

    if parsed.is_empty() {
        return Err(invalid(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    Ok(parsed)
}
