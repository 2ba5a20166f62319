#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
    SanType,
};
use rustls::{
    ServerConfig,
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
};
use std::{
    collections::{HashMap, HashSet},
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tlspulse::{
    config::{ProbeConfig, ProbeOptions},
    error::{ProbeError, ResolveCause},
    probe::Prober,
    resolver::Resolve,
    scheduler::Scheduler,
    tls::{CertificateInfo, Connect, Session, TlsMetadata},
};
use tokio::{io::AsyncReadExt, net::TcpListener, time::sleep};
use tokio_rustls::TlsAcceptor;

/// Shared state behind the fake resolver and connector
#[derive(Default)]
pub struct FakeNetwork {
    latency: Duration,
    resolve_latency: Duration,
    address: Option<IpAddr>,
    unresolvable: HashSet<String>,
    /// Remaining connect failures per host
    failures: Mutex<HashMap<String, u32>>,
    resolve_calls: Mutex<HashMap<String, u32>>,
    connect_calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closed: AtomicU32,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time every connect takes
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Time every lookup takes
    pub fn with_resolve_latency(mut self, latency: Duration) -> Self {
        self.resolve_latency = latency;
        self
    }

    /// Resolve every host to `address` instead of 192.0.2.1
    pub fn resolving_to(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    /// `hostname` never resolves
    pub fn unresolvable(mut self, hostname: &str) -> Self {
        self.unresolvable.insert(hostname.to_string());
        self
    }

    /// The first `times` connects to `hostname` are refused
    pub fn failing(self, hostname: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(hostname.to_string(), times);
        self
    }

    pub fn resolve_calls(&self, hostname: &str) -> u32 {
        self.resolve_calls
            .lock()
            .unwrap()
            .get(hostname)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_resolve_calls(&self) -> u32 {
        self.resolve_calls.lock().unwrap().values().sum()
    }

    pub fn connect_calls(&self, hostname: &str) -> u32 {
        self.connect_calls
            .lock()
            .unwrap()
            .get(hostname)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_connect_calls(&self) -> u32 {
        self.connect_calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn closed_sessions(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }

    fn bump(calls: &Mutex<HashMap<String, u32>>, hostname: &str) -> u32 {
        let mut calls = calls.lock().unwrap();
        let count = calls.entry(hostname.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

pub struct FakeResolver(pub Arc<FakeNetwork>);

impl Resolve for FakeResolver {
    async fn resolve(&self, hostname: &str) -> Result<IpAddr, ProbeError> {
        FakeNetwork::bump(&self.0.resolve_calls, hostname);

        if !self.0.resolve_latency.is_zero() {
            sleep(self.0.resolve_latency).await;
        }

        if self.0.unresolvable.contains(hostname) {
            return Err(ProbeError::Resolution {
                hostname: hostname.to_string(),
                cause: ResolveCause::Lookup("no IPv4 address found".to_string()),
            });
        }

        Ok(self
            .0
            .address
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))))
    }
}

pub struct FakeConnector(pub Arc<FakeNetwork>);

impl Connect for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, hostname: &str, address: IpAddr) -> Result<FakeSession, ProbeError> {
        let attempt = FakeNetwork::bump(&self.0.connect_calls, hostname);

        let now = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.0.latency.is_zero() {
            sleep(self.0.latency).await;
        }
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);

        let refused = {
            let mut failures = self.0.failures.lock().unwrap();
            match failures.get_mut(hostname) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };

        if refused {
            return Err(ProbeError::Connect {
                address: SocketAddr::new(address, 443),
                source: io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("refused #{attempt}"),
                ),
            });
        }

        Ok(FakeSession {
            hostname: hostname.to_string(),
            network: Arc::clone(&self.0),
        })
    }
}

pub struct FakeSession {
    hostname: String,
    network: Arc<FakeNetwork>,
}

impl Session for FakeSession {
    fn metadata(&self) -> TlsMetadata {
        TlsMetadata {
            version: Some("TLSv1.3".to_string()),
            cipher: Some("TLS13_AES_128_GCM_SHA256".to_string()),
            authorized: false,
        }
    }

    fn certificate(&self) -> Result<CertificateInfo, ProbeError> {
        Ok(CertificateInfo {
            subject: Some(self.hostname.clone()),
            issuer: Some("Fake CA".to_string()),
            valid_from: "2026-01-01T00:00:00Z".to_string(),
            valid_to: "2027-01-01T00:00:00Z".to_string(),
            alt_names: vec![self.hostname.clone()],
            expiry_days: 60,
        })
    }

    async fn close(self) {
        self.network.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn config(options: ProbeOptions) -> Arc<ProbeConfig> {
    Arc::new(ProbeConfig::from_options(options).unwrap())
}

pub fn fake_prober(
    network: &Arc<FakeNetwork>,
    options: ProbeOptions,
) -> Prober<FakeResolver, FakeConnector> {
    Prober::new(
        config(options),
        FakeResolver(Arc::clone(network)),
        FakeConnector(Arc::clone(network)),
    )
}

pub fn fake_scheduler(
    network: &Arc<FakeNetwork>,
    options: ProbeOptions,
) -> Scheduler<FakeResolver, FakeConnector> {
    Scheduler::new(fake_prober(network, options))
}

pub fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

/// A throwaway CA and a leaf for `localhost` / 127.0.0.1 signed by it
pub struct TestPki {
    pub ca_pem: String,
    pub leaf_der: CertificateDer<'static>,
    pub leaf_key_der: Vec<u8>,
}

impl TestPki {
    pub fn generate() -> Self {
        let mut ca_params = CertificateParams::new(Vec::default()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let mut ca_dn = DistinguishedName::new();
        ca_dn.push(DnType::CommonName, "tlspulse integration CA");
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
            ca_pem: ca_cert.pem(),
            leaf_der: CertificateDer::from(leaf_cert.der().to_vec()),
            leaf_key_der: leaf_key.serialize_der(),
        }
    }

    /// Write the CA certificate to a PEM file named after `tag`
    pub fn write_ca(&self, tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "tlspulse-ca-{tag}-{}.pem",
            std::process::id()
        ));
        std::fs::write(&path, &self.ca_pem).unwrap();
        path
    }
}

/// Serve TLS handshakes with the `pki` leaf on 127.0.0.1, returning the port
pub async fn tls_server(pki: &TestPki) -> u16 {
    tlspulse::tls::ensure_crypto_provider();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(pki.leaf_key_der.clone()));
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![pki.leaf_der.clone()], key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let mut buf = [0u8; 64];
                    let _ = tls.read(&mut buf).await;
                }
            });
        }
    });

    port
}

/// Accept TCP connections on 127.0.0.1 and never answer, returning the port
pub async fn silent_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    port
}
