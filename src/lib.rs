//! Check TLS certificates and connection parameters for a list of hosts.
//!
//! Each hostname is resolved to one IPv4 address, connected to over TLS with
//! the hostname as SNI, and reported with its negotiated protocol, cipher and
//! leaf certificate. Hosts are probed concurrently up to a limit, each with
//! its own retry budget, and every host gets exactly one result.

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod pulse;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod telemetry;
pub mod timeout;
pub mod tls;
