use crate::{
    cli::actions::Action,
    config::{ProbeConfig, ProbeOptions},
    scheduler::parse_hostnames,
};
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use std::{io::Read, net::IpAddr, path::PathBuf};

/// Read a JSON host list from a file, or stdin for `-`
fn read_input(source: &str) -> Result<Vec<String>> {
    let raw = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read hostnames from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read hostnames from {source}"))?
    };

    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {source}"))?;

    Ok(parse_hostnames(&value)?)
}

/// Map the probe flags onto `ProbeOptions`, leaving unset ones to the
/// configuration defaults
fn probe_options(matches: &ArgMatches) -> ProbeOptions {
    ProbeOptions {
        timeout: matches.get_one::<u64>("timeout").copied(),
        port: matches.get_one::<u16>("port").copied(),
        verify: matches.get_flag("verify").then_some(true),
        concurrency: matches
            .get_one::<u32>("concurrency")
            .map(|c| usize::try_from(*c).unwrap_or(usize::MAX)),
        dns_timeout: matches.get_one::<u64>("dns-timeout").copied(),
        retries: matches.get_one::<u32>("retries").copied(),
        retry_delay: matches.get_one::<u64>("retry-delay").copied(),
        ca_file: matches.get_one::<String>("ca-file").map(PathBuf::from),
    }
}

/// Convert `ArgMatches` into typed Action enum with validation
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the host list cannot be
/// read, or no hostnames were given
pub fn dispatch(matches: &ArgMatches) -> Result<Action> {
    // Validate the configuration before touching the host list
    let config =
        ProbeConfig::from_options(probe_options(matches)).context("Invalid configuration")?;

    let mut hostnames: Vec<String> = matches
        .get_many::<String>("hostnames")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let input = matches.get_one::<String>("input");
    if let Some(source) = input {
        hostnames.extend(read_input(source)?);
    }

    if hostnames.is_empty() && input.is_none() {
        bail!("No hostnames given: pass them as arguments or with --input");
    }

    let Some(interval) = matches.get_one::<u16>("interval").copied() else {
        return Ok(Action::Check { hostnames, config });
    };

    // Extract and validate listen address
    let listen = matches
        .get_one::<String>("listen")
        .map(|addr| {
            addr.parse::<IpAddr>()
                .with_context(|| format!("Invalid IP address: {addr}"))
        })
        .transpose()?;

    // clap always fills metrics-port from its default
    let port = matches
        .get_one::<u16>("metrics-port")
        .copied()
        .context("missing metrics port")?;

    Ok(Action::Monitor {
        hostnames,
        config,
        interval,
        listen,
        port,
    })
}
