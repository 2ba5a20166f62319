//! Bounded concurrent probing of a host list.
//!
//! Pending hosts wait in a queue in input order. Probes are admitted while
//! fewer than `concurrency` are in flight, and every completion frees a slot
//! for the next pending host. All probes of a batch are polled by the task
//! calling `run_all`; nothing is spawned.

use crate::{
    error::ProbeError,
    metrics::IN_FLIGHT,
    probe::{HostReport, Prober},
    resolver::Resolve,
    tls::Connect,
};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use prometheus::IntGauge;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

/// Final result for one input hostname
#[derive(Debug)]
pub struct HostOutcome {
    pub hostname: String,
    pub result: Result<HostReport, ProbeError>,
    pub finished_at: DateTime<Utc>,
}

impl HostOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Read a JSON array of hostname strings
///
/// # Errors
///
/// Returns `ProbeError::InvalidInput` if `input` is not an array or one of
/// its entries is not a string
pub fn parse_hostnames(input: &Value) -> Result<Vec<String>, ProbeError> {
    let Value::Array(entries) = input else {
        return Err(ProbeError::InvalidInput {
            reason: format!("got {}", json_type(input)),
        });
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ProbeError::InvalidInput {
                    reason: format!("entry {index} is {}, not a string", json_type(entry)),
                })
        })
        .collect()
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Runs probes with at most `concurrency` of them in flight
#[derive(Debug)]
pub struct Scheduler<R, C> {
    prober: Prober<R, C>,
    limit: usize,
}

impl<R, C> Scheduler<R, C>
where
    R: Resolve,
    C: Connect,
{
    #[must_use]
    pub fn new(prober: Prober<R, C>) -> Self {
        let limit = prober.config().concurrency().max(1);
        Self { prober, limit }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Probe every hostname and return one outcome per input entry, in
    /// completion order. Host failures are recorded, never raised.
    pub async fn run_all(&self, hostnames: Vec<String>) -> Vec<HostOutcome> {
        if hostnames.is_empty() {
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(hostnames.len());
        let mut pending: VecDeque<String> = hostnames.into();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.limit {
                let Some(hostname) = pending.pop_front() else {
                    break;
                };
                debug!(
                    hostname,
                    in_flight = in_flight.len() + 1,
                    pending = pending.len(),
                    "admitted"
                );
                in_flight.push(self.run_one(hostname));
            }

            let Some(outcome) = in_flight.next().await else {
                break;
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Validate a JSON host list, then run it
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::InvalidInput` before any probe starts if `input`
    /// is not an array of strings
    pub async fn run_json(&self, input: &Value) -> Result<Vec<HostOutcome>, ProbeError> {
        let hostnames = parse_hostnames(input)?;
        Ok(self.run_all(hostnames).await)
    }

    async fn run_one(&self, hostname: String) -> HostOutcome {
        let _slot = InFlightSlot::acquire(&IN_FLIGHT);
        let result = self.prober.probe(&hostname).await;
        HostOutcome {
            hostname,
            result,
            finished_at: Utc::now(),
        }
    }
}

/// Holds one unit of an in-flight gauge, released on drop even when the
/// probe is cancelled or unwinds
struct InFlightSlot<'a>(&'a IntGauge);

impl<'a> InFlightSlot<'a> {
    fn acquire(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}
