mod run;

use crate::config::ProbeConfig;
use std::net::IpAddr;

/// Action enum representing each possible command
#[derive(Debug)]
pub enum Action {
    /// Probe every host once and print the report
    Check {
        hostnames: Vec<String>,
        config: ProbeConfig,
    },
    /// Probe every `interval` seconds and serve `/metrics`
    Monitor {
        hostnames: Vec<String>,
        config: ProbeConfig,
        interval: u16,
        listen: Option<IpAddr>,
        port: u16,
    },
}

impl Action {
    /// Execute the action
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails to execute
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
