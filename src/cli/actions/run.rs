use super::Action;
use crate::pulse;
use anyhow::{Context, Result};

/// Execute the action
///
/// # Errors
///
/// Returns an error if the checks cannot start or the report cannot be
/// written
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Check { hostnames, config } => {
            let report = pulse::check(hostnames, config).await?;
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{json}");
        }
        Action::Monitor {
            hostnames,
            config,
            interval,
            listen,
            port,
        } => {
            pulse::start(&hostnames, config, interval, listen, port).await?;
        }
    }

    Ok(())
}
