//! Service-liveness precondition via systemd.

use std::process::Stdio;
use tokio::process::Command;
use tracing::warn;

/// Whether the given systemd unit is active on this host. An empty unit
/// name means the precondition is disabled and always passes. A failure to
/// invoke systemctl counts as "not active" rather than aborting the run.
pub async fn service_is_active(unit: &str) -> bool {
    if unit.is_empty() {
        return true;
    }

    let result = Command::new("systemctl")
        .args(["is-active", unit])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) => status.success(),
        Err(e) => {
            warn!(unit = unit, error = %e, "Could not invoke systemctl");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_unit_disables_the_check() {
        assert!(service_is_active("").await);
    }
}
