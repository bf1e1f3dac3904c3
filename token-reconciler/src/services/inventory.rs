//! Inventory-tool integration: orphaned-token discovery and token deletion.

use crate::models::TokenSerial;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reconciler_core::error::AppError;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// A listing line counts only if it carries the totp type tag and starts
/// with a serial of the form `TOTP` + 8 characters.
static SERIAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(TOTP.{8})\s\(totp\)").expect("serial pattern must compile")
});

const TYPE_MARKER: &str = "(totp)";

/// Parse the inventory tool's orphan listing. Non-matching lines are
/// skipped; duplicate serials are dropped, first occurrence wins.
pub fn parse_orphan_listing(listing: &str) -> Vec<TokenSerial> {
    let mut seen = HashSet::new();
    let mut serials = Vec::new();
    for line in listing.lines() {
        if !line.contains(TYPE_MARKER) {
            continue;
        }
        if let Some(caps) = SERIAL_PATTERN.captures(line) {
            let serial = TokenSerial::new(&caps[1]);
            if seen.insert(serial.clone()) {
                serials.push(serial);
            }
        }
    }
    serials
}

#[async_trait]
pub trait TokenInventory: Send + Sync {
    async fn list_orphaned(&self) -> Result<Vec<TokenSerial>, AppError>;
    async fn delete(&self, serial: &TokenSerial) -> Result<(), AppError>;
}

/// Shells out to the privacyIDEA token janitor.
pub struct JanitorCli {
    binary: PathBuf,
    timeout: Duration,
}

impl JanitorCli {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    async fn run(&self, args: &[&str]) -> Result<Output, AppError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(
            binary = %self.binary.display(),
            args = ?args,
            timeout_secs = %self.timeout.as_secs(),
            "Invoking inventory tool"
        );

        let result = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                AppError::InventoryError(anyhow::anyhow!(
                    "inventory tool timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?;

        match result {
            Ok(output) => Ok(output),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::InventoryToolMissing(
                self.binary.display().to_string(),
            )),
            Err(e) => Err(AppError::InventoryError(anyhow::Error::new(e))),
        }
    }
}

#[async_trait]
impl TokenInventory for JanitorCli {
    async fn list_orphaned(&self) -> Result<Vec<TokenSerial>, AppError> {
        let output = self.run(&["find", "--orphaned", "1"]).await?;

        let decoded = String::from_utf8(output.stdout);
        if !output.status.success() {
            let unusable = match &decoded {
                Ok(s) => s.trim().is_empty(),
                Err(_) => true,
            };
            if unusable {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(AppError::InventoryError(anyhow::anyhow!(
                    "inventory tool exited with {} and produced no usable listing: {}",
                    output.status,
                    stderr.trim()
                )));
            }
        }

        let listing = match decoded {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Ok(parse_orphan_listing(&listing))
    }

    async fn delete(&self, serial: &TokenSerial) -> Result<(), AppError> {
        let output = self
            .run(&["find", "--serial", serial.as_str(), "--action", "delete"])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::InventoryError(anyhow::anyhow!(
                "delete of {} exited with {}: {}",
                serial,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}
