//! End-of-run housekeeping: log rotation, elapsed time, exit code.

use crate::models::RunOutcome;
use reconciler_core::observability::rotate_by_created;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};

/// Every terminal path of the run funnels through [`Housekeeping::finish`],
/// whatever the outcome.
pub struct Housekeeping {
    log_dir: PathBuf,
    logs_to_keep: usize,
    started_at: Instant,
}

impl Housekeeping {
    pub fn begin(log_dir: PathBuf, logs_to_keep: usize) -> Self {
        Self {
            log_dir,
            logs_to_keep,
            started_at: Instant::now(),
        }
    }

    pub fn finish(&self, outcome: RunOutcome) -> ExitCode {
        info!("START: log rotation");
        match rotate_by_created(&self.log_dir, self.logs_to_keep) {
            Ok(removed) => info!(removed = removed.len(), "DONE: log rotation"),
            Err(e) => error!(error = %e, "Failed to rotate logs"),
        }

        info!(
            elapsed = %format!("{:.2?}", self.started_at.elapsed()),
            outcome = outcome.as_str(),
            "Run finished"
        );
        ExitCode::from(outcome.exit_code())
    }
}
