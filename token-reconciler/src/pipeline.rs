//! The reconciliation pipeline: discovery, ownership resolution, directory
//! classification, remediation, reporting.
//!
//! Stages run strictly in order, one entity at a time. Each stage returns
//! its result to the next; the report accumulator is threaded alongside and
//! flushed once at the end. A stage-fatal error aborts the remaining stages
//! and funnels into the same reporting and termination path.

use crate::models::{
    ActiveOwner, Classification, DirectoryVerdict, DisabledToken, NotFoundOwner, OwnedToken,
    OwnerAccount, OwnershipResolution, RemediationOutcome, RemediationTally, RunOutcome,
    RunReport, TokenSerial,
};
use crate::services::{
    build_reports, classify, fatal_report, AuditStore, DirectoryService, Report, ReportSink,
    TokenInventory,
};
use reconciler_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Pipeline {
    inventory: Arc<dyn TokenInventory>,
    audit: Arc<dyn AuditStore>,
    directory: Arc<dyn DirectoryService>,
    sink: Arc<dyn ReportSink>,
    disabled_marker: String,
    remote_access_group: String,
}

impl Pipeline {
    pub fn new(
        inventory: Arc<dyn TokenInventory>,
        audit: Arc<dyn AuditStore>,
        directory: Arc<dyn DirectoryService>,
        sink: Arc<dyn ReportSink>,
        disabled_marker: String,
        remote_access_group: String,
    ) -> Self {
        Self {
            inventory,
            audit,
            directory,
            sink,
            disabled_marker,
            remote_access_group,
        }
    }

    /// Run one batch. Never panics out of the stages: every path, fatal
    /// included, lands back here so the caller can do housekeeping.
    pub async fn run(&self) -> (RunOutcome, RunReport) {
        let mut report = RunReport::default();
        let result = self.run_stages(&mut report).await;

        if let Err(e) = self.directory.close().await {
            warn!(error = %e, "Failed to close directory session");
        }

        match result {
            Ok(outcome) => {
                self.emit_reports(&report).await;
                (outcome, report)
            }
            Err(err) => {
                error!(error = %err, "Stage-fatal error, aborting remaining stages");
                self.emit_reports(&report).await;
                self.emit(&fatal_report(&err)).await;
                (RunOutcome::StageFatal, report)
            }
        }
    }

    async fn run_stages(&self, report: &mut RunReport) -> Result<RunOutcome, AppError> {
        info!("START: searching orphaned tokens");
        let serials = self.inventory.list_orphaned().await?;
        info!(count = serials.len(), "DONE: searching orphaned tokens");
        if serials.is_empty() {
            warn!("No orphaned tokens found, nothing to do");
            return Ok(RunOutcome::NothingToDo);
        }
        info!(serials = ?serials, "Current orphaned token list");

        info!("START: resolving owners from audit history");
        let ownership = self.resolve_owners(&serials, report).await?;
        info!(
            resolved = ownership.owned.len(),
            unresolved = ownership.unresolved.len(),
            "DONE: resolving owners"
        );
        if ownership.owned.is_empty() {
            warn!("No owners to proceed with, nothing to do");
            return Ok(RunOutcome::NothingToDo);
        }

        info!("START: classifying owners against the directory");
        let classification = self.classify_owners(&ownership.owned, report).await?;
        info!(
            to_delete = classification.to_delete.len(),
            to_grant = classification.to_grant.len(),
            not_found = classification.not_found.len(),
            "DONE: classifying owners"
        );

        report.deletions = self.delete_tokens(&classification.to_delete).await;
        report.grants = self.grant_access(&classification.to_grant).await;

        Ok(RunOutcome::Completed)
    }

    /// One audit lookup per serial. An empty or missing owner value drops
    /// the serial here; it never enters the ownership map. Lookup errors
    /// are fatal so a partial map can never drive remediation.
    async fn resolve_owners(
        &self,
        serials: &[TokenSerial],
        report: &mut RunReport,
    ) -> Result<OwnershipResolution, AppError> {
        let mut resolution = OwnershipResolution::default();
        for serial in serials {
            match self.audit.owner_of(serial).await? {
                Some(raw) if !raw.trim().is_empty() => {
                    resolution.owned.push(OwnedToken {
                        serial: serial.clone(),
                        owner: OwnerAccount::new(raw),
                    });
                }
                _ => {
                    warn!(serial = %serial, "No owner found in audit history, skipping");
                    report.unresolved_owners.push(serial.clone());
                    resolution.unresolved.push(serial.clone());
                }
            }
        }
        Ok(resolution)
    }

    /// One directory lookup per distinct owner; tokens sharing an owner
    /// share its verdict.
    async fn classify_owners(
        &self,
        owned: &[OwnedToken],
        report: &mut RunReport,
    ) -> Result<Classification, AppError> {
        let mut order: Vec<OwnerAccount> = Vec::new();
        let mut by_owner: HashMap<OwnerAccount, Vec<TokenSerial>> = HashMap::new();
        for token in owned {
            by_owner
                .entry(token.owner.clone())
                .or_insert_with(|| {
                    order.push(token.owner.clone());
                    Vec::new()
                })
                .push(token.serial.clone());
        }

        let mut classification = Classification::default();
        for owner in &order {
            let serials = &by_owner[owner];
            let dns = self.directory.find_account(owner).await?;
            if dns.len() > 1 {
                warn!(
                    owner = %owner,
                    matches = dns.len(),
                    "Multiple directory entries for account, inspecting the first only"
                );
            }
            match classify(&dns, &self.disabled_marker) {
                DirectoryVerdict::Disabled { dn } => {
                    info!(
                        owner = %owner,
                        dn = %dn,
                        serials = ?serials,
                        "Owner is in the disabled container, queueing tokens for deletion"
                    );
                    for serial in serials {
                        classification.to_delete.push(DisabledToken {
                            serial: serial.clone(),
                            owner: owner.clone(),
                            dn: dn.clone(),
                        });
                    }
                }
                DirectoryVerdict::Active { dn } => {
                    info!(owner = %owner, dn = %dn, "Owner is active, queueing for group grant");
                    report.active_owner_dns.push(dn.clone());
                    classification.to_grant.push(ActiveOwner {
                        account: owner.clone(),
                        dn,
                    });
                }
                DirectoryVerdict::NotFound => {
                    warn!(owner = %owner, serials = ?serials, "Owner not found in directory");
                    let entry = NotFoundOwner {
                        owner: owner.clone(),
                        serials: serials.clone(),
                    };
                    report.not_found_in_directory.push(entry.clone());
                    classification.not_found.push(entry);
                }
            }
        }
        Ok(classification)
    }

    /// Per-item loop: one item's failure never blocks the rest.
    async fn delete_tokens(&self, queue: &[DisabledToken]) -> RemediationTally {
        let mut tally = RemediationTally::default();
        if queue.is_empty() {
            warn!("No disabled owners found, skipping token deletion");
            return tally;
        }

        info!(total = queue.len(), "START: deleting orphaned tokens");
        for (i, item) in queue.iter().enumerate() {
            info!(
                serial = %item.serial,
                progress = %format!("{}/{}", i + 1, queue.len()),
                "Deleting token"
            );
            let outcome = match self.inventory.delete(&item.serial).await {
                Ok(()) => RemediationOutcome::Succeeded,
                Err(e) => {
                    error!(serial = %item.serial, error = %e, "Failed to delete token, continuing");
                    RemediationOutcome::Failed(e.to_string())
                }
            };
            tally.record(&outcome);
        }
        info!(
            succeeded = tally.succeeded,
            total = tally.attempted,
            "DONE: deleting orphaned tokens"
        );
        tally
    }

    /// Per-item loop: one item's failure never blocks the rest.
    async fn grant_access(&self, queue: &[ActiveOwner]) -> RemediationTally {
        let mut tally = RemediationTally::default();
        if queue.is_empty() {
            warn!("No active owners found, skipping group grants");
            return tally;
        }

        info!(total = queue.len(), "START: adding active owners to the remote access group");
        for (i, item) in queue.iter().enumerate() {
            info!(
                owner = %item.account,
                progress = %format!("{}/{}", i + 1, queue.len()),
                "Granting group membership"
            );
            let outcome = match self
                .directory
                .add_group_member(&self.remote_access_group, &item.dn)
                .await
            {
                Ok(()) => RemediationOutcome::Succeeded,
                Err(e) => {
                    error!(owner = %item.account, error = %e, "Failed to grant membership, continuing");
                    RemediationOutcome::Failed(e.to_string())
                }
            };
            tally.record(&outcome);
        }
        info!(
            succeeded = tally.succeeded,
            total = tally.attempted,
            "DONE: adding active owners to the remote access group"
        );
        tally
    }

    async fn emit_reports(&self, report: &RunReport) {
        for r in build_reports(report) {
            self.emit(&r).await;
        }
    }

    /// Delivery failures are logged and swallowed; reporting never aborts
    /// a run.
    async fn emit(&self, report: &Report) {
        if let Err(e) = self.sink.send(report).await {
            error!(
                kind = report.kind.as_str(),
                error = %e,
                "Failed to deliver report, continuing"
            );
        }
    }
}
