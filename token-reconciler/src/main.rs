//! Token Reconciler entry point.

use reconciler_core::observability::init_tracing;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use token_reconciler::config::ReconcilerConfig;
use token_reconciler::housekeeping::Housekeeping;
use token_reconciler::models::RunOutcome;
use token_reconciler::pipeline::Pipeline;
use token_reconciler::services::{
    fatal_report, service_is_active, JanitorCli, LdapDirectory, MySqlAuditStore, ReportSink,
    SmtpReportSink,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match ReconcilerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::from(RunOutcome::StageFatal.exit_code());
        }
    };

    // Initialize logging into today's log file
    let log_path = match init_tracing(
        &config.service_name,
        &config.log_level,
        &config.common.log_dir,
    ) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(RunOutcome::StageFatal.exit_code());
        }
    };

    let run_id = Uuid::new_v4();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        run_id = %run_id,
        started_at = %chrono::Local::now().format("%d/%m/%Y %H:%M:%S"),
        log_file = %log_path.display(),
        "Starting token-reconciler run"
    );

    // Log configuration (mask sensitive values)
    tracing::info!(
        service_name = %config.service_name,
        required_service = %config.required_service,
        inventory_tool = %config.inventory.binary.display(),
        db_max_connections = %config.audit_db.max_connections,
        ldap_url = %config.directory.url,
        ldap_search_root = %config.directory.search_root,
        remote_access_group = %config.directory.remote_access_group,
        smtp_enabled = %config.smtp.enabled,
        logs_to_keep = %config.common.logs_to_keep,
        "Configuration loaded"
    );

    let housekeeping = Housekeeping::begin(
        config.common.log_dir.clone(),
        config.common.logs_to_keep,
    );

    // Liveness precondition: only the node running the gated service
    // should reconcile tokens.
    if !service_is_active(&config.required_service).await {
        tracing::warn!(
            unit = %config.required_service,
            "Required service is not active on this node, finishing job"
        );
        return housekeeping.finish(RunOutcome::ServiceInactive);
    }

    let sink: Arc<dyn ReportSink> = match SmtpReportSink::new(config.smtp.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, "Failed to configure report sink");
            return housekeeping.finish(RunOutcome::StageFatal);
        }
    };

    let audit = match MySqlAuditStore::new(&config.audit_db.url, config.audit_db.max_connections)
    {
        Ok(a) => Arc::new(a),
        Err(e) => {
            tracing::error!(error = %e, "Failed to configure audit store");
            if let Err(send_err) = sink.send(&fatal_report(&e)).await {
                tracing::error!(error = %send_err, "Failed to deliver fatal report");
            }
            return housekeeping.finish(RunOutcome::StageFatal);
        }
    };

    let inventory = Arc::new(JanitorCli::new(
        config.inventory.binary.clone(),
        Duration::from_secs(config.inventory.timeout_secs),
    ));
    let directory = Arc::new(LdapDirectory::new(config.directory.clone()));

    let pipeline = Pipeline::new(
        inventory,
        audit,
        directory,
        sink,
        config.directory.disabled_marker.clone(),
        config.directory.remote_access_group.clone(),
    );

    let (outcome, report) = pipeline.run().await;

    tracing::info!(
        deletions_succeeded = report.deletions.succeeded,
        deletions_attempted = report.deletions.attempted,
        grants_succeeded = report.grants.succeeded,
        grants_attempted = report.grants.attempted,
        unresolved_owners = report.unresolved_owners.len(),
        not_found_in_directory = report.not_found_in_directory.len(),
        "Run summary"
    );

    housekeeping.finish(outcome)
}
