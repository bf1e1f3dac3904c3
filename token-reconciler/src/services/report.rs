//! Report notifications: one email per non-empty report bucket.

use crate::config::SmtpConfig;
use crate::models::{ReportKind, RunReport};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reconciler_core::error::AppError;
use std::sync::Mutex;

/// A single outgoing notification.
#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ReportKind,
    pub subject: String,
    pub body: String,
}

impl Report {
    pub fn new(kind: ReportKind, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Build the end-of-run reports from the accumulated buckets. Empty buckets
/// produce no report.
pub fn build_reports(report: &RunReport) -> Vec<Report> {
    let mut out = Vec::new();

    if !report.unresolved_owners.is_empty() {
        let serials: Vec<&str> = report
            .unresolved_owners
            .iter()
            .map(|s| s.as_str())
            .collect();
        out.push(Report::new(
            ReportKind::UnresolvedOwner,
            format!("[token-reconciler] {} token(s) with no owner", serials.len()),
            format!(
                "No owner could be resolved from audit history for:\n{}\n",
                serials.join("\n")
            ),
        ));
    }

    if !report.not_found_in_directory.is_empty() {
        let body = serde_json::to_string_pretty(&report.not_found_in_directory)
            .unwrap_or_else(|_| format!("{:?}", report.not_found_in_directory));
        out.push(Report::new(
            ReportKind::NotFoundInDirectory,
            format!(
                "[token-reconciler] {} owner(s) missing from directory",
                report.not_found_in_directory.len()
            ),
            body,
        ));
    }

    if !report.active_owner_dns.is_empty() {
        let summary = serde_json::json!({
            "active_owner_dns": report.active_owner_dns,
            "deletions": report.deletions,
            "grants": report.grants,
        });
        out.push(Report::new(
            ReportKind::ActiveOwnerSummary,
            format!(
                "[token-reconciler] {} active owner(s) processed",
                report.active_owner_dns.len()
            ),
            serde_json::to_string_pretty(&summary).unwrap_or_default(),
        ));
    }

    out
}

pub fn fatal_report(error: &AppError) -> Report {
    Report::new(
        ReportKind::StageFatalError,
        "[token-reconciler] run aborted".to_string(),
        format!("The reconciliation run aborted with a fatal error:\n{}\n", error),
    )
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn send(&self, report: &Report) -> Result<(), AppError>;
}

/// SMTP-backed sink. When disabled, reports are written to the log instead
/// so a run without mail configuration still surfaces its findings.
pub struct SmtpReportSink {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpReportSink {
    pub fn new(config: SmtpConfig) -> Result<Self, AppError> {
        if !config.enabled {
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::EmailError(format!("Failed to create SMTP relay: {}", e)))?
            .port(config.port);

        if !config.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            config,
            transport: Some(builder.build()),
        })
    }

    fn recipients_for(&self, kind: ReportKind) -> &[String] {
        if kind.is_admin_only() {
            &self.config.admin_recipients
        } else {
            &self.config.broad_recipients
        }
    }
}

#[async_trait]
impl ReportSink for SmtpReportSink {
    async fn send(&self, report: &Report) -> Result<(), AppError> {
        let recipients = self.recipients_for(report.kind);

        let Some(transport) = self.transport.as_ref() else {
            tracing::info!(
                kind = report.kind.as_str(),
                subject = %report.subject,
                "Email disabled, report follows:\n{}",
                report.body
            );
            return Ok(());
        };

        if recipients.is_empty() {
            return Err(AppError::EmailError(format!(
                "no recipients configured for {} report",
                report.kind.as_str()
            )));
        }

        let from: Mailbox = self
            .config
            .from_email
            .parse()
            .map_err(|e| AppError::EmailError(format!("Invalid from address: {}", e)))?;

        let mut builder = Message::builder().from(from).subject(&report.subject);
        for recipient in recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| AppError::EmailError(format!("Invalid recipient: {}", e)))?;
            builder = builder.to(to);
        }

        let message = builder
            .header(ContentType::TEXT_PLAIN)
            .body(report.body.clone())?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::EmailError(format!("Failed to send report: {}", e)))?;

        tracing::info!(
            kind = report.kind.as_str(),
            recipients = recipients.len(),
            "Report sent"
        );
        Ok(())
    }
}

/// In-memory sink for tests.
pub struct MemorySink {
    sent: Mutex<Vec<Report>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Report> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn send(&self, report: &Report) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::EmailError("sink unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(report.clone());
        tracing::info!(
            kind = report.kind.as_str(),
            subject = %report.subject,
            "[MEMORY] Report recorded"
        );
        Ok(())
    }
}
