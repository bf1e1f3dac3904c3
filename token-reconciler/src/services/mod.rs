//! Services module for token-reconciler.

pub mod audit;
pub mod directory;
pub mod inventory;
pub mod report;
pub mod systemd;

pub use audit::{AuditStore, MySqlAuditStore};
pub use directory::{classify, DirectoryService, LdapDirectory};
pub use inventory::{parse_orphan_listing, JanitorCli, TokenInventory};
pub use report::{build_reports, fatal_report, MemorySink, Report, ReportSink, SmtpReportSink};
pub use systemd::service_is_active;
