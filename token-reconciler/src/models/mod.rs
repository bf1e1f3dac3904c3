//! Domain models for token-reconciler.

use serde::Serialize;
use std::fmt;

// ============================================================================
// Token & Owner Models
// ============================================================================

/// Opaque serial of a soft token, as printed by the inventory tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TokenSerial(String);

impl TokenSerial {
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account name of a token owner, lowercased so directory lookups and
/// grouping are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OwnerAccount(String);

impl OwnerAccount {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A token together with its resolved owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedToken {
    pub serial: TokenSerial,
    pub owner: OwnerAccount,
}

// ============================================================================
// Stage Results
// ============================================================================

/// Output of the ownership-resolution stage. Serials with no usable owner
/// are terminal at this point and never reach classification.
#[derive(Debug, Default)]
pub struct OwnershipResolution {
    pub owned: Vec<OwnedToken>,
    pub unresolved: Vec<TokenSerial>,
}

/// Outcome of one directory lookup for an owner account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryVerdict {
    Disabled { dn: String },
    Active { dn: String },
    NotFound,
}

/// A token whose owner sits in the disabled-accounts container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledToken {
    pub serial: TokenSerial,
    pub owner: OwnerAccount,
    pub dn: String,
}

/// An owner confirmed active in the directory, keyed by distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveOwner {
    pub account: OwnerAccount,
    pub dn: String,
}

/// Output of the directory-classification stage. The three buckets are
/// disjoint; together they cover every owner that reached this stage.
#[derive(Debug, Default)]
pub struct Classification {
    pub to_delete: Vec<DisabledToken>,
    pub to_grant: Vec<ActiveOwner>,
    pub not_found: Vec<NotFoundOwner>,
}

/// Owner missing from the directory, with the serials that led to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotFoundOwner {
    pub owner: OwnerAccount,
    pub serials: Vec<TokenSerial>,
}

// ============================================================================
// Remediation Models
// ============================================================================

/// Result of a single remediation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    Succeeded,
    Failed(String),
}

/// Attempted/succeeded counters for one remediation loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemediationTally {
    pub attempted: usize,
    pub succeeded: usize,
}

impl RemediationTally {
    pub fn record(&mut self, outcome: &RemediationOutcome) {
        self.attempted += 1;
        if matches!(outcome, RemediationOutcome::Succeeded) {
            self.succeeded += 1;
        }
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// Report accumulator threaded through the stages and flushed once at the
/// reporting step.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub unresolved_owners: Vec<TokenSerial>,
    pub not_found_in_directory: Vec<NotFoundOwner>,
    pub active_owner_dns: Vec<String>,
    pub deletions: RemediationTally,
    pub grants: RemediationTally,
}

/// The fixed set of notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    UnresolvedOwner,
    NotFoundInDirectory,
    ActiveOwnerSummary,
    StageFatalError,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnresolvedOwner => "unresolved-owner",
            Self::NotFoundInDirectory => "not-found-in-directory",
            Self::ActiveOwnerSummary => "active-owner-summary",
            Self::StageFatalError => "stage-fatal-error",
        }
    }

    /// Stage-fatal reports go to the admin list only; everything else is
    /// informational and uses the broad list.
    pub fn is_admin_only(&self) -> bool {
        matches!(self, Self::StageFatalError)
    }
}

// ============================================================================
// Terminal Causes
// ============================================================================

/// How the run ended. Every path funnels through housekeeping, which maps
/// the cause to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    NothingToDo,
    ServiceInactive,
    StageFatal,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::StageFatal => 1,
            Self::NothingToDo => 2,
            Self::ServiceInactive => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::StageFatal => "stage-fatal",
            Self::NothingToDo => "nothing-to-do",
            Self::ServiceInactive => "service-inactive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_account_is_lowercased_and_trimmed() {
        let owner = OwnerAccount::new("  Alice.Smith ");
        assert_eq!(owner.as_str(), "alice.smith");
    }

    #[test]
    fn tally_counts_failures() {
        let mut tally = RemediationTally::default();
        tally.record(&RemediationOutcome::Succeeded);
        tally.record(&RemediationOutcome::Failed("boom".into()));
        tally.record(&RemediationOutcome::Succeeded);
        assert_eq!(tally.attempted, 3);
        assert_eq!(tally.succeeded, 2);
        assert_eq!(tally.failed(), 1);
    }

    #[test]
    fn exit_codes_are_distinct_per_cause() {
        let codes = [
            RunOutcome::Completed.exit_code(),
            RunOutcome::StageFatal.exit_code(),
            RunOutcome::NothingToDo.exit_code(),
            RunOutcome::ServiceInactive.exit_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
