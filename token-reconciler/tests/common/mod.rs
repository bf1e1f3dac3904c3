//! Common test utilities for token-reconciler integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use reconciler_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use token_reconciler::models::{RunOutcome, RunReport, TokenSerial};
use token_reconciler::pipeline::Pipeline;
use token_reconciler::services::{
    AuditStore, DirectoryService, MemorySink, TokenInventory,
};

pub const DISABLED_MARKER: &str = "OU=Disabled_Users";
pub const REMOTE_GROUP: &str = "cn=remote-access,ou=groups,dc=example,dc=org";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,token_reconciler=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn staff_dn(account: &str) -> String {
    format!("CN={},OU=Staff,DC=example,DC=org", account)
}

pub fn disabled_dn(account: &str) -> String {
    format!("CN={},OU=Disabled_Users,DC=example,DC=org", account)
}

// ============================================================================
// Fakes
// ============================================================================

pub struct FakeInventory {
    serials: Vec<String>,
    fail_list: bool,
    fail_deletes: Vec<String>,
    delete_attempts: Mutex<Vec<String>>,
}

impl FakeInventory {
    pub fn with_serials(serials: &[&str]) -> Self {
        Self {
            serials: serials.iter().map(|s| s.to_string()).collect(),
            fail_list: false,
            fail_deletes: Vec::new(),
            delete_attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::with_serials(&[])
    }

    pub fn failing_list() -> Self {
        Self {
            fail_list: true,
            ..Self::empty()
        }
    }

    pub fn fail_delete_of(mut self, serial: &str) -> Self {
        self.fail_deletes.push(serial.to_string());
        self
    }

    /// Every delete invocation, in order, successes and failures alike.
    pub fn delete_attempts(&self) -> Vec<String> {
        self.delete_attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenInventory for FakeInventory {
    async fn list_orphaned(&self) -> Result<Vec<TokenSerial>, AppError> {
        if self.fail_list {
            return Err(AppError::InventoryToolMissing(
                "privacyidea-token-janitor".to_string(),
            ));
        }
        Ok(self.serials.iter().map(TokenSerial::new).collect())
    }

    async fn delete(&self, serial: &TokenSerial) -> Result<(), AppError> {
        self.delete_attempts
            .lock()
            .unwrap()
            .push(serial.as_str().to_string());
        if self.fail_deletes.iter().any(|s| s == serial.as_str()) {
            return Err(AppError::InventoryError(anyhow::anyhow!(
                "delete of {} failed",
                serial
            )));
        }
        Ok(())
    }
}

pub struct FakeAudit {
    owners: HashMap<String, String>,
    fail: bool,
    lookups: AtomicUsize,
}

impl FakeAudit {
    /// `(serial, raw owner value)` pairs, exactly as the audit store would
    /// return them. An absent serial resolves to no owner at all.
    pub fn with_owners(owners: &[(&str, &str)]) -> Self {
        Self {
            owners: owners
                .iter()
                .map(|(s, o)| (s.to_string(), o.to_string()))
                .collect(),
            fail: false,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_owners(&[])
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditStore for FakeAudit {
    async fn owner_of(&self, serial: &TokenSerial) -> Result<Option<String>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::AuditStoreError(anyhow::anyhow!(
                "cannot connect to audit database"
            )));
        }
        Ok(self.owners.get(serial.as_str()).cloned())
    }
}

pub struct FakeDirectory {
    entries: HashMap<String, Vec<String>>,
    fail_lookup: bool,
    fail_grants: Vec<String>,
    lookups: Mutex<Vec<String>>,
    grant_attempts: Mutex<Vec<(String, String)>>,
    closed: AtomicBool,
}

impl FakeDirectory {
    /// `(account, dns)` pairs; an absent account yields an empty result.
    pub fn with_entries(entries: &[(&str, &[&str])]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(a, dns)| {
                    (
                        a.to_string(),
                        dns.iter().map(|d| d.to_string()).collect(),
                    )
                })
                .collect(),
            fail_lookup: false,
            fail_grants: Vec::new(),
            lookups: Mutex::new(Vec::new()),
            grant_attempts: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn empty() -> Self {
        Self::with_entries(&[])
    }

    pub fn failing_lookup() -> Self {
        Self {
            fail_lookup: true,
            ..Self::empty()
        }
    }

    pub fn fail_grant_of(mut self, dn: &str) -> Self {
        self.fail_grants.push(dn.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    /// Every grant invocation as `(group, member dn)`, in order.
    pub fn grant_attempts(&self) -> Vec<(String, String)> {
        self.grant_attempts.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryService for FakeDirectory {
    async fn find_account(
        &self,
        account: &token_reconciler::models::OwnerAccount,
    ) -> Result<Vec<String>, AppError> {
        self.lookups
            .lock()
            .unwrap()
            .push(account.as_str().to_string());
        if self.fail_lookup {
            return Err(AppError::DirectoryError(anyhow::anyhow!(
                "directory search failed"
            )));
        }
        Ok(self.entries.get(account.as_str()).cloned().unwrap_or_default())
    }

    async fn add_group_member(&self, group_dn: &str, member_dn: &str) -> Result<(), AppError> {
        self.grant_attempts
            .lock()
            .unwrap()
            .push((group_dn.to_string(), member_dn.to_string()));
        if self.fail_grants.iter().any(|d| d == member_dn) {
            return Err(AppError::DirectoryError(anyhow::anyhow!(
                "insufficient access adding {}",
                member_dn
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct TestHarness {
    pub inventory: Arc<FakeInventory>,
    pub audit: Arc<FakeAudit>,
    pub directory: Arc<FakeDirectory>,
    pub sink: Arc<MemorySink>,
}

impl TestHarness {
    pub fn new(inventory: FakeInventory, audit: FakeAudit, directory: FakeDirectory) -> Self {
        init_tracing();
        Self {
            inventory: Arc::new(inventory),
            audit: Arc::new(audit),
            directory: Arc::new(directory),
            sink: Arc::new(MemorySink::new()),
        }
    }

    pub fn with_sink(mut self, sink: MemorySink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub async fn run(&self) -> (RunOutcome, RunReport) {
        let pipeline = Pipeline::new(
            self.inventory.clone(),
            self.audit.clone(),
            self.directory.clone(),
            self.sink.clone(),
            DISABLED_MARKER.to_string(),
            REMOTE_GROUP.to_string(),
        );
        pipeline.run().await
    }
}
