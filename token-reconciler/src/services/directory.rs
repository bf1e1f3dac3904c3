//! Directory-service session: account lookups, classification, group grants.

use crate::config::DirectoryConfig;
use crate::models::{DirectoryVerdict, OwnerAccount};
use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, Mod, Scope, SearchEntry};
use reconciler_core::error::AppError;
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::info;

#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Distinguished names of directory entries matching the account,
    /// in the order the server returned them.
    async fn find_account(&self, account: &OwnerAccount) -> Result<Vec<String>, AppError>;

    async fn add_group_member(&self, group_dn: &str, member_dn: &str) -> Result<(), AppError>;

    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Classify a lookup result against the disabled-accounts container marker.
/// Only the first entry is inspected; the directory is assumed to hold at
/// most one entry per account name.
pub fn classify(dns: &[String], disabled_marker: &str) -> DirectoryVerdict {
    match dns.first() {
        None => DirectoryVerdict::NotFound,
        Some(dn) if dn.contains(disabled_marker) => DirectoryVerdict::Disabled { dn: dn.clone() },
        Some(dn) => DirectoryVerdict::Active { dn: dn.clone() },
    }
}

/// LDAP directory client. One authenticated session is bound at first use
/// and reused for every search and the group mutation of the batch.
pub struct LdapDirectory {
    config: DirectoryConfig,
    session: Mutex<Option<Ldap>>,
}

impl LdapDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    async fn session(&self) -> Result<Ldap, AppError> {
        let mut guard = self.session.lock().await;
        if let Some(ldap) = guard.as_ref() {
            return Ok(ldap.clone());
        }

        info!(url = %self.config.url, bind_dn = %self.config.bind_dn, "Binding to directory");
        let (conn, mut ldap) = LdapConnAsync::new(&self.config.url)
            .await
            .map_err(|e| AppError::DirectoryError(anyhow::anyhow!("connect failed: {}", e)))?;
        ldap3::drive!(conn);

        ldap.simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| AppError::DirectoryError(anyhow::anyhow!("bind failed: {}", e)))?
            .success()
            .map_err(|e| AppError::DirectoryError(anyhow::anyhow!("bind rejected: {}", e)))?;
        info!("Directory bind established");

        *guard = Some(ldap.clone());
        Ok(ldap)
    }
}

#[async_trait]
impl DirectoryService for LdapDirectory {
    async fn find_account(&self, account: &OwnerAccount) -> Result<Vec<String>, AppError> {
        let mut ldap = self.session().await?;

        let filter = format!(
            "(&(objectclass=user)(sAMAccountName={}))",
            ldap_escape(account.as_str())
        );
        let (entries, _res) = ldap
            .search(
                &self.config.search_root,
                Scope::Subtree,
                &filter,
                vec!["distinguishedName"],
            )
            .await?
            .success()?;

        Ok(entries
            .into_iter()
            .map(|e| SearchEntry::construct(e).dn)
            .collect())
    }

    async fn add_group_member(&self, group_dn: &str, member_dn: &str) -> Result<(), AppError> {
        let mut ldap = self.session().await?;

        ldap.modify(
            group_dn,
            vec![Mod::Add("member", HashSet::from([member_dn]))],
        )
        .await?
        .success()
        .map_err(|e| {
            AppError::DirectoryError(anyhow::anyhow!(
                "adding {} to {} failed: {}",
                member_dn,
                group_dn,
                e
            ))
        })?;
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        let mut guard = self.session.lock().await;
        if let Some(mut ldap) = guard.take() {
            ldap.unbind().await.ok();
            info!("Directory session closed");
        }
        Ok(())
    }
}
