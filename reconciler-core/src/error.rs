use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Inventory tool error: {0}")]
    InventoryError(anyhow::Error),

    #[error("Inventory tool not found: {0}")]
    InventoryToolMissing(String),

    #[error("Audit store error: {0}")]
    AuditStoreError(anyhow::Error),

    #[error("Directory error: {0}")]
    DirectoryError(anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::AuditStoreError(anyhow::Error::new(err))
    }
}

impl From<ldap3::LdapError> for AppError {
    fn from(err: ldap3::LdapError) -> Self {
        AppError::DirectoryError(anyhow::Error::new(err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::EmailError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}
