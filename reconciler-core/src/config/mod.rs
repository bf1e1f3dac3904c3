use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_logs_to_keep")]
    pub logs_to_keep: usize,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/token-reconciler")
}

fn default_logs_to_keep() -> usize {
    30
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
