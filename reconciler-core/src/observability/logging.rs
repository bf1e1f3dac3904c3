use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Open today's log file in append mode and install the global subscriber
/// writing to it. One file per calendar day: `<app_name>_DD-MM-YYYY.log`.
///
/// The log file is the only user-visible output channel of the pipeline, so
/// this must be called before any stage runs. Returns the path of the file
/// for the run banner.
pub fn init_tracing(app_name: &str, log_level: &str, log_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;

    let path = log_dir.join(daily_log_name(app_name));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(path)
}

/// Build today's log file name without touching the filesystem.
pub fn daily_log_name(app_name: &str) -> String {
    format!("{}_{}.log", app_name, Local::now().format("%d-%m-%Y"))
}
