pub mod models {
    pub mod naval;
}

pub mod alerts;
pub mod app;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod debounce;
pub mod history;
pub mod i18n;
pub mod notifications;
pub mod sensor_data;
pub mod settings;
pub mod storage;
pub mod services {
    pub mod dashboard;
    pub mod faults;
    pub mod logs;
    pub mod monitor;
    pub mod poller;
    pub mod simulation;
}

use crate::app::AppContext;
use crate::cli::Cli;
use crate::config::Config;
use clap::Parser;
use log::{debug, error, info};
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

/// An explicit `--env-file` must exist; `./.env` is optional. Variables
/// already present in the process environment win over file values.
fn load_env(explicit: Option<&Path>) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        dotenvy::from_path(path).map_err(|e| format!("failed to load {}: {}", path.display(), e))?;
        return Ok(Some(LoadedEnvFile {
            path: path.to_path_buf(),
            explicit: true,
        }));
    }
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(LoadedEnvFile { path, explicit: false })),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(format!("failed to load .env: {}", e)),
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let cfg = Config::from_env()?;
    debug!(
        "Config loaded (api_url={}, http_timeout={}s, state_dir={}, refresh_override={}, auto_recovery={}, attack_cooldown={}s)",
        cfg.api_url,
        cfg.http_timeout.as_secs(),
        cfg.state_dir.display(),
        cfg.refresh_interval
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "-".to_string()),
        cfg.auto_recovery
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "off".to_string()),
        cfg.attack_alert_cooldown.as_secs()
    );

    let mut ctx = AppContext::new(cfg, cli.lang);
    app::execute(&mut ctx, cli.command)
}

fn main() {
    let cli = Cli::parse();

    let loaded_env = match load_env(cli.env_file.as_deref()) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        debug!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "naval-console {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
