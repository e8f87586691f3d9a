//! Minimal runtime configuration helpers.
//! Defaults align with the simulation's docker-compose (backend on localhost:8000).

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STATE_DIR: &str = ".naval-console";
pub const DEFAULT_AUTO_RECOVERY_SECS: u64 = 5;
pub const DEFAULT_ATTACK_COOLDOWN_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend gateway serving `/api/...`.
    pub api_url: String,
    pub http_timeout: Duration,
    /// Overrides the persisted refresh interval when set.
    pub refresh_interval: Option<Duration>,
    /// Where settings, session and roster cache live.
    pub state_dir: PathBuf,
    /// Delay before a tripped relay is switched back ON; `None` disables it.
    pub auto_recovery: Option<Duration>,
    pub attack_alert_cooldown: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            refresh_interval: None,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            auto_recovery: Some(Duration::from_secs(DEFAULT_AUTO_RECOVERY_SECS)),
            attack_alert_cooldown: Duration::from_secs(DEFAULT_ATTACK_COOLDOWN_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let api_url = get("NAVAL_API_URL").unwrap_or(defaults.api_url);
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(format!("NAVAL_API_URL must start with http:// or https:// (got '{}')", api_url));
        }

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(s) => match s.parse::<u64>() {
                Ok(0) | Err(_) => return Err("HTTP_TIMEOUT_SECS must be a positive integer".to_string()),
                Ok(n) => Duration::from_secs(n),
            },
            None => defaults.http_timeout,
        };

        let refresh_interval = match get("REFRESH_INTERVAL_MS") {
            Some(s) => match s.parse::<u64>() {
                Ok(n) if n >= 100 => Some(Duration::from_millis(n)),
                _ => return Err("REFRESH_INTERVAL_MS must be an integer >= 100".to_string()),
            },
            None => None,
        };

        let state_dir = get("NAVAL_STATE_DIR").map(PathBuf::from).unwrap_or(defaults.state_dir);

        let auto_recovery = match get("AUTO_RECOVERY_SECS") {
            Some(s) => match s.parse::<u64>() {
                Ok(0) => None,
                Ok(n) => Some(Duration::from_secs(n)),
                Err(_) => return Err("AUTO_RECOVERY_SECS must be a non-negative integer".to_string()),
            },
            None => defaults.auto_recovery,
        };

        let attack_alert_cooldown = get("ATTACK_ALERT_COOLDOWN_SECS")
            .map(|s| {
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| "ATTACK_ALERT_COOLDOWN_SECS must be a non-negative integer".to_string())
            })
            .transpose()?
            .unwrap_or(defaults.attack_alert_cooldown);

        Ok(Config {
            api_url,
            http_timeout,
            refresh_interval,
            state_dir,
            auto_recovery,
            attack_alert_cooldown,
        })
    }
}
