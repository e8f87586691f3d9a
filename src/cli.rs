//! Command-line interface definitions using clap

use crate::models::naval::{RelayState, UserRole};
use crate::i18n::Language;
use crate::sensor_data::LogSeverity;
use crate::settings::Theme;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Operator console for the naval systems simulation
#[derive(Parser, Debug)]
#[command(name = "naval-console")]
#[command(version)]
#[command(about = "Monitor vessel systems and inject faults for drills", long_about = None)]
pub struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Override the display language for this run
    #[arg(long, global = true, value_parser = parse_language)]
    pub lang: Option<Language>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PollArgs {
    /// Poll interval in milliseconds (overrides settings and REFRESH_INTERVAL_MS)
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Stop after this many seconds (default: run until killed)
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchView {
    /// Per-sensor values with their recent range
    Simulation,
    /// Relay counts, uptime and alerts per minute
    Dashboard,
}

/// Computed log severity, matching the `[...]` tag in log output
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityArg {
    Normal,
    Warning,
    Critical,
}

impl From<SeverityArg> for LogSeverity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Normal => LogSeverity::Normal,
            SeverityArg::Warning => LogSeverity::Warning,
            SeverityArg::Critical => LogSeverity::Critical,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageArg {
    Dashboard,
    Simulation,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionArg {
    Up,
    Down,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch for relay trips, sensor warnings and attacks; auto-recover tripped relays
    Monitor {
        #[command(flatten)]
        poll: PollArgs,

        /// Also print the simulation view every tick
        #[arg(long)]
        with_view: bool,
    },

    /// Periodically print a live view
    Watch {
        #[arg(value_enum, default_value_t = WatchView::Simulation)]
        view: WatchView,

        #[command(flatten)]
        poll: PollArgs,
    },

    /// List all systems once
    Systems,

    /// Show one system
    System {
        system_id: String,
    },

    /// Show recent logs
    Logs {
        /// Number of logs to fetch
        #[arg(long, default_value_t = 50)]
        limit: u32,

        /// Only abnormal entries
        #[arg(long)]
        abnormal: bool,

        /// Filter by system name or relay state
        #[arg(long)]
        search: Option<String>,

        /// Keep only logs of this severity (applied to the fetched page)
        #[arg(long, value_enum)]
        severity: Option<SeverityArg>,
    },

    /// Interactive log search; one query per line on stdin
    Search {
        #[arg(long, default_value_t = 50)]
        limit: u32,

        #[arg(long)]
        abnormal: bool,

        #[arg(long, value_enum)]
        severity: Option<SeverityArg>,
    },

    /// Inject a relay trip
    Trip {
        system_id: String,

        /// Seconds the fault lasts
        #[arg(long, default_value_t = crate::services::faults::DEFAULT_FAULT_DURATION_SECS)]
        duration: u64,

        /// Source IP to attribute the attack to
        #[arg(long)]
        ip: Option<String>,
    },

    /// Spoof a sensor value for a while
    Spoof {
        system_id: String,
        sensor_id: String,
        #[arg(allow_negative_numbers = true)]
        value: f64,

        #[arg(long, default_value_t = crate::services::faults::DEFAULT_FAULT_DURATION_SECS)]
        duration: u64,

        #[arg(long)]
        ip: Option<String>,
    },

    /// Set a relay state directly
    Relay {
        system_id: String,
        #[arg(value_parser = parse_relay_state)]
        state: RelayState,
    },

    /// Overwrite a sensor value directly
    SetSensor {
        system_id: String,
        sensor_id: String,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },

    /// Simulation backend settings
    BackendConfig {
        #[command(subcommand)]
        action: BackendConfigCommands,
    },

    /// Log in with a roster user
    Login {
        username: String,

        /// Password (if not provided, will prompt interactively)
        #[arg(long)]
        password: Option<String>,

        /// Read password from stdin (for scripting)
        #[arg(long)]
        stdin: bool,
    },

    /// End the current session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Create a regular user and log in as them
    Signup {
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        stdin: bool,
    },

    /// Manage users (admin only for changes)
    Users {
        #[command(subcommand)]
        action: UsersCommands,
    },

    /// Update your own profile
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        change_password: bool,
    },

    /// Local console settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackendConfigCommands {
    /// Print the current backend config
    Show,

    /// Change backend config values
    Set {
        /// Replace the allowed IP list (comma separated; empty string clears it)
        #[arg(long, value_delimiter = ',')]
        valid_ips: Option<Vec<String>>,

        /// Seconds between periodic log entries
        #[arg(long)]
        log_interval: Option<u64>,

        /// Seconds between simulation steps
        #[arg(long)]
        simulation_sleep: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// List the roster
    List,

    /// Change a user's role
    Promote {
        user_id: String,
        #[arg(value_parser = parse_role, default_value = "admin")]
        role: UserRole,
    },

    /// Delete a user
    Delete {
        user_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print the current settings
    Show,

    /// Set the refresh interval in milliseconds
    Interval {
        ms: u64,
    },

    /// Move a system up or down in a page layout
    Move {
        #[arg(value_enum)]
        page: PageArg,
        system_id: String,
        #[arg(value_enum)]
        direction: DirectionArg,
    },

    /// Hide or show a system
    Toggle {
        system_id: String,
    },

    /// Switch theme; toggles when no value is given
    Theme {
        #[arg(value_parser = parse_theme)]
        theme: Option<Theme>,
    },

    /// Set the display language
    Language {
        #[arg(value_parser = parse_language)]
        language: Language,
    },

    /// Restore defaults
    Reset,
}

fn parse_language(s: &str) -> Result<Language, String> {
    s.parse()
}

fn parse_theme(s: &str) -> Result<Theme, String> {
    s.parse()
}

fn parse_relay_state(s: &str) -> Result<RelayState, String> {
    s.parse()
}

fn parse_role(s: &str) -> Result<UserRole, String> {
    s.parse()
}
