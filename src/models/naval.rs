//! Wire models for the naval simulation backend.
//!
//! Scope: types only. The backend owns every value here; the console mirrors
//! what it receives and never computes relay states itself.
//!
//! Notes
//! - Enum values travel upper-case (`ON`, `OFF`, `TRIPPED`).
//! - Log timestamps are UTC; the backend may omit the `Z` suffix.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =====================
// Scalar ID newtype wrappers
// =====================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub i64);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =====================
// Core enums
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayState {
    On,
    Off,
    Tripped,
}

impl RelayState {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayState::On => "ON",
            RelayState::Off => "OFF",
            RelayState::Tripped => "TRIPPED",
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ON" => Ok(RelayState::On),
            "OFF" => Ok(RelayState::Off),
            "TRIPPED" => Ok(RelayState::Tripped),
            other => Err(format!("unknown relay state '{other}' (expected ON, OFF or TRIPPED)")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => f.write_str("admin"),
            UserRole::User => f.write_str("user"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            other => Err(format!("unknown role '{other}' (expected admin or user)")),
        }
    }
}

// =====================
// Systems
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relay {
    pub id: String,
    pub state: RelayState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryPoint>>,
}

impl Sensor {
    /// Value at which a reading is considered close to its safe limit.
    pub fn warning_threshold(&self) -> Option<f64> {
        self.safe_max.filter(|max| *max != 0.0).map(|max| max * WARNING_RATIO)
    }
}

/// Fraction of `safe_max` that marks the start of the warning band.
pub const WARNING_RATIO: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavalSystem {
    pub id: SystemId,
    pub name: String,
    pub relay: Relay,
    #[serde(default)]
    pub sensors: Vec<Sensor>,
}

impl NavalSystem {
    pub fn sensor(&self, id: &SensorId) -> Option<&Sensor> {
        self.sensors.iter().find(|s| &s.id == id)
    }
}

/// Simulation tunables exposed at `/api/systems/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub valid_ips: Vec<String>,
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,
    #[serde(default = "default_simulation_sleep")]
    pub simulation_sleep: f64,
}

fn default_log_interval() -> u64 {
    20
}

fn default_simulation_sleep() -> f64 {
    1.0
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            valid_ips: Vec::new(),
            log_interval: default_log_interval(),
            simulation_sleep: default_simulation_sleep(),
        }
    }
}

/// Partial update for `PATCH /api/systems/config`; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackendConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_ips: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation_sleep: Option<f64>,
}

impl BackendConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.valid_ips.is_none() && self.log_interval.is_none() && self.simulation_sleep.is_none()
    }
}

// =====================
// Fault injection
// =====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayFaultRequest {
    pub system_id: SystemId,
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorAttackRequest {
    pub system_id: SystemId,
    pub sensor_id: SensorId,
    pub value: f64,
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated_ip: Option<String>,
}

/// Acknowledgement body returned by command endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommandAck {
    #[serde(default)]
    pub message: Option<String>,
}

// =====================
// Logs
// =====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemLog {
    pub id: LogId,
    #[serde(deserialize_with = "deserialize_utc_lenient")]
    pub timestamp: DateTime<Utc>,
    pub system_id: SystemId,
    pub system_name: String,
    pub relay_state: String,
    /// Opaque JSON; see `crate::sensor_data::parse_sensor_data`.
    pub sensor_data: String,
    #[serde(default)]
    pub is_abnormal: bool,
    #[serde(default)]
    pub is_attack: bool,
    #[serde(default)]
    pub source_ip: Option<String>,
}

/// Query parameters for `GET /api/logs/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub limit: u32,
    pub abnormal_only: bool,
    pub search: Option<String>,
}

impl Default for LogQuery {
    fn default() -> Self {
        LogQuery {
            limit: 50,
            abnormal_only: false,
            search: None,
        }
    }
}

impl LogQuery {
    pub fn recent(limit: u32) -> Self {
        LogQuery {
            limit,
            ..LogQuery::default()
        }
    }

    pub fn abnormal(limit: u32) -> Self {
        LogQuery {
            limit,
            abnormal_only: true,
            search: None,
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("limit", self.limit.to_string()),
            ("abnormal_only", self.abnormal_only.to_string()),
        ];
        if let Some(s) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            q.push(("search", s.to_string()));
        }
        q
    }
}

fn deserialize_utc_lenient<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_utc_lenient(&raw).map_err(serde::de::Error::custom)
}

/// Parse an RFC 3339 timestamp, treating values without an offset as UTC.
pub fn parse_utc_lenient(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}

// =====================
// Users
// =====================

/// Public profile; this is what a session holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Roster entry as served by `/api/auth/users`, password material included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(flatten)]
    pub profile: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Partial update for `PUT /api/auth/users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserUpdate {
    /// Apply the non-secret fields to a profile.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = Some(avatar.clone());
        }
    }
}

/// Per-system rolling sample used by the simulation view: sensor id -> value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSample {
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<SensorId, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn load_systems_fixture() -> Vec<NavalSystem> {
        let json = std::fs::read_to_string("tests/data/systems.json").expect("fixture present");
        serde_json::from_str(&json).expect("parse systems")
    }

    #[test]
    fn parses_systems_fixture() {
        let systems = load_systems_fixture();
        assert_eq!(systems.len(), 6);
        let engine = &systems[0];
        assert_eq!(engine.id, SystemId("sys_main_engine".into()));
        assert_eq!(engine.relay.state, RelayState::On);
        let temp = engine.sensor(&SensorId("sens_eng_temp".into())).expect("engine temp");
        assert_eq!(temp.sensor_type, "TEMPERATURE");
        assert_eq!(temp.safe_max, Some(95.0));
        assert!((temp.warning_threshold().unwrap() - 85.5).abs() < 1e-9);
    }

    #[test]
    fn log_timestamp_without_offset_is_utc() {
        let json = r#"{
            "id": 7,
            "timestamp": "2025-03-01T10:15:30.250000",
            "system_id": "sys_radar",
            "system_name": "Radar Banda-X",
            "relay_state": "ON",
            "sensor_data": "[]",
            "is_abnormal": false
        }"#;
        let log: SystemLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.id, LogId(7));
        assert!(!log.is_attack);
        assert_eq!(log.source_ip, None);
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 30).unwrap() + chrono::Duration::milliseconds(250);
        assert_eq!(log.timestamp, expected);
    }

    #[test]
    fn relay_state_parses_case_insensitively() {
        assert_eq!("tripped".parse::<RelayState>(), Ok(RelayState::Tripped));
        assert_eq!(" On ".parse::<RelayState>(), Ok(RelayState::On));
        assert!("BROKEN".parse::<RelayState>().is_err());
        assert_eq!(serde_json::to_string(&RelayState::Off).unwrap(), "\"OFF\"");
    }

    #[test]
    fn log_query_omits_blank_search() {
        let mut q = LogQuery::abnormal(5);
        q.search = Some("   ".into());
        let pairs = q.to_pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], ("abnormal_only", "true".to_string()));

        q.search = Some(" Radar ".into());
        assert_eq!(q.to_pairs()[2], ("search", "Radar".to_string()));
    }

    #[test]
    fn roster_record_keeps_password_separate() {
        let json = r#"{"id":"1","username":"admin","password":"password123","name":"Admin",
                       "email":"admin@navalsec.com","role":"admin","avatar":"https://example.org/a.svg"}"#;
        let record: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.password.as_deref(), Some("password123"));
        assert_eq!(record.profile.role, UserRole::Admin);
        let public = serde_json::to_value(&record.profile).unwrap();
        assert!(public.get("password").is_none());
    }

    #[test]
    fn fault_requests_skip_missing_ip() {
        let req = RelayFaultRequest {
            system_id: SystemId("sys_radar".into()),
            duration: 10,
            simulated_ip: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"system_id": "sys_radar", "duration": 10})
        );
    }
}
