//! Blocking HTTP client for the naval simulation backend.
//!
//! - Blocking client using `ureq` (no async).
//! - Uses the wire models in `crate::models::naval`.
//! - Covers the systems, attacks, logs and auth-roster endpoints.
//!
//! Errors are classified into transport, timeout, HTTP status and decode
//! failures so callers can tell a dead backend from a rejected command.

use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::models::naval::*;

#[derive(Debug)]
pub enum ApiError {
    /// Connection refused, DNS failure, broken pipe and friends.
    Transport(String),
    Timeout(String),
    Http { status: u16, message: String },
    Decode { path: String, source: serde_json::Error },
    /// Input rejected before any request was sent.
    Validation(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ApiError::Validation(_)) || matches!(self.status(), Some(400 | 422))
    }

    pub fn is_server(&self) -> bool {
        matches!(self.status(), Some(s) if s >= 500)
    }

    /// Transient failures worth waiting out on the next poll.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Timeout(_))
    }
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ApiError::Transport(s) => write!(f, "transport error: {}", s),
            ApiError::Timeout(s) => write!(f, "request timed out: {}", s),
            ApiError::Http { status, message } => write!(f, "http {}: {}", status, message),
            ApiError::Decode { path, source } => write!(f, "unexpected response at '{}': {}", path, source),
            ApiError::Validation(s) => write!(f, "invalid input: {}", s),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ureq::Error> for ApiError {
    fn from(value: ureq::Error) -> Self {
        match value {
            ureq::Error::Timeout(t) => ApiError::Timeout(t.to_string()),
            ureq::Error::StatusCode(status) => ApiError::Http {
                status,
                message: String::from("<no body>"),
            },
            other => ApiError::Transport(other.to_string()),
        }
    }
}

/// Read side used by poll targets; a seam so they can run against canned data.
pub trait NavalApi {
    fn get_systems(&self) -> Result<Vec<NavalSystem>, ApiError>;
    fn get_logs(&self, query: &LogQuery) -> Result<Vec<SystemLog>, ApiError>;
    fn set_relay_state(&self, system_id: &SystemId, state: RelayState) -> Result<CommandAck, ApiError>;
}

impl<T: NavalApi + ?Sized> NavalApi for &T {
    fn get_systems(&self) -> Result<Vec<NavalSystem>, ApiError> {
        (**self).get_systems()
    }

    fn get_logs(&self, query: &LogQuery) -> Result<Vec<SystemLog>, ApiError> {
        (**self).get_logs(query)
    }

    fn set_relay_state(&self, system_id: &SystemId, state: RelayState) -> Result<CommandAck, ApiError> {
        (**self).set_relay_state(system_id, state)
    }
}

/// Write side used by fault injection and manual overrides.
pub trait FaultApi {
    fn inject_relay_fault(&self, request: &RelayFaultRequest) -> Result<CommandAck, ApiError>;
    fn inject_sensor_attack(&self, request: &SensorAttackRequest) -> Result<CommandAck, ApiError>;
    fn set_relay_state(&self, system_id: &SystemId, state: RelayState) -> Result<CommandAck, ApiError>;
    fn set_sensor_value(&self, system_id: &SystemId, sensor_id: &SensorId, value: f64) -> Result<CommandAck, ApiError>;
}

impl<T: FaultApi + ?Sized> FaultApi for &T {
    fn inject_relay_fault(&self, request: &RelayFaultRequest) -> Result<CommandAck, ApiError> {
        (**self).inject_relay_fault(request)
    }

    fn inject_sensor_attack(&self, request: &SensorAttackRequest) -> Result<CommandAck, ApiError> {
        (**self).inject_sensor_attack(request)
    }

    fn set_relay_state(&self, system_id: &SystemId, state: RelayState) -> Result<CommandAck, ApiError> {
        (**self).set_relay_state(system_id, state)
    }

    fn set_sensor_value(&self, system_id: &SystemId, sensor_id: &SensorId, value: f64) -> Result<CommandAck, ApiError> {
        (**self).set_sensor_value(system_id, sensor_id, value)
    }
}

/// Identity store behind the mock `/api/auth/users` endpoints.
pub trait UserDirectory {
    fn list_users(&self) -> Result<Vec<UserRecord>, ApiError>;
    fn create_user(&self, record: &UserRecord) -> Result<UserRecord, ApiError>;
    fn update_user(&self, user_id: &UserId, update: &UserUpdate) -> Result<UserRecord, ApiError>;
    fn delete_user(&self, user_id: &UserId) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, Copy)]
enum BodyMethod {
    Post,
    Put,
    Patch,
}

#[derive(Clone)]
pub struct NavalClient {
    agent: ureq::Agent,
    base_url: String,
}

impl NavalClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        NavalClient {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn read_response<T: DeserializeOwned>(res: http::Response<ureq::Body>) -> Result<T, ApiError> {
        let status = res.status();
        let body = res.into_body().read_to_string().map_err(ApiError::from)?;
        if !status.is_success() {
            return Err(http_error(status, &body));
        }
        decode_json(&body)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut req = self.agent.get(url.as_str()).header("Accept", "application/json");
        for (k, v) in query {
            req = req.query(k, v);
        }
        let res = req.call()?;
        Self::read_response(res)
    }

    fn put_query(&self, path: &str, query: &[(&str, String)]) -> Result<CommandAck, ApiError> {
        let url = self.url(path);
        let mut req = self.agent.put(url.as_str()).header("Accept", "application/json");
        for (k, v) in query {
            req = req.query(k, v);
        }
        let res = req.send_empty()?;
        Self::read_response::<Option<CommandAck>>(res).map(Option::unwrap_or_default)
    }

    fn send_json<B: Serialize, T: DeserializeOwned>(&self, method: BodyMethod, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        let req = match method {
            BodyMethod::Post => self.agent.post(url.as_str()),
            BodyMethod::Put => self.agent.put(url.as_str()),
            BodyMethod::Patch => self.agent.patch(url.as_str()),
        };
        let res = req.header("Accept", "application/json").send_json(body)?;
        Self::read_response(res)
    }

    pub fn get_systems(&self) -> Result<Vec<NavalSystem>, ApiError> {
        self.get_json("/api/systems/", &[])
    }

    pub fn get_system(&self, system_id: &SystemId) -> Result<NavalSystem, ApiError> {
        self.get_json(&format!("/api/systems/{}", system_id.0), &[])
    }

    pub fn set_relay_state(&self, system_id: &SystemId, state: RelayState) -> Result<CommandAck, ApiError> {
        self.put_query(
            &format!("/api/systems/{}/relay", system_id.0),
            &[("state", state.as_str().to_string())],
        )
    }

    pub fn set_sensor_value(&self, system_id: &SystemId, sensor_id: &SensorId, value: f64) -> Result<CommandAck, ApiError> {
        self.put_query(
            &format!("/api/systems/{}/sensors/{}", system_id.0, sensor_id.0),
            &[("value", value.to_string())],
        )
    }

    pub fn get_backend_config(&self) -> Result<BackendConfig, ApiError> {
        self.get_json("/api/systems/config", &[])
    }

    pub fn update_backend_config(&self, update: &BackendConfigUpdate) -> Result<BackendConfig, ApiError> {
        self.send_json(BodyMethod::Patch, "/api/systems/config", update)
    }

    pub fn inject_relay_fault(&self, request: &RelayFaultRequest) -> Result<CommandAck, ApiError> {
        self.send_json::<_, Option<CommandAck>>(BodyMethod::Post, "/api/attacks/relay", request)
            .map(Option::unwrap_or_default)
    }

    pub fn inject_sensor_attack(&self, request: &SensorAttackRequest) -> Result<CommandAck, ApiError> {
        self.send_json::<_, Option<CommandAck>>(BodyMethod::Post, "/api/attacks/sensor", request)
            .map(Option::unwrap_or_default)
    }

    pub fn get_logs(&self, query: &LogQuery) -> Result<Vec<SystemLog>, ApiError> {
        self.get_json("/api/logs/", &query.to_pairs())
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        self.get_json("/api/auth/users", &[])
    }

    pub fn create_user(&self, record: &UserRecord) -> Result<UserRecord, ApiError> {
        self.send_json(BodyMethod::Post, "/api/auth/users", record)
    }

    pub fn update_user(&self, user_id: &UserId, update: &UserUpdate) -> Result<UserRecord, ApiError> {
        self.send_json(BodyMethod::Put, &format!("/api/auth/users/{}", user_id.0), update)
    }

    pub fn delete_user(&self, user_id: &UserId) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/auth/users/{}", user_id.0));
        let res = self.agent.delete(url.as_str()).call()?;
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let body = res.into_body().read_to_string().unwrap_or_default();
        Err(http_error(status, &body))
    }
}

impl NavalApi for NavalClient {
    fn get_systems(&self) -> Result<Vec<NavalSystem>, ApiError> {
        NavalClient::get_systems(self)
    }

    fn get_logs(&self, query: &LogQuery) -> Result<Vec<SystemLog>, ApiError> {
        NavalClient::get_logs(self, query)
    }

    fn set_relay_state(&self, system_id: &SystemId, state: RelayState) -> Result<CommandAck, ApiError> {
        NavalClient::set_relay_state(self, system_id, state)
    }
}

impl FaultApi for NavalClient {
    fn inject_relay_fault(&self, request: &RelayFaultRequest) -> Result<CommandAck, ApiError> {
        NavalClient::inject_relay_fault(self, request)
    }

    fn inject_sensor_attack(&self, request: &SensorAttackRequest) -> Result<CommandAck, ApiError> {
        NavalClient::inject_sensor_attack(self, request)
    }

    fn set_relay_state(&self, system_id: &SystemId, state: RelayState) -> Result<CommandAck, ApiError> {
        NavalClient::set_relay_state(self, system_id, state)
    }

    fn set_sensor_value(&self, system_id: &SystemId, sensor_id: &SensorId, value: f64) -> Result<CommandAck, ApiError> {
        NavalClient::set_sensor_value(self, system_id, sensor_id, value)
    }
}

impl UserDirectory for NavalClient {
    fn list_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        NavalClient::list_users(self)
    }

    fn create_user(&self, record: &UserRecord) -> Result<UserRecord, ApiError> {
        NavalClient::create_user(self, record)
    }

    fn update_user(&self, user_id: &UserId, update: &UserUpdate) -> Result<UserRecord, ApiError> {
        NavalClient::update_user(self, user_id, update)
    }

    fn delete_user(&self, user_id: &UserId) -> Result<(), ApiError> {
        NavalClient::delete_user(self, user_id)
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Decode a JSON body, reporting the path of the first mismatching field.
pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    // Command endpoints may answer with an empty body
    let body = if body.trim().is_empty() { "null" } else { body };
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de).map_err(|e| ApiError::Decode {
        path: e.path().to_string(),
        source: e.into_inner(),
    })
}

/// Build an HTTP error, preferring FastAPI's `{"detail": ...}` message.
fn http_error(status: StatusCode, body: &str) -> ApiError {
    #[derive(serde::Deserialize)]
    struct Detail {
        detail: serde_json::Value,
    }
    let message = match serde_json::from_str::<Detail>(body) {
        Ok(Detail {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(Detail { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => status.canonical_reason().unwrap_or("<no body>").to_string(),
        Err(_) => body.trim().to_string(),
    };
    ApiError::Http {
        status: status.as_u16(),
        message,
    }
}
