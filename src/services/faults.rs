//! Fault injection and manual overrides. Requests are validated locally
//! before anything is sent; the outcome is only the backend's message, the
//! next poll shows the actual effect.

use crate::client::{ApiError, FaultApi};
use crate::models::naval::{CommandAck, RelayFaultRequest, RelayState, SensorAttackRequest, SensorId, SystemId};
use log::info;
use std::net::IpAddr;

pub const DEFAULT_FAULT_DURATION_SECS: u64 = 10;

fn require_id(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn require_duration(duration: u64) -> Result<u64, ApiError> {
    if duration < 1 {
        return Err(ApiError::Validation("duration must be at least 1 second".into()));
    }
    Ok(duration)
}

fn require_value(value: f64) -> Result<f64, ApiError> {
    if !value.is_finite() {
        return Err(ApiError::Validation(format!("value must be a finite number, got {}", value)));
    }
    Ok(value)
}

fn optional_ip(ip: Option<&str>) -> Result<Option<String>, ApiError> {
    match ip.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<IpAddr>()
            .map(|addr| Some(addr.to_string()))
            .map_err(|_| ApiError::Validation(format!("'{}' is not a valid IP address", raw))),
    }
}

pub fn relay_fault_request(system_id: &str, duration: u64, simulated_ip: Option<&str>) -> Result<RelayFaultRequest, ApiError> {
    Ok(RelayFaultRequest {
        system_id: SystemId(require_id("system id", system_id)?),
        duration: require_duration(duration)?,
        simulated_ip: optional_ip(simulated_ip)?,
    })
}

pub fn sensor_attack_request(
    system_id: &str,
    sensor_id: &str,
    value: f64,
    duration: u64,
    simulated_ip: Option<&str>,
) -> Result<SensorAttackRequest, ApiError> {
    Ok(SensorAttackRequest {
        system_id: SystemId(require_id("system id", system_id)?),
        sensor_id: SensorId(require_id("sensor id", sensor_id)?),
        value: require_value(value)?,
        duration: require_duration(duration)?,
        simulated_ip: optional_ip(simulated_ip)?,
    })
}

fn ack_message(ack: CommandAck, fallback: String) -> String {
    ack.message.filter(|m| !m.trim().is_empty()).unwrap_or(fallback)
}

pub fn inject_relay_fault<A: FaultApi>(api: &A, request: &RelayFaultRequest) -> Result<String, ApiError> {
    info!(
        "Injecting relay fault on {} for {}s (ip {})",
        request.system_id,
        request.duration,
        request.simulated_ip.as_deref().unwrap_or("-")
    );
    let ack = api.inject_relay_fault(request)?;
    Ok(ack_message(
        ack,
        format!("relay fault injected on {} for {}s", request.system_id, request.duration),
    ))
}

pub fn inject_sensor_attack<A: FaultApi>(api: &A, request: &SensorAttackRequest) -> Result<String, ApiError> {
    info!(
        "Spoofing {}/{} = {} for {}s (ip {})",
        request.system_id,
        request.sensor_id,
        request.value,
        request.duration,
        request.simulated_ip.as_deref().unwrap_or("-")
    );
    let ack = api.inject_sensor_attack(request)?;
    Ok(ack_message(
        ack,
        format!("sensor {} spoofed for {}s", request.sensor_id, request.duration),
    ))
}

pub fn set_relay_state<A: FaultApi>(api: &A, system_id: &str, state: RelayState) -> Result<String, ApiError> {
    let system_id = SystemId(require_id("system id", system_id)?);
    let ack = api.set_relay_state(&system_id, state)?;
    Ok(ack_message(ack, format!("relay of {} set to {}", system_id, state)))
}

pub fn set_sensor_value<A: FaultApi>(api: &A, system_id: &str, sensor_id: &str, value: f64) -> Result<String, ApiError> {
    let system_id = SystemId(require_id("system id", system_id)?);
    let sensor_id = SensorId(require_id("sensor id", sensor_id)?);
    let value = require_value(value)?;
    let ack = api.set_sensor_value(&system_id, &sensor_id, value)?;
    Ok(ack_message(ack, format!("{}/{} set to {}", system_id, sensor_id, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn relay_fault_validation() {
        let req = relay_fault_request(" sys_radar ", 10, Some("192.168.1.50")).unwrap();
        assert_eq!(req.system_id, SystemId("sys_radar".into()));
        assert_eq!(req.simulated_ip.as_deref(), Some("192.168.1.50"));

        assert!(relay_fault_request("sys_radar", 3, Some("  ")).unwrap().simulated_ip.is_none());
        assert!(relay_fault_request("sys_radar", 3, Some("::1")).is_ok());

        for err in [
            relay_fault_request("", 10, None).unwrap_err(),
            relay_fault_request("sys_radar", 0, None).unwrap_err(),
            relay_fault_request("sys_radar", 10, Some("999.1.1.1")).unwrap_err(),
        ] {
            assert!(err.is_rejected(), "{}", err);
            assert_eq!(err.status(), None);
        }
    }

    #[test]
    fn sensor_attack_validation() {
        let req = sensor_attack_request("sys_main_engine", "sens_eng_temp", 140.0, 5, None).unwrap();
        assert_eq!(req.value, 140.0);
        assert!(sensor_attack_request("sys_main_engine", " ", 1.0, 5, None).is_err());
        assert!(sensor_attack_request("sys_main_engine", "sens_eng_temp", f64::NAN, 5, None).is_err());
        assert!(sensor_attack_request("sys_main_engine", "sens_eng_temp", f64::INFINITY, 5, None).is_err());
    }

    #[test]
    fn ack_falls_back_when_backend_is_silent() {
        let silent = CommandAck { message: Some(" ".into()) };
        assert_eq!(ack_message(silent, "fallback".into()), "fallback");
        let ack = CommandAck {
            message: Some("Fallo inyectado en sys_radar por 10s".into()),
        };
        assert_eq!(ack_message(ack, "fallback".into()), "Fallo inyectado en sys_radar por 10s");
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        RelayFault(RelayFaultRequest),
        SensorAttack(SensorAttackRequest),
        Relay(SystemId, RelayState),
        Sensor(SystemId, SensorId, f64),
    }

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<Sent>>,
        reply: Option<String>,
    }

    impl Recorder {
        fn ack(&self, sent: Sent) -> Result<CommandAck, ApiError> {
            self.sent.borrow_mut().push(sent);
            Ok(CommandAck {
                message: self.reply.clone(),
            })
        }
    }

    impl FaultApi for Recorder {
        fn inject_relay_fault(&self, request: &RelayFaultRequest) -> Result<CommandAck, ApiError> {
            self.ack(Sent::RelayFault(request.clone()))
        }

        fn inject_sensor_attack(&self, request: &SensorAttackRequest) -> Result<CommandAck, ApiError> {
            self.ack(Sent::SensorAttack(request.clone()))
        }

        fn set_relay_state(&self, system_id: &SystemId, state: RelayState) -> Result<CommandAck, ApiError> {
            self.ack(Sent::Relay(system_id.clone(), state))
        }

        fn set_sensor_value(&self, system_id: &SystemId, sensor_id: &SensorId, value: f64) -> Result<CommandAck, ApiError> {
            self.ack(Sent::Sensor(system_id.clone(), sensor_id.clone(), value))
        }
    }

    #[test]
    fn attacks_send_validated_requests() {
        let api = Recorder {
            reply: Some("Ataque registrado".into()),
            ..Recorder::default()
        };
        let relay = relay_fault_request("sys_radar", 10, Some("10.0.0.66")).unwrap();
        assert_eq!(inject_relay_fault(&api, &relay).unwrap(), "Ataque registrado");

        let sensor = sensor_attack_request("sys_main_engine", "sens_eng_temp", -3.5, 4, None).unwrap();
        assert_eq!(inject_sensor_attack(&api, &sensor).unwrap(), "Ataque registrado");

        let sent = api.sent.borrow();
        assert_eq!(
            *sent,
            vec![
                Sent::RelayFault(RelayFaultRequest {
                    system_id: SystemId("sys_radar".into()),
                    duration: 10,
                    simulated_ip: Some("10.0.0.66".into()),
                }),
                Sent::SensorAttack(SensorAttackRequest {
                    system_id: SystemId("sys_main_engine".into()),
                    sensor_id: SensorId("sens_eng_temp".into()),
                    value: -3.5,
                    duration: 4,
                    simulated_ip: None,
                }),
            ]
        );
    }

    #[test]
    fn silent_backend_gets_a_local_message() {
        let api = Recorder::default();
        let relay = relay_fault_request("sys_radar", 10, None).unwrap();
        assert_eq!(inject_relay_fault(&api, &relay).unwrap(), "relay fault injected on sys_radar for 10s");
        let sensor = sensor_attack_request("sys_aux_gen", "sens_gen_volt", 500.0, 3, None).unwrap();
        assert_eq!(inject_sensor_attack(&api, &sensor).unwrap(), "sensor sens_gen_volt spoofed for 3s");
        assert_eq!(
            set_relay_state(&api, " sys_fire ", RelayState::Off).unwrap(),
            "relay of sys_fire set to OFF"
        );
        assert_eq!(
            set_sensor_value(&api, "sys_aux_gen", "sens_gen_volt", 230.0).unwrap(),
            "sys_aux_gen/sens_gen_volt set to 230"
        );
        assert_eq!(
            api.sent.borrow()[2..],
            [
                Sent::Relay(SystemId("sys_fire".into()), RelayState::Off),
                Sent::Sensor(SystemId("sys_aux_gen".into()), SensorId("sens_gen_volt".into()), 230.0),
            ]
        );
    }

    #[test]
    fn invalid_override_sends_nothing() {
        let api = Recorder::default();
        let err = set_sensor_value(&api, "sys_radar", "", 1.0).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = set_sensor_value(&api, "sys_radar", "sens_radar_temp", f64::NAN).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = set_relay_state(&api, "  ", RelayState::On).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(api.sent.borrow().is_empty());
    }
}
