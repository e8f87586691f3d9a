//! Edge-triggered alerting over successive system polls.
//!
//! `evaluate` is a pure transition: it takes the snapshot left by the
//! previous poll plus the current poll's data and returns the next snapshot
//! together with the alerts and recoveries the transition produced.
//! Sustained states produce nothing; only edges do.

use crate::i18n::{self, Language};
use crate::models::naval::{LogId, NavalSystem, RelayState, SensorId, SystemId, SystemLog};
use crate::notifications::Level;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertPolicy {
    /// Minimum spacing between two attack alerts.
    pub attack_cooldown: Duration,
    /// Delay before a tripped relay is switched back ON; `None` leaves it latched.
    pub auto_recovery: Option<Duration>,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        AlertPolicy {
            attack_cooldown: Duration::from_secs(15),
            auto_recovery: Some(Duration::from_secs(5)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SystemSnapshot {
    relay: RelayState,
    sensors: HashMap<SensorId, f64>,
}

impl From<&NavalSystem> for SystemSnapshot {
    fn from(system: &NavalSystem) -> Self {
        SystemSnapshot {
            relay: system.relay.state,
            sensors: system.sensors.iter().map(|s| (s.id.clone(), s.value)).collect(),
        }
    }
}

/// What the previous poll looked like, as far as edge detection cares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    systems: HashMap<SystemId, SystemSnapshot>,
    loaded: bool,
    last_attack_id: Option<LogId>,
    last_attack_alert_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn relay_state(&self, system_id: &SystemId) -> Option<RelayState> {
        self.systems.get(system_id).map(|s| s.relay)
    }

    pub fn last_attack_id(&self) -> Option<LogId> {
        self.last_attack_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    RelayTripped {
        system_id: SystemId,
        system_name: String,
        recovery_in: Option<Duration>,
    },
    RelayRecovered {
        system_id: SystemId,
        system_name: String,
    },
    SensorNearLimit {
        system_id: SystemId,
        system_name: String,
        sensor_id: SensorId,
        sensor_type: String,
        value: f64,
        unit: String,
        safe_max: f64,
    },
    AttackDetected {
        log_id: LogId,
        system_name: String,
        source_ip: Option<String>,
    },
}

impl Alert {
    pub fn level(&self) -> Level {
        match self {
            Alert::RelayTripped { .. } | Alert::AttackDetected { .. } => Level::Error,
            Alert::RelayRecovered { .. } => Level::Success,
            Alert::SensorNearLimit { .. } => Level::Warning,
        }
    }

    pub fn title(&self, lang: Language) -> String {
        match (self, lang) {
            (Alert::RelayTripped { system_name, .. }, Language::Es) => {
                format!("¡ALERTA CRÍTICA! Sistema {} ha fallado.", system_name)
            }
            (Alert::RelayTripped { system_name, .. }, Language::En) => {
                format!("CRITICAL ALERT! System {} has failed.", system_name)
            }
            (Alert::RelayRecovered { system_name, .. }, Language::Es) => format!("Sistema {} Recuperado", system_name),
            (Alert::RelayRecovered { system_name, .. }, Language::En) => format!("System {} Recovered", system_name),
            (Alert::SensorNearLimit { sensor_type, .. }, _) => {
                let label = i18n::sensor_type_label(lang, sensor_type).unwrap_or(sensor_type.as_str());
                match lang {
                    Language::Es => format!("Advertencia: Sensor {}", label),
                    Language::En => format!("Warning: {} sensor", label),
                }
            }
            (Alert::AttackDetected { .. }, Language::Es) => "¡CIBERATAQUE DETECTADO!".to_string(),
            (Alert::AttackDetected { .. }, Language::En) => "CYBERATTACK DETECTED!".to_string(),
        }
    }

    pub fn description(&self, lang: Language) -> String {
        match self {
            Alert::RelayTripped { recovery_in, .. } => match (lang, recovery_in) {
                (Language::Es, Some(d)) => format!(
                    "El relé ha saltado a estado TRIPPED via protección. Se iniciará recuperación en {}s.",
                    d.as_secs()
                ),
                (Language::Es, None) => "El relé ha saltado a estado TRIPPED via protección.".to_string(),
                (Language::En, Some(d)) => format!(
                    "The relay latched TRIPPED through its protection. Recovery starts in {}s.",
                    d.as_secs()
                ),
                (Language::En, None) => "The relay latched TRIPPED through its protection.".to_string(),
            },
            Alert::RelayRecovered { .. } => match lang {
                Language::Es => "El sistema ha vuelto a operar con normalidad tras su autorrecuperación.".to_string(),
                Language::En => "The system is operating normally again after auto-recovery.".to_string(),
            },
            Alert::SensorNearLimit {
                system_name,
                value,
                unit,
                safe_max,
                ..
            } => match lang {
                Language::Es => format!(
                    "Valor {:.1} {} cercano al límite ({} {}) en {}.",
                    value, unit, safe_max, unit, system_name
                ),
                Language::En => format!(
                    "Value {:.1} {} is close to the limit ({} {}) on {}.",
                    value, unit, safe_max, unit, system_name
                ),
            },
            Alert::AttackDetected {
                system_name, source_ip, ..
            } => {
                let ip = source_ip.clone().unwrap_or_else(|| i18n::text(lang, "unknown_ip"));
                match lang {
                    Language::Es => format!(
                        "Intrusión en el sistema {}. Acción bloqueada o registrada desde la IP: {}.",
                        system_name, ip
                    ),
                    Language::En => format!(
                        "Intrusion on system {}. Action blocked or recorded from IP: {}.",
                        system_name, ip
                    ),
                }
            }
        }
    }
}

/// A relay that should be switched back ON once `due_at` passes.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecovery {
    pub system_id: SystemId,
    pub system_name: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub snapshot: Snapshot,
    pub alerts: Vec<Alert>,
    pub recoveries: Vec<PendingRecovery>,
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

pub fn evaluate(
    previous: &Snapshot,
    systems: &[NavalSystem],
    recent_logs: &[SystemLog],
    now: DateTime<Utc>,
    policy: &AlertPolicy,
) -> Evaluation {
    let mut next = previous.clone();
    let mut alerts = Vec::new();
    let mut recoveries = Vec::new();

    // Attacks
    if previous.loaded {
        let cooldown = to_delta(policy.attack_cooldown);
        for log in recent_logs {
            if !log.is_attack || next.last_attack_id.is_some_and(|last| log.id <= last) {
                continue;
            }
            let cooled_down = next.last_attack_alert_at.is_none_or(|at| now - at > cooldown);
            if cooled_down {
                alerts.push(Alert::AttackDetected {
                    log_id: log.id,
                    system_name: log.system_name.clone(),
                    source_ip: log.source_ip.clone(),
                });
                next.last_attack_alert_at = Some(now);
            }
            next.last_attack_id = Some(log.id);
        }
    } else if let Some(max_id) = recent_logs.iter().map(|l| l.id).max() {
        // seed without alerting
        next.last_attack_id = Some(max_id);
    }

    for system in systems {
        if !previous.loaded {
            next.systems.insert(system.id.clone(), SystemSnapshot::from(system));
            continue;
        }
        let prev_system = previous.systems.get(&system.id);

        if let Some(prev) = prev_system {
            let was = prev.relay;
            let is = system.relay.state;
            if was != RelayState::Tripped && is == RelayState::Tripped {
                alerts.push(Alert::RelayTripped {
                    system_id: system.id.clone(),
                    system_name: system.name.clone(),
                    recovery_in: policy.auto_recovery,
                });
                if let Some(delay) = policy.auto_recovery {
                    recoveries.push(PendingRecovery {
                        system_id: system.id.clone(),
                        system_name: system.name.clone(),
                        due_at: now + to_delta(delay),
                    });
                }
            }
            if was == RelayState::Tripped && is == RelayState::On {
                alerts.push(Alert::RelayRecovered {
                    system_id: system.id.clone(),
                    system_name: system.name.clone(),
                });
            }
        }

        for sensor in &system.sensors {
            let (Some(safe_max), Some(threshold)) = (sensor.safe_max, sensor.warning_threshold()) else {
                continue;
            };
            let prev_value = prev_system.and_then(|p| p.sensors.get(&sensor.id)).copied();
            let crossed_up = sensor.value >= threshold && prev_value.is_none_or(|v| v < threshold);
            // above safe_max the relay protection owns the alert
            if crossed_up && sensor.value <= safe_max {
                alerts.push(Alert::SensorNearLimit {
                    system_id: system.id.clone(),
                    system_name: system.name.clone(),
                    sensor_id: sensor.id.clone(),
                    sensor_type: sensor.sensor_type.clone(),
                    value: sensor.value,
                    unit: sensor.unit.clone(),
                    safe_max,
                });
            }
        }

        next.systems.insert(system.id.clone(), SystemSnapshot::from(system));
    }

    if !systems.is_empty() {
        next.loaded = true;
    }

    Evaluation {
        snapshot: next,
        alerts,
        recoveries,
    }
}
