//! Background monitor: turns poll-to-poll changes into notifications and
//! switches tripped relays back ON once their recovery delay has passed.

use crate::alerts::{self, Alert, AlertPolicy, PendingRecovery, Snapshot};
use crate::client::{ApiError, NavalApi};
use crate::i18n::Language;
use crate::models::naval::{LogQuery, NavalSystem, RelayState, SystemId, SystemLog};
use crate::notifications::{Level, NotificationCenter};
use crate::services::poller::PollTarget;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Abnormal logs inspected per poll for attack detection.
pub const ATTACK_LOG_WINDOW: u32 = 5;

#[derive(Debug)]
pub struct MonitorPoll {
    pub systems: Vec<NavalSystem>,
    pub logs: Vec<SystemLog>,
    pub at: DateTime<Utc>,
}

pub struct Monitor<A> {
    api: A,
    policy: AlertPolicy,
    language: Language,
    snapshot: Snapshot,
    pending: Vec<PendingRecovery>,
    notifications: NotificationCenter,
    // notification ids that a later recovery of the system resolves
    trip_notices: HashMap<SystemId, String>,
    failed_recoveries: HashMap<SystemId, String>,
}

impl<A: NavalApi> Monitor<A> {
    pub fn new(api: A, policy: AlertPolicy, language: Language) -> Self {
        Monitor {
            api,
            policy,
            language,
            snapshot: Snapshot::default(),
            pending: Vec::new(),
            notifications: NotificationCenter::new(),
            trip_notices: HashMap::new(),
            failed_recoveries: HashMap::new(),
        }
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    pub fn pending_recoveries(&self) -> &[PendingRecovery] {
        &self.pending
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn apply(&mut self, poll: MonitorPoll) {
        let eval = alerts::evaluate(&self.snapshot, &poll.systems, &poll.logs, poll.at, &self.policy);
        for alert in &eval.alerts {
            let id = self
                .notifications
                .add(alert.title(self.language), Some(alert.description(self.language)), alert.level())
                .id
                .clone();
            match alert {
                Alert::RelayTripped { system_id, .. } => {
                    self.trip_notices.insert(system_id.clone(), id);
                }
                Alert::RelayRecovered { system_id, .. } => self.resolve(system_id),
                _ => {}
            }
        }
        self.snapshot = eval.snapshot;
        self.pending.extend(eval.recoveries);
        self.run_due_recoveries(poll.at);
    }

    /// A recovered relay settles its trip notice and drops stale recovery failures.
    fn resolve(&mut self, system_id: &SystemId) {
        if let Some(id) = self.trip_notices.remove(system_id) {
            self.notifications.mark_as_read(&id);
        }
        if let Some(id) = self.failed_recoveries.remove(system_id) {
            self.notifications.remove(&id);
        }
    }

    fn run_due_recoveries(&mut self, now: DateTime<Utc>) {
        let (due, waiting): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|r| r.due_at <= now);
        self.pending = waiting;

        for recovery in due {
            if self.snapshot.relay_state(&recovery.system_id) != Some(RelayState::Tripped) {
                debug!("{} no longer tripped; skipping auto-recovery", recovery.system_id);
                continue;
            }
            info!("Auto-recovering {} ({})", recovery.system_name, recovery.system_id);
            match self.api.set_relay_state(&recovery.system_id, RelayState::On) {
                Ok(ack) => {
                    if let Some(msg) = ack.message {
                        debug!("Recovery of {} acknowledged: {}", recovery.system_id, msg);
                    }
                }
                Err(e) => {
                    warn!("Auto-recovery of {} failed: {}", recovery.system_id, e);
                    let title = match self.language {
                        Language::Es => format!("Fallo al recuperar {}", recovery.system_name),
                        Language::En => format!("Failed to recover {}", recovery.system_name),
                    };
                    let id = self.notifications.add(title, Some(e.to_string()), Level::Error).id.clone();
                    if let Some(previous) = self.failed_recoveries.insert(recovery.system_id.clone(), id) {
                        self.notifications.remove(&previous);
                    }
                }
            }
        }
    }
}

impl<A: NavalApi> PollTarget for Monitor<A> {
    type Output = MonitorPoll;

    fn name(&self) -> &str {
        "monitor"
    }

    fn fetch(&mut self) -> Result<MonitorPoll, ApiError> {
        let systems = self.api.get_systems()?;
        let logs = match self.api.get_logs(&LogQuery::abnormal(ATTACK_LOG_WINDOW)) {
            Ok(logs) => logs,
            Err(e) => {
                warn!("Attack log fetch failed: {}", e);
                Vec::new()
            }
        };
        Ok(MonitorPoll {
            systems,
            logs,
            at: Utc::now(),
        })
    }

    fn commit(&mut self, output: MonitorPoll) {
        self.apply(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::naval::{CommandAck, LogId, SystemId};
    use chrono::{TimeDelta, TimeZone};
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeApi {
        relay_calls: RefCell<Vec<(SystemId, RelayState)>>,
        reject_relay: bool,
    }

    impl NavalApi for FakeApi {
        fn get_systems(&self) -> Result<Vec<NavalSystem>, ApiError> {
            Ok(systems_fixture())
        }

        fn get_logs(&self, _query: &LogQuery) -> Result<Vec<SystemLog>, ApiError> {
            Ok(Vec::new())
        }

        fn set_relay_state(&self, system_id: &SystemId, state: RelayState) -> Result<CommandAck, ApiError> {
            if self.reject_relay {
                return Err(ApiError::Http {
                    status: 500,
                    message: "Internal Server Error".into(),
                });
            }
            self.relay_calls.borrow_mut().push((system_id.clone(), state));
            Ok(CommandAck {
                message: Some("Relay updated".into()),
            })
        }
    }

    fn systems_fixture() -> Vec<NavalSystem> {
        let json = std::fs::read_to_string("tests/data/systems.json").expect("fixture present");
        serde_json::from_str(&json).expect("parse systems")
    }

    fn logs_fixture() -> Vec<SystemLog> {
        let json = std::fs::read_to_string("tests/data/logs.json").expect("fixture present");
        serde_json::from_str(&json).expect("parse logs")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
    }

    fn poll(systems: Vec<NavalSystem>, logs: Vec<SystemLog>, secs: i64) -> MonitorPoll {
        MonitorPoll {
            systems,
            logs,
            at: t0() + TimeDelta::seconds(secs),
        }
    }

    #[test]
    fn trip_notifies_then_recovers_after_delay() {
        let api = FakeApi::default();
        let mut monitor = Monitor::new(&api, AlertPolicy::default(), Language::Es);
        let mut systems = systems_fixture();
        monitor.apply(poll(systems.clone(), Vec::new(), 0));
        assert!(monitor.notifications().all().is_empty());

        systems[0].relay.state = RelayState::Tripped;
        monitor.apply(poll(systems.clone(), Vec::new(), 2));
        assert_eq!(monitor.notifications().all().len(), 1);
        assert_eq!(monitor.notifications().all()[0].level, Level::Error);
        assert_eq!(monitor.pending_recoveries().len(), 1);

        monitor.apply(poll(systems.clone(), Vec::new(), 4));
        assert!(api.relay_calls.borrow().is_empty());

        monitor.apply(poll(systems.clone(), Vec::new(), 7));
        assert_eq!(
            *api.relay_calls.borrow(),
            vec![(SystemId("sys_main_engine".into()), RelayState::On)]
        );
        assert!(monitor.pending_recoveries().is_empty());

        systems[0].relay.state = RelayState::On;
        monitor.apply(poll(systems, Vec::new(), 9));
        let latest = &monitor.notifications().all()[0];
        assert_eq!(latest.level, Level::Success);
        assert_eq!(latest.title, "Sistema Motor Principal Recuperado");
        // the trip notice is settled by the recovery
        assert_eq!(monitor.notifications().all().len(), 2);
        assert_eq!(monitor.notifications().unread_count(), 1);
        assert!(monitor.notifications().all()[1].read);
    }

    #[test]
    fn recovery_skipped_when_operator_already_acted() {
        let api = FakeApi::default();
        let mut monitor = Monitor::new(&api, AlertPolicy::default(), Language::En);
        let mut systems = systems_fixture();
        monitor.apply(poll(systems.clone(), Vec::new(), 0));
        systems[3].relay.state = RelayState::Tripped;
        monitor.apply(poll(systems.clone(), Vec::new(), 1));
        systems[3].relay.state = RelayState::Off;
        monitor.apply(poll(systems, Vec::new(), 10));
        assert!(api.relay_calls.borrow().is_empty());
        assert!(monitor.pending_recoveries().is_empty());
    }

    #[test]
    fn failed_recovery_is_reported() {
        let api = FakeApi {
            reject_relay: true,
            ..FakeApi::default()
        };
        let mut monitor = Monitor::new(&api, AlertPolicy::default(), Language::En);
        let mut systems = systems_fixture();
        monitor.apply(poll(systems.clone(), Vec::new(), 0));
        systems[1].relay.state = RelayState::Tripped;
        monitor.apply(poll(systems.clone(), Vec::new(), 1));
        monitor.apply(poll(systems, Vec::new(), 6));
        let latest = &monitor.notifications().all()[0];
        assert_eq!(latest.title, "Failed to recover Generador Auxiliar");
        assert_eq!(latest.level, Level::Error);
    }

    #[test]
    fn manual_recovery_settles_failure_notices() {
        let api = FakeApi {
            reject_relay: true,
            ..FakeApi::default()
        };
        let mut monitor = Monitor::new(&api, AlertPolicy::default(), Language::En);
        let mut systems = systems_fixture();
        monitor.apply(poll(systems.clone(), Vec::new(), 0));
        systems[1].relay.state = RelayState::Tripped;
        monitor.apply(poll(systems.clone(), Vec::new(), 1));
        monitor.apply(poll(systems.clone(), Vec::new(), 6));
        // trip notice plus one failure notice
        assert_eq!(monitor.notifications().all().len(), 2);

        systems[1].relay.state = RelayState::On;
        monitor.apply(poll(systems, Vec::new(), 8));
        let titles: Vec<&str> = monitor.notifications().all().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles.len(), 2);
        assert!(!titles.iter().any(|t| t.starts_with("Failed to recover")));
        assert_eq!(monitor.notifications().unread_count(), 1);
    }

    #[test]
    fn attack_logs_alert_after_seed_with_cooldown() {
        let api = FakeApi::default();
        let mut monitor = Monitor::new(&api, AlertPolicy::default(), Language::En);
        let systems = systems_fixture();
        monitor.apply(poll(systems.clone(), logs_fixture(), 0));
        assert!(monitor.notifications().all().is_empty());
        assert_eq!(monitor.snapshot().last_attack_id(), Some(LogId(1042)));

        let mut attack = logs_fixture().remove(1);
        attack.id = LogId(1050);
        monitor.apply(poll(systems.clone(), vec![attack.clone()], 2));
        assert_eq!(monitor.notifications().all().len(), 1);
        assert!(monitor.notifications().all()[0].description.as_deref().unwrap_or("").contains("10.0.0.66"));

        attack.id = LogId(1051);
        monitor.apply(poll(systems.clone(), vec![attack.clone()], 10));
        assert_eq!(monitor.notifications().all().len(), 1);

        attack.id = LogId(1052);
        monitor.apply(poll(systems, vec![attack], 20));
        assert_eq!(monitor.notifications().all().len(), 2);
    }

    #[test]
    fn fetch_reads_systems_and_logs() {
        let api = FakeApi::default();
        let mut monitor = Monitor::new(&api, AlertPolicy::default(), Language::Es);
        let poll = monitor.fetch().unwrap();
        assert_eq!(poll.systems.len(), 6);
        assert!(poll.logs.is_empty());
    }
}
