use crate::client::{ApiError, NavalApi};
use crate::history::{SensorHistory, SimulationHistory};
use crate::i18n::Language;
use crate::models::naval::{NavalSystem, SensorId, SystemId};
use crate::sensor_data::sensor_label;
use crate::services::poller::PollTarget;
use crate::settings::{Page, Settings};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

/// Live view over every system with rolling per-sensor and per-system
/// histories. Prints a frame after each committed poll when `echo` is set.
pub struct SimulationView<A> {
    api: A,
    settings: Settings,
    language: Language,
    echo: bool,
    latest: Vec<NavalSystem>,
    sensors: SensorHistory,
    samples: SimulationHistory,
}

impl<A: NavalApi> SimulationView<A> {
    pub fn new(api: A, settings: Settings, language: Language, echo: bool) -> Self {
        SimulationView {
            api,
            settings,
            language,
            echo,
            latest: Vec::new(),
            sensors: SensorHistory::default(),
            samples: SimulationHistory::default(),
        }
    }

    pub fn record(&mut self, mut systems: Vec<NavalSystem>, at: DateTime<Utc>) {
        let known: Vec<SystemId> = systems.iter().map(|s| s.id.clone()).collect();
        self.settings.reconcile_layouts(&known);
        self.sensors.record(&systems, at);
        self.samples.record(&systems, at);
        self.sensors.annotate(&mut systems);
        self.latest = systems;
    }

    /// Latest systems with `Sensor::history` filled from the local buffer.
    pub fn latest(&self) -> &[NavalSystem] {
        &self.latest
    }

    pub fn sensor_history(&self) -> &SensorHistory {
        &self.sensors
    }

    pub fn samples(&self) -> &SimulationHistory {
        &self.samples
    }

    /// Min and max of a sensor across the retained simulation samples.
    pub fn range(&self, system_id: &SystemId, sensor_id: &SensorId) -> Option<(f64, f64)> {
        self.samples
            .samples(system_id)?
            .iter()
            .filter_map(|s| s.values.get(sensor_id).copied())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for system in self.settings.arrange(Page::Simulation, &self.latest) {
            let _ = writeln!(out, "{} ({}) [{}]", system.name, system.id, system.relay.state);
            for sensor in &system.sensors {
                let _ = write!(
                    out,
                    "  {:<32} {:>10.2} {:<4}",
                    sensor_label(sensor, self.language),
                    sensor.value,
                    sensor.unit
                );
                if let Some((lo, hi)) = self.range(&system.id, &sensor.id) {
                    let _ = write!(out, "  range {:.2}..{:.2}", lo, hi);
                }
                if let Some(max) = sensor.safe_max {
                    let _ = write!(out, "  safe_max {}", max);
                }
                out.push('\n');
            }
        }
        out
    }
}

impl<A: NavalApi> PollTarget for SimulationView<A> {
    type Output = (Vec<NavalSystem>, DateTime<Utc>);

    fn name(&self) -> &str {
        "simulation"
    }

    fn fetch(&mut self) -> Result<Self::Output, ApiError> {
        Ok((self.api.get_systems()?, Utc::now()))
    }

    fn commit(&mut self, (systems, at): Self::Output) {
        self.record(systems, at);
        if self.echo {
            println!("{}", self.render());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SIMULATION_HISTORY_CAP;
    use crate::models::naval::{CommandAck, LogQuery, RelayState, SystemLog};
    use chrono::{TimeDelta, TimeZone};

    struct Offline;

    impl NavalApi for Offline {
        fn get_systems(&self) -> Result<Vec<NavalSystem>, ApiError> {
            Err(ApiError::Transport("offline".into()))
        }

        fn get_logs(&self, _query: &LogQuery) -> Result<Vec<SystemLog>, ApiError> {
            Err(ApiError::Transport("offline".into()))
        }

        fn set_relay_state(&self, _id: &SystemId, _state: RelayState) -> Result<CommandAck, ApiError> {
            Err(ApiError::Transport("offline".into()))
        }
    }

    fn systems_fixture() -> Vec<NavalSystem> {
        let json = std::fs::read_to_string("tests/data/systems.json").expect("fixture present");
        serde_json::from_str(&json).expect("parse systems")
    }

    #[test]
    fn records_histories_and_ranges() {
        let mut view = SimulationView::new(Offline, Settings::default(), Language::En, false);
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        for i in 0..40 {
            let mut systems = systems_fixture();
            systems[0].sensors[0].value = 80.0 + i as f64;
            view.record(systems, start + TimeDelta::seconds(i));
        }
        let engine = SystemId("sys_main_engine".into());
        let temp = SensorId("sens_eng_temp".into());
        assert_eq!(view.samples().samples(&engine).unwrap().len(), SIMULATION_HISTORY_CAP);
        assert_eq!(view.range(&engine, &temp), Some((90.0, 119.0)));
        assert_eq!(view.latest()[0].sensors[0].history.as_ref().unwrap().len(), 20);
        assert!(view.fetch().is_err());
    }

    #[test]
    fn render_respects_layout_and_hidden() {
        let mut settings = Settings::default();
        settings.toggle_visibility(&SystemId("sys_radar".into()));
        let mut view = SimulationView::new(Offline, settings, Language::En, false);
        view.record(systems_fixture(), Utc::now());
        let frame = view.render();
        assert!(frame.starts_with("Motor Principal (sys_main_engine) [ON]"));
        assert!(frame.contains("Engine Temperature"));
        assert!(!frame.contains("sys_radar"));
    }
}
