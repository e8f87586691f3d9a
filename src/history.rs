//! Capped rolling histories accumulated from successive polls.

use crate::models::naval::{HistoryPoint, NavalSystem, SensorId, SimulationSample, SystemId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Points kept per sensor for sparkline-style views.
pub const SENSOR_HISTORY_CAP: usize = 20;
/// Samples kept per system for the simulation view.
pub const SIMULATION_HISTORY_CAP: usize = 30;

/// Fixed-capacity FIFO; the oldest entry is dropped on overflow.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    cap: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        RingBuffer {
            items: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.cap {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// Per-sensor value history keyed by (system, sensor).
#[derive(Debug, Clone)]
pub struct SensorHistory {
    cap: usize,
    series: HashMap<(SystemId, SensorId), RingBuffer<HistoryPoint>>,
}

impl Default for SensorHistory {
    fn default() -> Self {
        SensorHistory::new(SENSOR_HISTORY_CAP)
    }
}

impl SensorHistory {
    pub fn new(cap: usize) -> Self {
        SensorHistory {
            cap,
            series: HashMap::new(),
        }
    }

    pub fn record(&mut self, systems: &[NavalSystem], at: DateTime<Utc>) {
        let cap = self.cap;
        for system in systems {
            for sensor in &system.sensors {
                self.series
                    .entry((system.id.clone(), sensor.id.clone()))
                    .or_insert_with(|| RingBuffer::new(cap))
                    .push(HistoryPoint {
                        timestamp: at,
                        value: sensor.value,
                    });
            }
        }
    }

    pub fn series(&self, system_id: &SystemId, sensor_id: &SensorId) -> Option<&RingBuffer<HistoryPoint>> {
        self.series.get(&(system_id.clone(), sensor_id.clone()))
    }

    /// Copy each sensor's accumulated points into `Sensor::history`.
    pub fn annotate(&self, systems: &mut [NavalSystem]) {
        for system in systems.iter_mut() {
            for sensor in system.sensors.iter_mut() {
                if let Some(buf) = self.series.get(&(system.id.clone(), sensor.id.clone())) {
                    sensor.history = Some(buf.iter().cloned().collect());
                }
            }
        }
    }
}

/// One sample per poll per system, every sensor value side by side.
#[derive(Debug, Clone)]
pub struct SimulationHistory {
    cap: usize,
    per_system: BTreeMap<SystemId, RingBuffer<SimulationSample>>,
}

impl Default for SimulationHistory {
    fn default() -> Self {
        SimulationHistory::new(SIMULATION_HISTORY_CAP)
    }
}

impl SimulationHistory {
    pub fn new(cap: usize) -> Self {
        SimulationHistory {
            cap,
            per_system: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, systems: &[NavalSystem], at: DateTime<Utc>) {
        let cap = self.cap;
        for system in systems {
            let values = system.sensors.iter().map(|s| (s.id.clone(), s.value)).collect();
            self.per_system
                .entry(system.id.clone())
                .or_insert_with(|| RingBuffer::new(cap))
                .push(SimulationSample { timestamp: at, values });
        }
    }

    pub fn samples(&self, system_id: &SystemId) -> Option<&RingBuffer<SimulationSample>> {
        self.per_system.get(system_id)
    }

    pub fn systems(&self) -> impl Iterator<Item = &SystemId> {
        self.per_system.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn systems_fixture() -> Vec<NavalSystem> {
        let json = std::fs::read_to_string("tests/data/systems.json").expect("fixture present");
        serde_json::from_str(&json).expect("parse systems")
    }

    #[test]
    fn ring_buffer_drops_oldest() {
        let mut buf = RingBuffer::new(3);
        for i in 0..5 {
            buf.push(i);
        }
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(buf.latest(), Some(&4));
        assert_eq!(RingBuffer::<u8>::new(0).capacity(), 1);
    }

    #[test]
    fn sensor_history_never_exceeds_cap() {
        let mut systems = systems_fixture();
        let mut history = SensorHistory::default();
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        for poll in 0..75 {
            systems[0].sensors[0].value = 80.0 + poll as f64;
            history.record(&systems, start + chrono::Duration::seconds(2 * poll));
        }
        let engine = SystemId("sys_main_engine".into());
        let temp = history.series(&engine, &SensorId("sens_eng_temp".into())).unwrap();
        assert_eq!(temp.len(), SENSOR_HISTORY_CAP);
        assert_eq!(temp.latest().unwrap().value, 154.0);
        assert_eq!(temp.iter().next().unwrap().value, 135.0);

        history.annotate(&mut systems);
        assert_eq!(systems[0].sensors[0].history.as_ref().unwrap().len(), SENSOR_HISTORY_CAP);
    }

    #[test]
    fn simulation_history_keeps_last_thirty_samples() {
        let systems = systems_fixture();
        let mut history = SimulationHistory::default();
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        for poll in 0..40 {
            history.record(&systems, start + chrono::Duration::seconds(poll));
        }
        assert_eq!(history.systems().count(), 6);
        let gen_samples = history.samples(&SystemId("sys_aux_gen".into())).unwrap();
        assert_eq!(gen_samples.len(), SIMULATION_HISTORY_CAP);
        let first = gen_samples.iter().next().unwrap();
        assert_eq!(first.timestamp, start + chrono::Duration::seconds(10));
        assert_eq!(first.values.get(&SensorId("sens_gen_volt".into())), Some(&220.0));
    }
}
