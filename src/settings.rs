//! Operator preferences persisted between runs.

use crate::i18n::Language;
use crate::models::naval::{NavalSystem, SystemId};
use crate::storage::{StateDir, StoreError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_REFRESH_MS: u64 = 2000;
pub const MIN_REFRESH_MS: u64 = 100;

pub const DEFAULT_LAYOUT: [&str; 6] = [
    "sys_main_engine",
    "sys_aux_gen",
    "sys_bilge_pump",
    "sys_radar",
    "sys_steering",
    "sys_fire",
];

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Dark => f.write_str("dark"),
            Theme::Light => f.write_str("light"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(format!("unknown theme '{other}' (expected dark or light)")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Simulation,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub refresh_interval_ms: u64,
    pub dashboard_layout: Vec<SystemId>,
    pub simulation_layout: Vec<SystemId>,
    pub hidden_systems: Vec<SystemId>,
    pub theme: Theme,
    pub language: Language,
}

fn default_layout() -> Vec<SystemId> {
    DEFAULT_LAYOUT.iter().map(|id| SystemId(id.to_string())).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            refresh_interval_ms: DEFAULT_REFRESH_MS,
            dashboard_layout: default_layout(),
            simulation_layout: default_layout(),
            hidden_systems: Vec::new(),
            theme: Theme::default(),
            language: Language::default(),
        }
    }
}

impl Settings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(MIN_REFRESH_MS))
    }

    pub fn set_refresh_interval_ms(&mut self, ms: u64) -> Result<(), String> {
        if ms < MIN_REFRESH_MS {
            return Err(format!("refresh interval must be at least {} ms", MIN_REFRESH_MS));
        }
        self.refresh_interval_ms = ms;
        Ok(())
    }

    pub fn layout(&self, page: Page) -> &[SystemId] {
        match page {
            Page::Dashboard => &self.dashboard_layout,
            Page::Simulation => &self.simulation_layout,
        }
    }

    fn layout_mut(&mut self, page: Page) -> &mut Vec<SystemId> {
        match page {
            Page::Dashboard => &mut self.dashboard_layout,
            Page::Simulation => &mut self.simulation_layout,
        }
    }

    /// Swap a system with its neighbour. Returns false when nothing moved.
    pub fn move_system(&mut self, page: Page, system_id: &SystemId, direction: Direction) -> bool {
        let layout = self.layout_mut(page);
        let Some(index) = layout.iter().position(|id| id == system_id) else {
            return false;
        };
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < layout.len() => index + 1,
            _ => return false,
        };
        layout.swap(index, target);
        true
    }

    /// Returns whether the system is hidden afterwards.
    pub fn toggle_visibility(&mut self, system_id: &SystemId) -> bool {
        if let Some(pos) = self.hidden_systems.iter().position(|id| id == system_id) {
            self.hidden_systems.remove(pos);
            false
        } else {
            self.hidden_systems.push(system_id.clone());
            true
        }
    }

    pub fn is_hidden(&self, system_id: &SystemId) -> bool {
        self.hidden_systems.contains(system_id)
    }

    /// Make both layouts contain every known id exactly once, keeping the
    /// saved order for ids that survive and appending new ones at the end.
    pub fn reconcile_layouts(&mut self, known: &[SystemId]) {
        let known_set: HashSet<&SystemId> = known.iter().collect();
        for page in [Page::Dashboard, Page::Simulation] {
            let layout = self.layout_mut(page);
            let mut seen = HashSet::new();
            layout.retain(|id| known_set.contains(id) && seen.insert(id.clone()));
            for id in known {
                if !seen.contains(id) {
                    seen.insert(id.clone());
                    layout.push(id.clone());
                }
            }
        }
        self.hidden_systems.retain(|id| known_set.contains(id));
    }

    /// Systems in page order, hidden ones skipped. Unknown systems trail.
    pub fn arrange<'a>(&self, page: Page, systems: &'a [NavalSystem]) -> Vec<&'a NavalSystem> {
        let layout = self.layout(page);
        let rank = |s: &NavalSystem| layout.iter().position(|id| *id == s.id).unwrap_or(usize::MAX);
        let mut visible: Vec<&NavalSystem> = systems.iter().filter(|s| !self.is_hidden(&s.id)).collect();
        visible.sort_by_key(|s| rank(s));
        visible
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: StateDir,
}

impl SettingsStore {
    pub fn new(dir: StateDir) -> Self {
        SettingsStore { dir }
    }

    /// A corrupt file falls back to defaults instead of failing startup.
    pub fn load(&self) -> Settings {
        match self.dir.read::<Settings>(SETTINGS_FILE) {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("Failed to parse settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        self.dir.write(SETTINGS_FILE, settings)
    }

    pub fn reset(&self) -> Result<Settings, StoreError> {
        let settings = Settings::default();
        self.save(&settings)?;
        Ok(settings)
    }
}
