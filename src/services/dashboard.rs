use crate::client::{ApiError, NavalApi};
use crate::i18n::Language;
use crate::models::naval::{LogQuery, NavalSystem, RelayState, SystemLog};
use crate::sensor_data::{classify_log, format_sensor_data};
use crate::services::poller::PollTarget;
use crate::settings::{Page, Settings};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Logs considered for the dashboard summary.
pub const DASHBOARD_LOG_WINDOW: u32 = 150;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertBucket {
    pub minute: String,
    pub alerts: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_systems: usize,
    pub active: usize,
    pub tripped: usize,
    pub inactive: usize,
    pub uptime_pct: f64,
    pub total_events: i64,
    pub active_alerts: usize,
    pub alerts_per_minute: Vec<AlertBucket>,
}

fn minute_floor(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp().div_euclid(60) * 60, 0).unwrap_or(ts)
}

/// Summary over every system; hidden ones are only left out of listings.
pub fn compute_stats(systems: &[NavalSystem], logs: &[SystemLog], now: DateTime<Utc>) -> DashboardStats {
    let count = |state: RelayState| systems.iter().filter(|s| s.relay.state == state).count();
    let active = count(RelayState::On);
    let tripped = count(RelayState::Tripped);
    let inactive = count(RelayState::Off);
    let total = systems.len();

    let alerts: Vec<&SystemLog> = logs.iter().filter(|l| l.is_abnormal || l.is_attack).collect();
    let mut buckets: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
    for log in &alerts {
        *buckets.entry(minute_floor(log.timestamp)).or_default() += 1;
    }
    let mut alerts_per_minute: Vec<AlertBucket> = buckets
        .into_iter()
        .map(|(minute, alerts)| AlertBucket {
            minute: minute.format("%H:%M").to_string(),
            alerts,
        })
        .collect();
    if alerts_per_minute.is_empty() {
        alerts_per_minute.push(AlertBucket {
            minute: now.format("%H:%M").to_string(),
            alerts: 0,
        });
    }

    DashboardStats {
        total_systems: total,
        active,
        tripped,
        inactive,
        uptime_pct: (active + inactive) as f64 / total.max(1) as f64 * 100.0,
        total_events: logs.iter().map(|l| l.id.0).max().unwrap_or(0),
        active_alerts: alerts.len(),
        alerts_per_minute,
    }
}

pub fn render(stats: &DashboardStats, systems: &[NavalSystem], logs: &[SystemLog], settings: &Settings, lang: Language) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "systems {}  active {}  tripped {}  inactive {}  uptime {:.1}%  events {}  alerts {}",
        stats.total_systems,
        stats.active,
        stats.tripped,
        stats.inactive,
        stats.uptime_pct,
        stats.total_events,
        stats.active_alerts
    );
    let buckets = stats
        .alerts_per_minute
        .iter()
        .map(|b| format!("{}={}", b.minute, b.alerts))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(out, "alerts/min {}", buckets);
    for system in settings.arrange(Page::Dashboard, systems) {
        let _ = writeln!(out, "  {:<28} {:<8} {} sensor(s)", system.name, system.relay.state.as_str(), system.sensors.len());
    }
    for log in logs.iter().filter(|l| l.is_abnormal || l.is_attack).take(5) {
        let _ = writeln!(
            out,
            "  #{} {} {} [{}] {}",
            log.id.0,
            log.timestamp.format("%H:%M:%S"),
            log.system_name,
            classify_log(log),
            format_sensor_data(&log.sensor_data, lang)
        );
    }
    out
}

pub struct DashboardView<A> {
    api: A,
    settings: Settings,
    language: Language,
    echo: bool,
    stats: Option<DashboardStats>,
}

impl<A: NavalApi> DashboardView<A> {
    pub fn new(api: A, settings: Settings, language: Language, echo: bool) -> Self {
        DashboardView {
            api,
            settings,
            language,
            echo,
            stats: None,
        }
    }

    pub fn stats(&self) -> Option<&DashboardStats> {
        self.stats.as_ref()
    }
}

pub struct DashboardPoll {
    systems: Vec<NavalSystem>,
    logs: Vec<SystemLog>,
    at: DateTime<Utc>,
}

impl<A: NavalApi> PollTarget for DashboardView<A> {
    type Output = DashboardPoll;

    fn name(&self) -> &str {
        "dashboard"
    }

    fn fetch(&mut self) -> Result<DashboardPoll, ApiError> {
        let systems = self.api.get_systems()?;
        let logs = self.api.get_logs(&LogQuery::recent(DASHBOARD_LOG_WINDOW))?;
        Ok(DashboardPoll {
            systems,
            logs,
            at: Utc::now(),
        })
    }

    fn commit(&mut self, poll: DashboardPoll) {
        let stats = compute_stats(&poll.systems, &poll.logs, poll.at);
        if self.echo {
            println!("{}", render(&stats, &poll.systems, &poll.logs, &self.settings, self.language));
        }
        self.stats = Some(stats);
    }
}
