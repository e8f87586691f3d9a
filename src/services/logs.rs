use crate::client::{ApiError, NavalApi};
use crate::debounce::Debouncer;
use crate::i18n::{self, Language};
use crate::models::naval::{LogQuery, SystemLog};
use crate::sensor_data::{classify_log, format_sensor_data, LogSeverity};
use log::{debug, warn};
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const IDLE_WAIT: Duration = Duration::from_secs(3600);

pub fn fetch_logs<A: NavalApi>(api: &A, query: &LogQuery) -> Result<Vec<SystemLog>, ApiError> {
    let logs = api.get_logs(query)?;
    debug!("Fetched {} log(s) (limit={}, abnormal_only={})", logs.len(), query.limit, query.abnormal_only);
    Ok(logs)
}

/// Keeps only logs of the given computed severity; `None` keeps everything.
pub fn filter_severity(logs: Vec<SystemLog>, severity: Option<LogSeverity>) -> Vec<SystemLog> {
    match severity {
        None => logs,
        Some(wanted) => logs.into_iter().filter(|log| classify_log(log) == wanted).collect(),
    }
}

pub fn render_log(log: &SystemLog, lang: Language) -> String {
    let mut line = format!(
        "#{:<6} {} {:<26} {:<8} [{}] {}",
        log.id.0,
        log.timestamp.format("%Y-%m-%d %H:%M:%S"),
        log.system_name,
        log.relay_state,
        classify_log(log),
        format_sensor_data(&log.sensor_data, lang)
    );
    if log.is_attack {
        let ip = log.source_ip.clone().unwrap_or_else(|| i18n::text(lang, "unknown_ip"));
        line.push_str(&format!(" ATTACK from {}", ip));
    }
    line
}

pub fn print_logs<W: Write>(out: &mut W, logs: &[SystemLog], lang: Language) -> io::Result<()> {
    if logs.is_empty() {
        writeln!(out, "(no logs)")?;
    }
    for log in logs {
        writeln!(out, "{}", render_log(log, lang))?;
    }
    Ok(())
}

/// Reads one query per input line and runs only the last query of each
/// typing burst, once the debouncer's quiet period has passed. End of input
/// flushes a still-pending query.
///
/// The reader thread is detached: a failed write returns at once instead of
/// waiting for the next input line.
pub fn search_loop<A, R, W>(
    api: &A,
    input: R,
    out: &mut W,
    base: &LogQuery,
    severity: Option<LogSeverity>,
    mut debouncer: Debouncer<String>,
    lang: Language,
) -> io::Result<()>
where
    A: NavalApi,
    R: BufRead + Send + 'static,
    W: Write,
{
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in input.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read search input: {}", e);
                    break;
                }
            }
        }
    });

    loop {
        let wait = debouncer.remaining(Instant::now()).unwrap_or(IDLE_WAIT);
        match rx.recv_timeout(wait) {
            Ok(line) => debouncer.submit(line, Instant::now()),
            Err(RecvTimeoutError::Timeout) => {
                if let Some(query) = debouncer.ready(Instant::now()) {
                    run_search(api, out, base, severity, query, lang)?;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(query) = debouncer.flush() {
                    run_search(api, out, base, severity, query, lang)?;
                }
                return Ok(());
            }
        }
    }
}

fn run_search<A: NavalApi, W: Write>(
    api: &A,
    out: &mut W,
    base: &LogQuery,
    severity: Option<LogSeverity>,
    query: String,
    lang: Language,
) -> io::Result<()> {
    let query = LogQuery {
        search: Some(query),
        ..base.clone()
    };
    match fetch_logs(api, &query) {
        Ok(logs) => {
            let logs = filter_severity(logs, severity);
            writeln!(out, "-- search '{}': {} result(s)", query.search.as_deref().unwrap_or("").trim(), logs.len())?;
            print_logs(out, &logs, lang)
        }
        Err(e) => writeln!(out, "error: {}", e),
    }
}
