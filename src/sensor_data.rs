//! Decoding and formatting of the opaque `sensor_data` column of system logs.
//!
//! The column has carried two shapes over time: an array of sensor objects
//! (current) and a flat `{"key": value}` object (legacy). Anything else
//! decodes to no readings.

use crate::i18n::{self, Language};
use crate::models::naval::{Sensor, SystemLog, WARNING_RATIO};
use log::warn;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReadingValue {
    Number(f64),
    Text(String),
}

impl ReadingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReadingValue::Number(n) => Some(*n),
            ReadingValue::Text(s) => s.trim().parse().ok(),
        }
    }

    fn from_json(v: &Value) -> Self {
        match v {
            Value::Number(n) => n.as_f64().map(ReadingValue::Number).unwrap_or_else(|| ReadingValue::Text(n.to_string())),
            Value::String(s) => ReadingValue::Text(s.clone()),
            Value::Null => ReadingValue::Text(String::new()),
            other => ReadingValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Number(n) => write!(f, "{:.2}", n),
            ReadingValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub id: Option<String>,
    pub sensor_type: Option<String>,
    pub value: ReadingValue,
    pub unit: String,
    pub safe_max: Option<f64>,
}

impl SensorReading {
    fn from_object(obj: &serde_json::Map<String, Value>) -> Self {
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        SensorReading {
            id: text("id"),
            sensor_type: text("type"),
            value: obj.get("value").map(ReadingValue::from_json).unwrap_or(ReadingValue::Text(String::new())),
            unit: text("unit").unwrap_or_default(),
            safe_max: obj.get("safe_max").and_then(Value::as_f64),
        }
    }

    /// At or above the warning band of its own `safe_max`.
    pub fn is_near_limit(&self) -> bool {
        match (self.safe_max.filter(|m| *m != 0.0), self.value.as_f64()) {
            (Some(max), Some(v)) => v >= max * WARNING_RATIO,
            _ => false,
        }
    }
}

pub fn parse_sensor_data(raw: &str) -> Vec<SensorReading> {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("Failed to parse sensor data: {}", e);
            return Vec::new();
        }
    };
    match parsed {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .map(SensorReading::from_object)
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| SensorReading {
                id: Some(key.clone()),
                sensor_type: Some("UNKNOWN".to_string()),
                value: match ReadingValue::from_json(value).as_f64() {
                    Some(n) => ReadingValue::Number(n),
                    None => ReadingValue::from_json(value),
                },
                unit: String::new(),
                safe_max: None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Known id label, then localized type, then the raw id.
pub fn display_name(reading: &SensorReading, lang: Language) -> String {
    if let Some(name) = reading.id.as_deref().and_then(|id| i18n::sensor_name(lang, id)) {
        return name.to_string();
    }
    if let Some(t) = reading.sensor_type.as_deref() {
        if let Some(label) = i18n::sensor_type_label(lang, t).filter(|_| !t.eq_ignore_ascii_case("unknown")) {
            return label.to_string();
        }
    }
    if let Some(id) = reading.id.as_deref().filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    reading
        .sensor_type
        .as_deref()
        .map(|t| i18n::sensor_type_label(lang, t).map(str::to_string).unwrap_or_else(|| t.to_string()))
        .unwrap_or_else(|| i18n::text(lang, "unknown"))
}

/// Label for a live sensor from the systems endpoint.
pub fn sensor_label(sensor: &Sensor, lang: Language) -> String {
    i18n::sensor_name(lang, &sensor.id.0)
        .or_else(|| i18n::sensor_type_label(lang, &sensor.sensor_type))
        .map(str::to_string)
        .unwrap_or_else(|| sensor.id.to_string())
}

pub fn format_reading(reading: &SensorReading, lang: Language) -> String {
    format!("{}: {} {}", display_name(reading, lang), reading.value, reading.unit)
        .trim_end()
        .to_string()
}

pub fn format_sensor_data(raw: &str, lang: Language) -> String {
    parse_sensor_data(raw)
        .iter()
        .map(|r| format_reading(r, lang))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Normal,
    Warning,
    Critical,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSeverity::Normal => f.write_str("NORMAL"),
            LogSeverity::Warning => f.write_str("WARNING"),
            LogSeverity::Critical => f.write_str("CRITICAL"),
        }
    }
}

pub fn classify_log(log: &SystemLog) -> LogSeverity {
    if log.relay_state.eq_ignore_ascii_case("TRIPPED") {
        LogSeverity::Critical
    } else if parse_sensor_data(&log.sensor_data).iter().any(SensorReading::is_near_limit) {
        LogSeverity::Warning
    } else {
        LogSeverity::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logs_fixture() -> Vec<SystemLog> {
        let json = std::fs::read_to_string("tests/data/logs.json").expect("fixture present");
        serde_json::from_str(&json).expect("parse logs")
    }

    #[test]
    fn formats_typed_reading_in_spanish() {
        let raw = r#"[{"type":"temperature","value":97.2,"unit":"°C"}]"#;
        assert_eq!(format_sensor_data(raw, Language::Es), "Temperatura: 97.20 °C");
        assert_eq!(format_sensor_data(raw, Language::En), "Temperature: 97.20 °C");
    }

    #[test]
    fn known_ids_win_over_types() {
        let raw = r#"[{"id":"sens_eng_temp","type":"TEMPERATURE","value":85,"unit":"ºC"},
                      {"id":"sens_x","value":"n/a","unit":""}]"#;
        let readings = parse_sensor_data(raw);
        assert_eq!(readings.len(), 2);
        assert_eq!(format_reading(&readings[0], Language::Es), "Temperatura del Motor: 85.00 ºC");
        assert_eq!(format_reading(&readings[1], Language::En), "sens_x: n/a");
    }

    #[test]
    fn flat_legacy_object_falls_back() {
        let readings = parse_sensor_data(r#"{"temp": 80, "rpm": "1200"}"#);
        assert_eq!(readings.len(), 2);
        let rpm = readings.iter().find(|r| r.id.as_deref() == Some("rpm")).unwrap();
        assert_eq!(rpm.value, ReadingValue::Number(1200.0));
        assert_eq!(rpm.sensor_type.as_deref(), Some("UNKNOWN"));
        assert_eq!(format_reading(rpm, Language::Es), "RPM: 1200.00");
        assert_eq!(format_sensor_data(r#"{"rpm": 1200}"#, Language::En), "RPM: 1200.00");
        assert_eq!(format_sensor_data(r#"{"curr": 3.5}"#, Language::Es), "Corriente: 3.50");
    }

    #[test]
    fn malformed_data_yields_nothing() {
        assert!(parse_sensor_data("not json").is_empty());
        assert!(parse_sensor_data("42").is_empty());
        assert!(parse_sensor_data("[1, 2]").is_empty());
        assert_eq!(format_sensor_data("", Language::Es), "");
    }

    #[test]
    fn classifies_fixture_logs() {
        let logs = logs_fixture();
        assert_eq!(classify_log(&logs[0]), LogSeverity::Critical);
        // 57.1 >= 0.9 * 60
        assert_eq!(classify_log(&logs[1]), LogSeverity::Warning);
        assert_eq!(classify_log(&logs[2]), LogSeverity::Normal);
    }
}
