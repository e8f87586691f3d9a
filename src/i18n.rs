//! Labels needed to render readings and alerts in the operator's language.
//!
//! Lookups fall back to the key itself, so an unknown sensor type still
//! renders as whatever the backend sent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Es => f.write_str("es"),
            Language::En => f.write_str("en"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Language::Es),
            "en" => Ok(Language::En),
            other => Err(format!("unsupported language '{other}' (expected es or en)")),
        }
    }
}

// (type key, es, en); keys are matched case-insensitively
const SENSOR_TYPES: &[(&str, &str, &str)] = &[
    ("temperature", "Temperatura", "Temperature"),
    ("pressure", "Presión", "Pressure"),
    ("vibration", "Vibración", "Vibration"),
    ("rpm", "RPM", "RPM"),
    ("voltage", "Voltaje", "Voltage"),
    ("current", "Corriente", "Current"),
    ("frequency", "Frecuencia", "Frequency"),
    ("humidity", "Humedad", "Humidity"),
    ("level", "Nivel", "Level"),
    ("flow", "Flujo", "Flow"),
    ("unknown", "Desconocido", "Unknown"),
];

// (id, es, en)
const SENSOR_NAMES: &[(&str, &str, &str)] = &[
    ("sens_eng_temp", "Temperatura del Motor", "Engine Temperature"),
    ("sens_eng_rpm", "Revoluciones del Motor (RPM)", "Engine Speed (RPM)"),
    ("sens_gen_volt", "Voltaje del Generador", "Generator Voltage"),
    ("sens_gen_curr", "Corriente del Generador", "Generator Current"),
    ("sens_bilge_curr", "Corriente Bomba de Achique", "Bilge Pump Current"),
    ("sens_radar_temp", "Temperatura del Radar", "Radar Temperature"),
    ("sens_steer_volt", "Voltaje del Timón", "Steering Voltage"),
    ("sens_fire_temp", "Sensor Tº Incendios", "Fire Temperature Sensor"),
    ("sens_weapon_temp", "Temperatura Sistema CMS", "CMS Temperature"),
    // flat legacy keys
    ("temp", "Temperatura", "Temperature"),
    ("rpm", "RPM", "RPM"),
    ("volt", "Voltaje", "Voltage"),
    ("curr", "Corriente", "Current"),
];

fn pick(lang: Language, es: &'static str, en: &'static str) -> &'static str {
    match lang {
        Language::Es => es,
        Language::En => en,
    }
}

/// Localized label for a sensor type (`TEMPERATURE`, `voltage`, ...).
pub fn sensor_type_label(lang: Language, sensor_type: &str) -> Option<&'static str> {
    SENSOR_TYPES
        .iter()
        .find(|(key, _, _)| key.eq_ignore_ascii_case(sensor_type.trim()))
        .map(|(_, es, en)| pick(lang, es, en))
}

/// Localized label for a well-known sensor id.
pub fn sensor_name(lang: Language, sensor_id: &str) -> Option<&'static str> {
    SENSOR_NAMES
        .iter()
        .find(|(id, _, _)| *id == sensor_id)
        .map(|(_, es, en)| pick(lang, es, en))
}

/// Generic message catalogue used by alerts and command output.
pub fn text(lang: Language, key: &str) -> String {
    let found = match (lang, key) {
        (Language::Es, "unknown") => "Desconocido",
        (Language::En, "unknown") => "Unknown",
        (Language::Es, "unknown_ip") => "Desconocida",
        (Language::En, "unknown_ip") => "Unknown",
        (Language::Es, "backend_unreachable") => "Error conectando con los servicios del backend",
        (Language::En, "backend_unreachable") => "Error connecting to backend services",
        (Language::Es, "invalid_credentials") => "Nombre de usuario o contraseña incorrectos",
        (Language::En, "invalid_credentials") => "Incorrect username or password",
        _ => return key.to_string(),
    };
    found.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_labels_are_case_insensitive() {
        assert_eq!(sensor_type_label(Language::Es, "TEMPERATURE"), Some("Temperatura"));
        assert_eq!(sensor_type_label(Language::Es, "temperature"), Some("Temperatura"));
        assert_eq!(sensor_type_label(Language::En, "Voltage"), Some("Voltage"));
        assert_eq!(sensor_type_label(Language::En, "sonar"), None);
    }

    #[test]
    fn sensor_names_and_catalogue_fall_back() {
        assert_eq!(sensor_name(Language::Es, "sens_radar_temp"), Some("Temperatura del Radar"));
        assert_eq!(sensor_name(Language::En, "sens_unknown"), None);
        assert_eq!(text(Language::En, "invalid_credentials"), "Incorrect username or password");
        assert_eq!(text(Language::Es, "no.such.key"), "no.such.key");
    }

    #[test]
    fn language_round_trips_through_str() {
        assert_eq!("EN".parse::<Language>(), Ok(Language::En));
        assert_eq!(Language::default().to_string(), "es");
        assert!("fr".parse::<Language>().is_err());
    }
}
