//! In-memory notification center; every added entry is also logged.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rand::Rng;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.write_str("info"),
            Level::Success => f.write_str("success"),
            Level::Warning => f.write_str("warning"),
            Level::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub level: Level,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// Newest first.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    items: Vec<Notification>,
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub(crate) fn short_id(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

impl NotificationCenter {
    pub fn new() -> Self {
        NotificationCenter::default()
    }

    pub fn add(&mut self, title: impl Into<String>, description: Option<String>, level: Level) -> &Notification {
        let n = Notification {
            id: short_id(7),
            title: title.into(),
            description,
            level,
            timestamp: Utc::now(),
            read: false,
        };
        let detail = n.description.as_deref().unwrap_or("");
        match level {
            Level::Error => error!("{} {}", n.title, detail),
            Level::Warning => warn!("{} {}", n.title, detail),
            Level::Info | Level::Success => info!("{} {}", n.title, detail),
        }
        self.items.insert(0, n);
        &self.items[0]
    }

    pub fn all(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    pub fn mark_as_read(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_as_read(&mut self) {
        self.items.iter_mut().for_each(|n| n.read = true);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }
}
