use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of notification pushed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    HealthAlert,
    Appointment,
    Order,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            NotificationKind::HealthAlert => "health_alert",
            NotificationKind::Appointment => "appointment",
            NotificationKind::Order => "order",
        };
        f.write_str(value)
    }
}

/// A notification delivered over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// Notifications received during a session, newest first.
///
/// Delivery order over the channel is not monotonic, so events are kept
/// sorted by timestamp on insert. Events with an id already present replace
/// the stored copy but never clear its read flag.
#[derive(Debug, Clone, Default)]
pub struct NotificationInbox {
    events: Vec<NotificationEvent>,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, mut event: NotificationEvent) {
        if let Some(position) = self.events.iter().position(|e| e.id == event.id) {
            let existing = self.events.remove(position);
            event.read |= existing.read;
        }
        let index = self
            .events
            .partition_point(|e| e.timestamp >= event.timestamp);
        self.events.insert(index, event);
    }

    /// Events ordered by timestamp, newest first.
    pub fn events(&self) -> &[NotificationEvent] {
        &self.events
    }

    /// Mark one event read. Returns false when the id is unknown.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.events.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                event.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for event in &mut self.events {
            event.read = true;
        }
    }

    pub fn unread_count(&self) -> usize {
        self.events.iter().filter(|e| !e.read).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
