//! Operational events recorded by pushes

use crate::storage::paths::PorterPaths;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Kind of recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "push")]
    ImagePush,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImagePush => "push",
        }
    }
}

/// A single event, written once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Image ID the event refers to
    pub id: String,
    /// Destination or name as given by the caller
    pub name: String,
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: EventKind,
}

impl Event {
    pub fn image_push(id: &str, destination: &str) -> Self {
        Self {
            id: id.to_string(),
            name: destination.to_string(),
            time: Utc::now(),
            kind: EventKind::ImagePush,
        }
    }
}

/// Receives events; emitting never fails the caller
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Event sink appending one JSON object per line to `events.jsonl`
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(paths: &PorterPaths) -> Self {
        Self {
            path: paths.events_log(),
        }
    }

    fn append(&self, event: &Event) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Read every recorded event, oldest first
    pub fn read_all(&self) -> Result<Vec<Event>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        let mut events = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(e) => tracing::debug!("Skipping malformed event line: {}", e),
            }
        }
        Ok(events)
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: Event) {
        if let Err(e) = self.append(&event) {
            tracing::warn!("Failed to record {} event for {}: {}", event.kind.as_str(), event.id, e);
        }
    }
}

/// Event sink that keeps events in memory
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Emits its event when dropped, so every exit path of the owning scope
/// records it. The event is stamped when the guard is created.
pub(crate) struct EventGuard<'a> {
    sink: Option<&'a dyn EventSink>,
    event: Option<Event>,
}

impl<'a> EventGuard<'a> {
    pub(crate) fn new(sink: Option<&'a dyn EventSink>, event: Event) -> Self {
        Self {
            sink,
            event: Some(event),
        }
    }
}

impl Drop for EventGuard<'_> {
    fn drop(&mut self) {
        if let (Some(sink), Some(event)) = (self.sink, self.event.take()) {
            sink.emit(event);
        }
    }
}
