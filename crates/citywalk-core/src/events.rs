use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Event type names emitted by the frame coordinator.
pub mod names {
    pub const PROMPT_SHOW: &str = "prompt.show";
    pub const PROMPT_HIDE: &str = "prompt.hide";
    pub const CHAT_OPEN: &str = "chat.open";
    pub const CHAT_CLOSE: &str = "chat.close";
    pub const MOTION_CHANGED: &str = "motion.changed";
    pub const JUMP_START: &str = "jump.start";
    pub const JUMP_LAND: &str = "jump.land";
}

/// A game event with a type name and arbitrary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub event_type: String,
    pub data: HashMap<String, serde_json::Value>,
    pub timestamp: f64,
}

/// Central event bus with ring buffer logging.
pub struct EventBus {
    log: VecDeque<GameEvent>,
    log_capacity: usize,
    log_file: Option<PathBuf>,
    total_time: f64,
    pending: Vec<GameEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            log: VecDeque::with_capacity(log_capacity),
            log_capacity: log_capacity.max(1),
            log_file: None,
            total_time: 0.0,
            pending: Vec::new(),
        }
    }

    /// Append every flushed event to `path` as one JSON object per line.
    pub fn enable_file_logging(&mut self, path: PathBuf) {
        tracing::info!("Event log -> {}", path.display());
        self.log_file = Some(path);
    }

    /// Queue an event for the next flush.
    pub fn emit(&mut self, event_type: &str, data: HashMap<String, serde_json::Value>) {
        self.pending.push(GameEvent {
            event_type: event_type.to_string(),
            data,
            timestamp: self.total_time,
        });
    }

    pub fn emit_simple(&mut self, event_type: &str) {
        self.emit(event_type, HashMap::new());
    }

    /// Emit with a single named field.
    pub fn emit_with(&mut self, event_type: &str, key: &str, value: serde_json::Value) {
        let mut data = HashMap::new();
        data.insert(key.to_string(), value);
        self.emit(event_type, data);
    }

    /// Move pending events into the ring buffer and the log file.
    /// Returns what was flushed.
    pub fn flush(&mut self) -> Vec<GameEvent> {
        let events: Vec<GameEvent> = self.pending.drain(..).collect();

        for event in &events {
            if self.log.len() >= self.log_capacity {
                self.log.pop_front();
            }
            self.log.push_back(event.clone());

            if let Some(log_path) = &self.log_file {
                if let Err(e) = append_json_line(log_path, event) {
                    tracing::warn!("Failed to write event log {}: {}", log_path.display(), e);
                }
            }
        }

        events
    }

    pub fn tick(&mut self, dt: f64) {
        if dt.is_finite() && dt > 0.0 {
            self.total_time += dt;
        }
    }

    /// Number of logged events of the given type still in the ring buffer.
    pub fn count(&self, event_type: &str) -> usize {
        self.log.iter().filter(|e| e.event_type == event_type).count()
    }
}

fn append_json_line(path: &std::path::Path, event: &GameEvent) -> std::io::Result<()> {
    use std::io::Write;
    let json = serde_json::to_string(event).map_err(std::io::Error::other)?;
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(f, "{}", json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_is_queued_until_flush() {
        let mut bus = EventBus::new(100);
        bus.emit_with(names::MOTION_CHANGED, "state", serde_json::json!("walk"));
        assert_eq!(bus.count(names::MOTION_CHANGED), 0);

        let flushed = bus.flush();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].data["state"], "walk");
        assert_eq!(bus.count(names::MOTION_CHANGED), 1);
        assert!(bus.flush().is_empty());
    }

    #[test]
    fn test_ring_buffer_capacity() {
        let mut bus = EventBus::new(3);
        for i in 0..5 {
            bus.emit_with(names::JUMP_START, "i", serde_json::json!(i));
        }
        bus.flush();

        // Oldest two dropped
        assert_eq!(bus.count(names::JUMP_START), 3);
    }

    #[test]
    fn test_timestamps_follow_tick() {
        let mut bus = EventBus::new(8);
        bus.tick(0.5);
        bus.tick(f64::NAN);
        bus.emit_simple(names::PROMPT_SHOW);
        let flushed = bus.flush();
        assert!((flushed[0].timestamp - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_file_log_appends_lines() {
        let path = std::env::temp_dir().join(format!("citywalk_events_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let mut bus = EventBus::new(8);
        bus.enable_file_logging(path.clone());
        bus.emit_simple(names::CHAT_OPEN);
        bus.emit_simple(names::CHAT_CLOSE);
        bus.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("chat.close"));
        let _ = std::fs::remove_file(&path);
    }
}
