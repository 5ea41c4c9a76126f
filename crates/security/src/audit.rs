//! Audit logging: structured records of screening decisions.
//!
//! Every blocked input, blocked output, or off-topic refusal produces one
//! [`AuditEntry`] holding the event type, timestamp, the rule that fired and
//! a bounded excerpt of the offending text.

use crate::filter::{MatchKind, ScreeningResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    /// Session the message belonged to.
    pub session_id: String,
    /// The first characters of the blocked text.
    pub excerpt: String,
}

/// Types of auditable screening events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A user message matched an input rule
    InputBlocked { kind: MatchKind, matched: String },
    /// A generated response matched an output rule
    OutputBlocked { kind: MatchKind, matched: String },
    /// A user message failed the financial-topic check
    OffTopic { reason: String },
}

impl AuditEvent {
    /// Stable event type label, as serialized in `type`.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::InputBlocked { .. } => "input_blocked",
            Self::OutputBlocked { .. } => "output_blocked",
            Self::OffTopic { .. } => "off_topic",
        }
    }

    pub fn input_blocked(result: &ScreeningResult) -> Self {
        Self::InputBlocked {
            kind: result.kind,
            matched: result.matched_value.clone().unwrap_or_default(),
        }
    }

    pub fn output_blocked(result: &ScreeningResult) -> Self {
        Self::OutputBlocked {
            kind: result.kind,
            matched: result.matched_value.clone().unwrap_or_default(),
        }
    }
}

/// Truncate `text` to at most `max_chars` characters on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Trait for audit log sinks (where events are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// In-memory audit logger that keeps the most recent entries and forwards
/// every entry to its sinks.
pub struct AuditLogger {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
    sinks: Vec<Box<dyn AuditSink>>,
    excerpt_chars: usize,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .field("excerpt_chars", &self.excerpt_chars)
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

const DEFAULT_EXCERPT_CHARS: usize = 100;

/// Entries kept in memory; older ones are dropped.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger with the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_AUDIT_CAPACITY,
            sinks,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    pub fn with_excerpt_chars(mut self, excerpt_chars: usize) -> Self {
        self.excerpt_chars = excerpt_chars;
        self
    }

    /// Keep at most `capacity` entries in memory (at least one).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an audit event. Never fails.
    pub fn log(&self, event: AuditEvent, session_id: &str, text: &str) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            session_id: session_id.into(),
            excerpt: excerpt(text, self.excerpt_chars),
        };

        {
            let mut entries = self.lock();
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        for sink in &self.sinks {
            sink.record(&entry);
        }
    }

    /// Get all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Get entries with the given event type label.
    pub fn entries_by_type(&self, event_type: &str) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| e.event.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Clear all stored entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Count of stored entries.
    pub fn count(&self) -> usize {
        self.lock().len()
    }
}

/// A tracing-based audit sink that logs entries via `tracing::warn!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::warn!(
            event = entry.event.event_type(),
            detail = ?entry.event,
            session = %entry.session_id,
            timestamp = %entry.timestamp.to_rfc3339(),
            excerpt = %entry.excerpt,
            "AUDIT"
        );
    }
}
