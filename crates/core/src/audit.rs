use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Negotiation,
    Belief,
    Resolution,
    Collaborator,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    /// A recoverable condition was absorbed without aborting the session.
    Recovered,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub session_id: String,
    pub round: Option<u32>,
    pub actor: String,
}

impl AuditContext {
    pub fn new(session_id: impl Into<String>, round: Option<u32>, actor: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), round, actor: actor.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub session_id: String,
    pub round: Option<u32>,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        context: &AuditContext,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            session_id: context.session_id.clone(),
            round: context.round,
            event_type: event_type.into(),
            category,
            actor: context.actor.clone(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Forwards every event to an outer sink and keeps a local copy, so a
/// session can hand its own trail back with the result.
#[derive(Clone, Default)]
pub struct RecordingAuditSink<S> {
    inner: S,
    recorded: InMemoryAuditSink,
}

impl<S> RecordingAuditSink<S>
where
    S: AuditSink,
{
    pub fn new(inner: S) -> Self {
        Self { inner, recorded: InMemoryAuditSink::default() }
    }

    pub fn recorded(&self) -> Vec<AuditEvent> {
        self.recorded.events()
    }
}

impl<S> AuditSink for RecordingAuditSink<S>
where
    S: AuditSink,
{
    fn emit(&self, event: AuditEvent) {
        self.recorded.emit(event.clone());
        self.inner.emit(event);
    }
}
