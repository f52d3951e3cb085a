//! Engine events and the message feed
//!
//! Every state transition emits an `EngineEvent`. The event stream is the
//! only channel by which the UI layer learns of progress: events fan out to
//! live subscribers over a broadcast channel and are appended to an in-memory
//! feed the session snapshot reads.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Event kinds emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    AgentStarted,
    AgentStopped,
    AgentCompleted,
    AgentFailed,
    AgentRestarted,
    AgentWaiting,
    TaskCreated,
    TaskAssigned,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    ArtifactWritten,
    AgentChatter,
    Summary,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentStarted => "agent.started",
            Self::AgentStopped => "agent.stopped",
            Self::AgentCompleted => "agent.completed",
            Self::AgentFailed => "agent.failed",
            Self::AgentRestarted => "agent.restarted",
            Self::AgentWaiting => "agent.waiting",
            Self::TaskCreated => "task.created",
            Self::TaskAssigned => "task.assigned",
            Self::TaskStarted => "task.started",
            Self::TaskCompleted => "task.completed",
            Self::TaskFailed => "task.failed",
            Self::ArtifactWritten => "artifact.written",
            Self::AgentChatter => "agent.chatter",
            Self::Summary => "execution.summary",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the message feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub id: String,
    pub kind: EventKind,
    /// Agent the event is about, if any.
    pub agent_id: Option<String>,
    /// Peer agent for chatter events.
    pub to_agent_id: Option<String>,
    pub task_id: Option<String>,
    /// Natural-language description for the message feed.
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl EngineEvent {
    pub fn new(kind: EventKind, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            agent_id: None,
            to_agent_id: None,
            task_id: None,
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    pub fn agent(kind: EventKind, agent_id: &str, body: impl Into<String>) -> Self {
        let mut event = Self::new(kind, body);
        event.agent_id = Some(agent_id.to_string());
        event
    }

    pub fn task(kind: EventKind, task_id: &str, body: impl Into<String>) -> Self {
        let mut event = Self::new(kind, body);
        event.task_id = Some(task_id.to_string());
        event
    }

    pub fn chatter(from_agent: &str, to_agent: &str, body: impl Into<String>) -> Self {
        let mut event = Self::new(EventKind::AgentChatter, body);
        event.agent_id = Some(from_agent.to_string());
        event.to_agent_id = Some(to_agent.to_string());
        event
    }

    pub fn with_task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }
}

/// Broadcast channel capacity; slow subscribers lose the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fans engine events out to subscribers and keeps the session feed.
pub struct EventBroadcaster {
    sender: broadcast::Sender<EngineEvent>,
    feed: RwLock<Vec<EngineEvent>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sender,
            feed: RwLock::new(Vec::new()),
        }
    }

    /// Emit an event to all subscribers and record it in the feed.
    pub fn broadcast(&self, event: EngineEvent) {
        log::debug!("[EVENTS] {} {}", event.kind, event.body);
        self.feed.write().push(event.clone());
        // No receivers is fine; the feed is the durable record.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Snapshot of the message feed, oldest first.
    pub fn feed(&self) -> Vec<EngineEvent> {
        self.feed.read().clone()
    }

    pub fn feed_len(&self) -> usize {
        self.feed.read().len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
