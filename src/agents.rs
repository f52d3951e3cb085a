//! Agent state machine
//!
//! Owns one agent's lifecycle (idle -> working -> completed/failed, plus
//! waiting), its progress percentage and the currently active task. Every
//! transition emits a feed event; the machine renders nothing itself.

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBroadcaster, EventKind};
use crate::models::{Agent, AgentStatus, AgentType};
use dashmap::DashMap;
use std::sync::Arc;

/// Progress shown as soon as an agent picks up work.
const START_PROGRESS: u8 = 10;

/// Registry of all agents in a session, keyed by agent id.
pub struct AgentRegistry {
    agents: DashMap<String, Agent>,
    broadcaster: Arc<EventBroadcaster>,
}

impl AgentRegistry {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            agents: DashMap::new(),
            broadcaster,
        }
    }

    /// Register a new agent. Agents are created once per project and never
    /// deleted during a session.
    pub fn create(&self, name: impl Into<String>, agent_type: AgentType) -> Agent {
        let agent = Agent::new(name, agent_type);
        self.agents.insert(agent.id.clone(), agent.clone());
        agent
    }

    pub fn get(&self, agent_id: &str) -> Option<Agent> {
        self.agents.get(agent_id).map(|a| a.clone())
    }

    /// Look an agent up by display name or role, case-insensitive. Used to
    /// resolve the free-text assignee in extracted task records.
    pub fn find_by_name(&self, name: &str) -> Option<Agent> {
        let needle = name.trim().to_lowercase();
        self.agents.iter().find_map(|entry| {
            let agent = entry.value();
            if agent.name.to_lowercase() == needle
                || agent.agent_type.as_str() == needle
                || needle.contains(agent.agent_type.as_str())
            {
                Some(agent.clone())
            } else {
                None
            }
        })
    }

    pub fn all(&self) -> Vec<Agent> {
        self.agents.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Ids of agents currently in `working`.
    pub fn working_ids(&self) -> Vec<String> {
        self.agents
            .iter()
            .filter(|entry| entry.value().is_working())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// idle|waiting -> working, progress 10, task bound.
    pub fn start(&self, agent_id: &str, task_id: &str) -> EngineResult<()> {
        let mut agent = self.get_mut(agent_id)?;
        match agent.status {
            AgentStatus::Idle | AgentStatus::Waiting => {
                agent.status = AgentStatus::Working;
                agent.progress = START_PROGRESS;
                agent.active_task_id = Some(task_id.to_string());
                let body = format!("{} started working", agent.name);
                let event = EngineEvent::agent(EventKind::AgentStarted, agent_id, body)
                    .with_task(task_id);
                drop(agent);
                self.broadcaster.broadcast(event);
                Ok(())
            }
            AgentStatus::Working => Err(EngineError::AgentBusy {
                agent_id: agent_id.to_string(),
            }),
            other => Err(self.invalid(agent_id, other, AgentStatus::Working)),
        }
    }

    /// completed|failed -> working (re-entry), progress reset to 10.
    pub fn restart(&self, agent_id: &str, task_id: &str) -> EngineResult<()> {
        let mut agent = self.get_mut(agent_id)?;
        match agent.status {
            AgentStatus::Completed | AgentStatus::Failed => {
                agent.status = AgentStatus::Working;
                agent.progress = START_PROGRESS;
                agent.active_task_id = Some(task_id.to_string());
                agent.last_error = None;
                let body = format!("{} picked up new work", agent.name);
                let event = EngineEvent::agent(EventKind::AgentRestarted, agent_id, body)
                    .with_task(task_id);
                drop(agent);
                self.broadcaster.broadcast(event);
                Ok(())
            }
            other => Err(self.invalid(agent_id, other, AgentStatus::Working)),
        }
    }

    /// Any state -> idle; progress reset, active task cleared. Always
    /// succeeds; this is the cancellation path.
    pub fn stop(&self, agent_id: &str) -> EngineResult<()> {
        let mut agent = self.get_mut(agent_id)?;
        let was = agent.status;
        agent.status = AgentStatus::Idle;
        agent.progress = 0;
        agent.active_task_id = None;
        let body = format!("{} was stopped and is idle", agent.name);
        let event = EngineEvent::agent(EventKind::AgentStopped, agent_id, body);
        drop(agent);
        if was != AgentStatus::Idle {
            self.broadcaster.broadcast(event);
        }
        Ok(())
    }

    /// working -> completed, progress 100.
    pub fn complete(&self, agent_id: &str) -> EngineResult<()> {
        let mut agent = self.get_mut(agent_id)?;
        if agent.status != AgentStatus::Working {
            let from = agent.status;
            drop(agent);
            return Err(self.invalid(agent_id, from, AgentStatus::Completed));
        }
        agent.status = AgentStatus::Completed;
        agent.progress = 100;
        agent.active_task_id = None;
        let body = format!("{} finished its task", agent.name);
        let event = EngineEvent::agent(EventKind::AgentCompleted, agent_id, body);
        drop(agent);
        self.broadcaster.broadcast(event);
        Ok(())
    }

    /// working -> failed; progress preserved for diagnostics, reason kept.
    pub fn fail(&self, agent_id: &str, reason: &str) -> EngineResult<()> {
        let mut agent = self.get_mut(agent_id)?;
        if agent.status != AgentStatus::Working {
            let from = agent.status;
            drop(agent);
            return Err(self.invalid(agent_id, from, AgentStatus::Failed));
        }
        agent.status = AgentStatus::Failed;
        agent.last_error = Some(reason.to_string());
        let body = format!("{} failed: {}", agent.name, reason);
        let event = EngineEvent::agent(EventKind::AgentFailed, agent_id, body);
        drop(agent);
        self.broadcaster.broadcast(event);
        Ok(())
    }

    /// working -> waiting (blocked on a dependency).
    pub fn wait(&self, agent_id: &str, on: &str) -> EngineResult<()> {
        let mut agent = self.get_mut(agent_id)?;
        if agent.status != AgentStatus::Working {
            let from = agent.status;
            drop(agent);
            return Err(self.invalid(agent_id, from, AgentStatus::Waiting));
        }
        agent.status = AgentStatus::Waiting;
        let body = format!("{} is waiting on {}", agent.name, on);
        let event = EngineEvent::agent(EventKind::AgentWaiting, agent_id, body);
        drop(agent);
        self.broadcaster.broadcast(event);
        Ok(())
    }

    /// Progress updates are only honored while working; values clamp to 100.
    pub fn set_progress(&self, agent_id: &str, progress: u8) -> EngineResult<()> {
        let mut agent = self.get_mut(agent_id)?;
        if agent.status != AgentStatus::Working {
            return Ok(());
        }
        agent.progress = progress.min(100);
        Ok(())
    }

    fn get_mut(
        &self,
        agent_id: &str,
    ) -> EngineResult<dashmap::mapref::one::RefMut<'_, String, Agent>> {
        self.agents
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::AgentNotFound(agent_id.to_string()))
    }

    fn invalid(&self, id: &str, from: AgentStatus, to: AgentStatus) -> EngineError {
        EngineError::InvalidTransition {
            entity: "agent",
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(Arc::new(EventBroadcaster::new()))
    }

    #[test]
    fn start_binds_task_and_sets_progress() {
        let agents = registry();
        let agent = agents.create("Frontend Agent", AgentType::Frontend);

        agents.start(&agent.id, "t1").unwrap();
        let current = agents.get(&agent.id).unwrap();
        assert_eq!(current.status, AgentStatus::Working);
        assert_eq!(current.progress, 10);
        assert_eq!(current.active_task_id.as_deref(), Some("t1"));
    }

    #[test]
    fn start_while_working_is_rejected() {
        let agents = registry();
        let agent = agents.create("Backend Agent", AgentType::Backend);
        agents.start(&agent.id, "t1").unwrap();

        let err = agents.start(&agent.id, "t2").unwrap_err();
        assert!(matches!(err, EngineError::AgentBusy { .. }));
        // No partial application.
        let current = agents.get(&agent.id).unwrap();
        assert_eq!(current.active_task_id.as_deref(), Some("t1"));
    }

    #[test]
    fn stop_always_returns_to_idle() {
        let agents = registry();
        let agent = agents.create("DevOps Agent", AgentType::Devops);
        agents.start(&agent.id, "t1").unwrap();

        agents.stop(&agent.id).unwrap();
        let current = agents.get(&agent.id).unwrap();
        assert_eq!(current.status, AgentStatus::Idle);
        assert_eq!(current.progress, 0);
        assert!(current.active_task_id.is_none());
    }

    #[test]
    fn fail_preserves_progress_and_records_reason() {
        let agents = registry();
        let agent = agents.create("Testing Agent", AgentType::Testing);
        agents.start(&agent.id, "t1").unwrap();
        agents.set_progress(&agent.id, 60).unwrap();

        agents.fail(&agent.id, "backend exploded").unwrap();
        let current = agents.get(&agent.id).unwrap();
        assert_eq!(current.status, AgentStatus::Failed);
        assert_eq!(current.progress, 60);
        assert_eq!(current.last_error.as_deref(), Some("backend exploded"));
    }

    #[test]
    fn restart_reenters_working_from_terminal() {
        let agents = registry();
        let agent = agents.create("Architect Agent", AgentType::Architect);
        agents.start(&agent.id, "t1").unwrap();
        agents.complete(&agent.id).unwrap();

        agents.restart(&agent.id, "t2").unwrap();
        let current = agents.get(&agent.id).unwrap();
        assert_eq!(current.status, AgentStatus::Working);
        assert_eq!(current.progress, 10);
        assert_eq!(current.active_task_id.as_deref(), Some("t2"));
    }

    #[test]
    fn restart_from_idle_is_invalid() {
        let agents = registry();
        let agent = agents.create("Architect Agent", AgentType::Architect);
        let err = agents.restart(&agent.id, "t1").unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn wait_parks_a_working_agent_until_started_or_stopped() {
        let agents = registry();
        let agent = agents.create("Backend Agent", AgentType::Backend);
        agents.start(&agent.id, "t1").unwrap();

        agents.wait(&agent.id, "the schema task").unwrap();
        assert_eq!(agents.get(&agent.id).unwrap().status, AgentStatus::Waiting);

        // Waiting agents resume through start, like idle ones.
        agents.start(&agent.id, "t2").unwrap();
        let current = agents.get(&agent.id).unwrap();
        assert_eq!(current.status, AgentStatus::Working);
        assert_eq!(current.active_task_id.as_deref(), Some("t2"));

        agents.wait(&agent.id, "t1 again").unwrap();
        agents.stop(&agent.id).unwrap();
        assert_eq!(agents.get(&agent.id).unwrap().status, AgentStatus::Idle);
    }

    #[test]
    fn wait_requires_working() {
        let agents = registry();
        let agent = agents.create("Testing Agent", AgentType::Testing);
        let err = agents.wait(&agent.id, "anything").unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn progress_updates_ignored_when_not_working() {
        let agents = registry();
        let agent = agents.create("Backend Agent", AgentType::Backend);
        agents.set_progress(&agent.id, 50).unwrap();
        assert_eq!(agents.get(&agent.id).unwrap().progress, 0);
    }

    #[test]
    fn transitions_emit_feed_events() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let agents = AgentRegistry::new(broadcaster.clone());
        let agent = agents.create("Frontend Agent", AgentType::Frontend);
        agents.start(&agent.id, "t1").unwrap();
        agents.complete(&agent.id).unwrap();

        let feed = broadcaster.feed();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].kind, EventKind::AgentStarted);
        assert_eq!(feed[1].kind, EventKind::AgentCompleted);
        assert!(feed[1].body.contains("Frontend Agent"));
    }
}
