//! Orchestration bridge
//!
//! The coordinator: submits work to the execution backend, polls each remote
//! handle on a fixed tick, drives agent/task transitions, runs the artifact
//! extractor over results, persists artifacts through the file store and
//! schedules continuation work. One cancellable poll loop per agent; the
//! bridge never issues a second dispatch for an agent whose loop is active.

use crate::agents::AgentRegistry;
use crate::backend::{ExecutionBackend, RemoteHandle, RemoteStatus};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBroadcaster, EventKind};
use crate::extractor::ArtifactExtractor;
use crate::models::{AgentStatus, Task};
use crate::store::FileStore;
use crate::tasks::TaskBoard;
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Progress ceiling while a task is still running remotely.
const RUNNING_PROGRESS_CAP: u8 = 90;
/// Progress nudge per observed running poll.
const RUNNING_PROGRESS_STEP: u8 = 5;

/// Things two working agents say to each other. Cosmetic only.
const CHATTER_LINES: &[&str] = &[
    "Can you confirm the response schema before I wire up the client?",
    "Heads up, I just touched the shared types.",
    "Holding off on my changes until your tests pass.",
    "Syncing up so we don't both rewrite the same module.",
];

pub struct OrchestrationBridge {
    config: EngineConfig,
    agents: Arc<AgentRegistry>,
    tasks: Arc<TaskBoard>,
    backend: Arc<dyn ExecutionBackend>,
    store: Arc<dyn FileStore>,
    broadcaster: Arc<EventBroadcaster>,
    extractor: ArtifactExtractor,
    /// One cancellation token per agent with an active poll loop.
    poll_loops: DashMap<String, CancellationToken>,
}

impl OrchestrationBridge {
    pub fn new(
        config: EngineConfig,
        agents: Arc<AgentRegistry>,
        tasks: Arc<TaskBoard>,
        backend: Arc<dyn ExecutionBackend>,
        store: Arc<dyn FileStore>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            config,
            agents,
            tasks,
            backend,
            store,
            broadcaster,
            extractor: ArtifactExtractor::new(),
            poll_loops: DashMap::new(),
        }
    }

    /// Whether an agent currently has a poll loop (one outstanding execution).
    pub fn is_polling(&self, agent_id: &str) -> bool {
        self.poll_loops.contains_key(agent_id)
    }

    /// Select the agent's next runnable task and dispatch it. Returns the
    /// task id, or `None` when the agent has nothing to pick up.
    pub async fn start_agent(self: &Arc<Self>, agent_id: &str) -> EngineResult<Option<String>> {
        let next = match self.tasks.next_pending_for(agent_id) {
            Some(task) => task,
            None => {
                log::info!("[BRIDGE] Agent {} has no runnable pending task", agent_id);
                return Ok(None);
            }
        };
        self.execute(&next.id, agent_id).await?;
        Ok(Some(next.id))
    }

    /// Dispatch one task on one agent and begin polling.
    pub async fn execute(self: &Arc<Self>, task_id: &str, agent_id: &str) -> EngineResult<()> {
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| EngineError::AgentNotFound(agent_id.to_string()))?;
        if self.tasks.get(task_id).is_none() {
            return Err(EngineError::TaskNotFound(task_id.to_string()));
        }

        // One outstanding execution per agent.
        if self.poll_loops.contains_key(agent_id) {
            return Err(EngineError::AgentBusy {
                agent_id: agent_id.to_string(),
            });
        }
        if agent.is_working() && agent.active_task_id.as_deref() != Some(task_id) {
            return Err(EngineError::AgentBusy {
                agent_id: agent_id.to_string(),
            });
        }

        // Dependency gate before anything mutates; a rejected execute must
        // leave the task exactly as it was, assignee included.
        let unmet = self.tasks.unmet_dependencies(task_id)?;
        if !unmet.is_empty() {
            return Err(EngineError::DependencyNotSatisfied {
                task_id: task_id.to_string(),
                unmet,
            });
        }

        self.tasks.assign(task_id, agent_id)?;
        self.tasks.begin(task_id)?;

        let transition = match agent.status {
            AgentStatus::Idle | AgentStatus::Waiting => self.agents.start(agent_id, task_id),
            AgentStatus::Completed | AgentStatus::Failed => self.agents.restart(agent_id, task_id),
            AgentStatus::Working => Ok(()),
        };
        if let Err(e) = transition {
            let _ = self.tasks.release(task_id);
            return Err(e);
        }

        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;

        // Dispatch is retried zero times; on failure the agent is left idle
        // and the task pending so the user can retry manually.
        let handle = match self.backend.dispatch(&agent, &task).await {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self.tasks.release(task_id);
                let _ = self.agents.stop(agent_id);
                log::error!("[BRIDGE] Dispatch failed for agent {}: {}", agent_id, e);
                return Err(e);
            }
        };

        let token = CancellationToken::new();
        self.poll_loops.insert(agent_id.to_string(), token.clone());
        self.spawn_poll_loop(agent_id.to_string(), task_id.to_string(), handle, token);
        Ok(())
    }

    /// Cancel the agent's poll loop and return it to idle. Any in-flight
    /// remote call is abandoned; its eventual terminal status is ignored.
    pub fn stop_agent(&self, agent_id: &str) -> EngineResult<()> {
        if let Some((_, token)) = self.poll_loops.remove(agent_id) {
            token.cancel();
            log::info!("[BRIDGE] Abandoned in-flight execution for agent {}", agent_id);
        }
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| EngineError::AgentNotFound(agent_id.to_string()))?;
        if let Some(task_id) = agent.active_task_id.as_deref() {
            let _ = self.tasks.release(task_id);
        }
        self.agents.stop(agent_id)
    }

    /// Stop every agent; used at session teardown.
    pub fn stop_all(&self) {
        for agent in self.agents.all() {
            let _ = self.stop_agent(&agent.id);
        }
    }

    fn spawn_poll_loop(
        self: &Arc<Self>,
        agent_id: String,
        task_id: String,
        handle: RemoteHandle,
        token: CancellationToken,
    ) {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            let started = Instant::now();
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        log::debug!("[BRIDGE] Poll loop for agent {} cancelled", agent_id);
                        // stop_agent already removed our map entry.
                        return;
                    }
                    _ = tokio::time::sleep(bridge.config.poll_interval) => {}
                }

                if started.elapsed() >= bridge.config.poll_timeout {
                    bridge.poll_loops.remove(&agent_id);
                    let reason = format!(
                        "execution timed out after {}s",
                        bridge.config.poll_timeout.as_secs()
                    );
                    bridge.finish_failure(&agent_id, &task_id, &reason).await;
                    return;
                }

                let poll = match bridge.backend.poll_status(&handle).await {
                    Ok(poll) => poll,
                    Err(e) => {
                        // Transient; the loop keeps going.
                        log::warn!(
                            "[BRIDGE] Poll failed for remote task {} (will retry): {}",
                            handle.external_task_id,
                            e
                        );
                        continue;
                    }
                };

                if !poll.status.is_terminal() {
                    bridge.bump_progress(&agent_id);
                    continue;
                }
                // A terminal result racing a cancellation must not mutate.
                if token.is_cancelled() {
                    return;
                }
                bridge.poll_loops.remove(&agent_id);
                match poll.status {
                    RemoteStatus::Completed => {
                        let result = poll.result.unwrap_or_default();
                        bridge.finish_success(&agent_id, &task_id, &result).await;
                    }
                    _ => {
                        let reason = poll
                            .error
                            .unwrap_or_else(|| "backend reported failure".to_string());
                        bridge.finish_failure(&agent_id, &task_id, &reason).await;
                    }
                }
                return;
            }
        });
    }

    fn bump_progress(&self, agent_id: &str) {
        if let Some(agent) = self.agents.get(agent_id) {
            let next = agent
                .progress
                .saturating_add(RUNNING_PROGRESS_STEP)
                .min(RUNNING_PROGRESS_CAP);
            let _ = self.agents.set_progress(agent_id, next);
        }
    }

    /// Terminal success path: extract, persist, create drafts, complete.
    async fn finish_success(self: &Arc<Self>, agent_id: &str, task_id: &str, result: &str) {
        let agent = match self.agents.get(agent_id) {
            Some(agent) => agent,
            None => return,
        };
        // A terminal result for an abandoned handle must not mutate state.
        if !agent.is_working() || agent.active_task_id.as_deref() != Some(task_id) {
            log::debug!(
                "[BRIDGE] Ignoring stale completion for agent {} (status {})",
                agent_id,
                agent.status
            );
            return;
        }

        let output = self.extractor.extract(result);
        let mut files_written = 0usize;
        for artifact in &output.artifacts {
            let message = format!("Add {} ({})", artifact.path, agent.name);
            match self
                .store
                .write_verified(
                    &artifact.path,
                    &artifact.content,
                    &message,
                    &self.config.default_branch,
                )
                .await
            {
                Ok(_) => {
                    files_written += 1;
                    self.broadcaster.broadcast(
                        EngineEvent::agent(
                            EventKind::ArtifactWritten,
                            agent_id,
                            format!("{} wrote {}", agent.name, artifact.path),
                        )
                        .with_task(task_id),
                    );
                }
                Err(e) => {
                    log::error!("[BRIDGE] Failed to persist {}: {}", artifact.path, e);
                }
            }
        }

        let mut tasks_created = 0usize;
        for draft in &output.tasks {
            let mut task =
                Task::new(&draft.title, &draft.description).with_priority(draft.priority);
            if let Some(assignee) = self.agents.find_by_name(&draft.assignee) {
                task = task.with_assignee(assignee.id);
            }
            self.tasks.create(task);
            tasks_created += 1;
        }

        if let Err(e) = self.tasks.complete(task_id) {
            log::error!("[BRIDGE] Could not complete task {}: {}", task_id, e);
        }
        if let Err(e) = self.agents.complete(agent_id) {
            log::error!("[BRIDGE] Could not complete agent {}: {}", agent_id, e);
        }

        self.broadcaster.broadcast(
            EngineEvent::agent(
                EventKind::Summary,
                agent_id,
                format!(
                    "{} finished: {} file(s) written, {} follow-up task(s) created",
                    agent.name, files_written, tasks_created
                ),
            )
            .with_task(task_id),
        );

        self.maybe_emit_chatter();
        self.schedule_continuation(agent_id.to_string());
    }

    /// Terminal failure path, also used for timeouts.
    async fn finish_failure(self: &Arc<Self>, agent_id: &str, task_id: &str, reason: &str) {
        let agent = match self.agents.get(agent_id) {
            Some(agent) => agent,
            None => return,
        };
        if !agent.is_working() || agent.active_task_id.as_deref() != Some(task_id) {
            log::debug!(
                "[BRIDGE] Ignoring stale failure for agent {} (status {})",
                agent_id,
                agent.status
            );
            return;
        }

        if let Err(e) = self.tasks.fail(task_id, reason) {
            log::error!("[BRIDGE] Could not fail task {}: {}", task_id, e);
        }
        if let Err(e) = self.agents.fail(agent_id, reason) {
            log::error!("[BRIDGE] Could not fail agent {}: {}", agent_id, e);
        }
    }

    /// After a fixed delay, re-enter working if unclaimed pending tasks
    /// remain assigned to the agent.
    fn schedule_continuation(self: &Arc<Self>, agent_id: String) {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(bridge.config.continuation_delay).await;
            match bridge.start_agent(&agent_id).await {
                Ok(Some(task_id)) => {
                    log::info!(
                        "[BRIDGE] Agent {} continued with task {}",
                        agent_id,
                        task_id
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("[BRIDGE] Continuation for agent {} failed: {}", agent_id, e);
                }
            }
        });
    }

    /// Low-probability peer message between two working agents. Purely
    /// additive: emits one feed event and touches no task or agent state.
    fn maybe_emit_chatter(&self) {
        let mut rng = rand::thread_rng();
        if rng.gen_range(0.0..1.0) >= self.config.collaboration_probability {
            return;
        }
        let working = self.agents.working_ids();
        if working.len() < 2 {
            return;
        }
        let from_idx = rng.gen_range(0..working.len());
        let mut to_idx = rng.gen_range(0..working.len() - 1);
        if to_idx >= from_idx {
            to_idx += 1;
        }
        let line = CHATTER_LINES[rng.gen_range(0..CHATTER_LINES.len())];
        self.broadcaster
            .broadcast(EngineEvent::chatter(&working[from_idx], &working[to_idx], line));
    }
}
