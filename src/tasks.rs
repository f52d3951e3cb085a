//! Task state machine
//!
//! Owns task lifecycle (pending -> in_progress -> completed/failed),
//! assignment and dependency gating. Tasks are immutable once terminal.

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBroadcaster, EventKind};
use crate::models::{Task, TaskStatus};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// Board of all tasks in a session, keyed by task id.
pub struct TaskBoard {
    tasks: DashMap<String, Task>,
    broadcaster: Arc<EventBroadcaster>,
}

impl TaskBoard {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            tasks: DashMap::new(),
            broadcaster,
        }
    }

    /// Put a task on the board in `pending`.
    pub fn create(&self, task: Task) -> Task {
        let event = EngineEvent::task(
            EventKind::TaskCreated,
            &task.id,
            format!("Task created: {}", task.title),
        );
        self.tasks.insert(task.id.clone(), task.clone());
        self.broadcaster.broadcast(event);
        task
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    pub fn all(&self) -> Vec<Task> {
        self.tasks.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Set the assignee. Idempotent when already assigned to the same agent;
    /// reassignment of an in-progress task is rejected.
    pub fn assign(&self, task_id: &str, agent_id: &str) -> EngineResult<()> {
        let mut task = self.get_mut(task_id)?;
        if task.assigned_agent_id.as_deref() == Some(agent_id) {
            return Ok(());
        }
        if task.status == TaskStatus::InProgress {
            return Err(EngineError::TaskBusy {
                task_id: task_id.to_string(),
            });
        }
        if task.status.is_terminal() {
            let from = task.status;
            drop(task);
            return Err(self.invalid(task_id, from, "assigned".to_string()));
        }
        task.assigned_agent_id = Some(agent_id.to_string());
        task.updated_at = Utc::now();
        let event = EngineEvent::task(
            EventKind::TaskAssigned,
            task_id,
            format!("Task \"{}\" assigned", task.title),
        );
        drop(task);
        self.broadcaster.broadcast(event);
        Ok(())
    }

    /// pending -> in_progress, gated on every dependency being completed.
    /// On rejection the task is left exactly as it was.
    pub fn begin(&self, task_id: &str) -> EngineResult<()> {
        // Read phase first: dependency lookups must not overlap the write lock.
        let (status, deps) = {
            let task = self
                .tasks
                .get(task_id)
                .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;
            (task.status, task.dependencies.clone())
        };

        if status != TaskStatus::Pending {
            return Err(self.invalid(task_id, status, TaskStatus::InProgress.to_string()));
        }

        let unmet = self.unmet_among(&deps);
        if !unmet.is_empty() {
            return Err(EngineError::DependencyNotSatisfied {
                task_id: task_id.to_string(),
                unmet,
            });
        }

        let mut task = self.get_mut(task_id)?;
        task.status = TaskStatus::InProgress;
        task.updated_at = Utc::now();
        let event = EngineEvent::task(
            EventKind::TaskStarted,
            task_id,
            format!("Task \"{}\" is in progress", task.title),
        );
        drop(task);
        self.broadcaster.broadcast(event);
        Ok(())
    }

    /// in_progress -> completed.
    pub fn complete(&self, task_id: &str) -> EngineResult<()> {
        let mut task = self.get_mut(task_id)?;
        if task.status != TaskStatus::InProgress {
            let from = task.status;
            drop(task);
            return Err(self.invalid(task_id, from, TaskStatus::Completed.to_string()));
        }
        task.status = TaskStatus::Completed;
        task.updated_at = Utc::now();
        let event = EngineEvent::task(
            EventKind::TaskCompleted,
            task_id,
            format!("Task \"{}\" completed", task.title),
        );
        drop(task);
        self.broadcaster.broadcast(event);
        Ok(())
    }

    /// in_progress -> failed, recording the backend's error text.
    pub fn fail(&self, task_id: &str, reason: &str) -> EngineResult<()> {
        let mut task = self.get_mut(task_id)?;
        if task.status != TaskStatus::InProgress {
            let from = task.status;
            drop(task);
            return Err(self.invalid(task_id, from, TaskStatus::Failed.to_string()));
        }
        task.status = TaskStatus::Failed;
        task.error = Some(reason.to_string());
        task.updated_at = Utc::now();
        let event = EngineEvent::task(
            EventKind::TaskFailed,
            task_id,
            format!("Task \"{}\" failed: {}", task.title, reason),
        );
        drop(task);
        self.broadcaster.broadcast(event);
        Ok(())
    }

    /// in_progress -> pending. Used when an agent is stopped mid-flight or a
    /// dispatch fails after the task already started; the task stays
    /// restartable.
    pub fn release(&self, task_id: &str) -> EngineResult<()> {
        let mut task = self.get_mut(task_id)?;
        if task.status != TaskStatus::InProgress {
            return Ok(());
        }
        task.status = TaskStatus::Pending;
        task.updated_at = Utc::now();
        log::debug!("[TASKS] Released task {} back to pending", task.short_id());
        Ok(())
    }

    /// Next runnable task for an agent: pending, assigned to the agent, all
    /// dependencies completed; highest priority first, then oldest.
    pub fn next_pending_for(&self, agent_id: &str) -> Option<Task> {
        let mut candidates: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| {
                let task = entry.value();
                task.status == TaskStatus::Pending
                    && task.assigned_agent_id.as_deref() == Some(agent_id)
            })
            .map(|entry| entry.value().clone())
            .collect();
        candidates.retain(|task| self.unmet_among(&task.dependencies).is_empty());
        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        candidates.into_iter().next()
    }

    /// Dependency ids of `task_id` that are not yet completed. Lets callers
    /// gate before touching any other task state.
    pub fn unmet_dependencies(&self, task_id: &str) -> EngineResult<Vec<String>> {
        let deps = {
            let task = self
                .tasks
                .get(task_id)
                .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;
            task.dependencies.clone()
        };
        Ok(self.unmet_among(&deps))
    }

    fn unmet_among(
        &self,
        deps: &std::collections::BTreeSet<String>,
    ) -> Vec<String> {
        deps.iter()
            .filter(|dep| {
                self.tasks
                    .get(dep.as_str())
                    .map(|t| t.status != TaskStatus::Completed)
                    // An unknown dependency can never be satisfied.
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    fn get_mut(
        &self,
        task_id: &str,
    ) -> EngineResult<dashmap::mapref::one::RefMut<'_, String, Task>> {
        self.tasks
            .get_mut(task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))
    }

    fn invalid(&self, id: &str, from: TaskStatus, to: String) -> EngineError {
        EngineError::InvalidTransition {
            entity: "task",
            id: id.to_string(),
            from: from.to_string(),
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;

    fn board() -> TaskBoard {
        TaskBoard::new(Arc::new(EventBroadcaster::new()))
    }

    #[test]
    fn begin_requires_completed_dependencies() {
        let tasks = board();
        let dep = tasks.create(Task::new("Set up schema", "database schema"));
        let task = tasks.create(
            Task::new("Build API", "rest endpoints").with_dependencies([dep.id.clone()]),
        );

        let err = tasks.begin(&task.id).unwrap_err();
        match err {
            EngineError::DependencyNotSatisfied { unmet, .. } => {
                assert_eq!(unmet, vec![dep.id.clone()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Task left pending, untouched.
        assert_eq!(tasks.get(&task.id).unwrap().status, TaskStatus::Pending);

        tasks.begin(&dep.id).unwrap();
        tasks.complete(&dep.id).unwrap();
        tasks.begin(&task.id).unwrap();
        assert_eq!(tasks.get(&task.id).unwrap().status, TaskStatus::InProgress);
    }

    #[test]
    fn unknown_dependency_is_never_satisfied() {
        let tasks = board();
        let task = tasks.create(
            Task::new("Deploy", "ship it").with_dependencies(["ghost".to_string()]),
        );
        let err = tasks.begin(&task.id).unwrap_err();
        assert!(matches!(err, EngineError::DependencyNotSatisfied { .. }));
    }

    #[test]
    fn assign_is_idempotent_for_same_agent() {
        let tasks = board();
        let task = tasks.create(Task::new("Write tests", "unit tests"));
        tasks.assign(&task.id, "agent-1").unwrap();
        tasks.assign(&task.id, "agent-1").unwrap();
        assert_eq!(
            tasks.get(&task.id).unwrap().assigned_agent_id.as_deref(),
            Some("agent-1")
        );
    }

    #[test]
    fn reassigning_in_progress_task_is_busy() {
        let tasks = board();
        let task = tasks.create(Task::new("Write tests", "unit tests"));
        tasks.assign(&task.id, "agent-1").unwrap();
        tasks.begin(&task.id).unwrap();

        let err = tasks.assign(&task.id, "agent-2").unwrap_err();
        assert!(matches!(err, EngineError::TaskBusy { .. }));
        assert_eq!(
            tasks.get(&task.id).unwrap().assigned_agent_id.as_deref(),
            Some("agent-1")
        );
    }

    #[test]
    fn terminal_tasks_reject_further_transitions() {
        let tasks = board();
        let task = tasks.create(Task::new("One shot", "done once"));
        tasks.begin(&task.id).unwrap();
        tasks.complete(&task.id).unwrap();

        assert!(tasks.begin(&task.id).is_err());
        assert!(tasks.fail(&task.id, "nope").is_err());
        assert!(tasks.assign(&task.id, "agent-2").is_err());
    }

    #[test]
    fn release_returns_in_progress_to_pending() {
        let tasks = board();
        let task = tasks.create(Task::new("Interrupted", "stopped mid-flight"));
        tasks.begin(&task.id).unwrap();
        tasks.release(&task.id).unwrap();
        assert_eq!(tasks.get(&task.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn next_pending_prefers_priority_then_age() {
        let tasks = board();
        let low = tasks.create(
            Task::new("Low", "later")
                .with_priority(TaskPriority::Low)
                .with_assignee("agent-1"),
        );
        let high = tasks.create(
            Task::new("High", "now")
                .with_priority(TaskPriority::High)
                .with_assignee("agent-1"),
        );
        tasks.create(
            Task::new("Other agent", "not ours")
                .with_priority(TaskPriority::High)
                .with_assignee("agent-2"),
        );

        let next = tasks.next_pending_for("agent-1").unwrap();
        assert_eq!(next.id, high.id);

        tasks.begin(&high.id).unwrap();
        tasks.complete(&high.id).unwrap();
        let next = tasks.next_pending_for("agent-1").unwrap();
        assert_eq!(next.id, low.id);
    }

    #[test]
    fn next_pending_skips_blocked_tasks() {
        let tasks = board();
        let dep = tasks.create(Task::new("Blocker", "not done"));
        tasks.create(
            Task::new("Blocked", "waiting")
                .with_assignee("agent-1")
                .with_dependencies([dep.id.clone()]),
        );
        assert!(tasks.next_pending_for("agent-1").is_none());
    }
}
