//! Task list presenter
//!
//! Deduplicates and orders the task stream for display. Pure function of the
//! current task collection: deterministic and never mutating its input.

use crate::models::Task;
use once_cell::sync::Lazy;
use regex::Regex;

/// Leading bracketed agent-name prefix, e.g. "[Frontend Agent] Add login".
static AGENT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[^\]]*\]\s*").unwrap());

/// How much of the description two near-duplicate tasks must share.
const DESCRIPTION_PREFIX_LEN: usize = 50;

/// Collapse duplicates and order most recently created first.
pub fn present(tasks: &[Task]) -> Vec<Task> {
    // Newest first, with id as a stable tiebreaker for equal timestamps.
    let mut ordered: Vec<Task> = tasks.to_vec();
    ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

    // Pass 1: group by normalized title, keep the newest of each group.
    let mut kept: Vec<Task> = Vec::with_capacity(ordered.len());
    let mut seen_titles: Vec<String> = Vec::new();
    for task in ordered {
        let key = normalize_title(&task.title);
        if seen_titles.contains(&key) {
            continue;
        }
        seen_titles.push(key);
        kept.push(task);
    }

    // Pass 2: collapse distinct-titled near-duplicates that share assignee,
    // status, and a 50-character description prefix, again keeping the newer.
    let mut deduped: Vec<Task> = Vec::with_capacity(kept.len());
    for task in kept {
        let duplicate = deduped.iter().any(|other| {
            task.assigned_agent_id.is_some()
                && task.assigned_agent_id == other.assigned_agent_id
                && task.status == other.status
                && shared_description_prefix(&task.description, &other.description)
        });
        if !duplicate {
            deduped.push(task);
        }
    }

    deduped
}

/// Strip a bracketed agent prefix and collapse to lowercase alphanumerics.
fn normalize_title(title: &str) -> String {
    let stripped = AGENT_PREFIX.replace(title, "");
    stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn shared_description_prefix(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let a_prefix: String = a.chars().take(DESCRIPTION_PREFIX_LEN).collect();
    let b_prefix: String = b.chars().take(DESCRIPTION_PREFIX_LEN).collect();
    a_prefix == b_prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use chrono::{Duration, Utc};

    fn task_at(title: &str, description: &str, offset_secs: i64) -> Task {
        let mut task = Task::new(title, description);
        task.created_at = Utc::now() + Duration::seconds(offset_secs);
        task.updated_at = task.created_at;
        task
    }

    #[test]
    fn newer_task_wins_title_dedup() {
        let older = task_at("Add login", "login form", 0);
        let newer = task_at("add login!", "login form v2", 10);
        let newer_id = newer.id.clone();

        let shown = present(&[older, newer]);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, newer_id);
    }

    #[test]
    fn bracketed_agent_prefix_is_ignored() {
        let plain = task_at("Build dashboard", "widgets", 0);
        let prefixed = task_at("[Frontend Agent] Build Dashboard", "widgets v2", 5);
        let prefixed_id = prefixed.id.clone();

        let shown = present(&[plain, prefixed]);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, prefixed_id);
    }

    #[test]
    fn same_agent_same_status_shared_prefix_collapses() {
        let description = "Implement the authentication flow end to end with refresh tokens";
        let mut first = task_at("Auth flow", description, 0);
        first.assigned_agent_id = Some("agent-1".to_string());
        let mut second = task_at("Authentication work", description, 10);
        second.assigned_agent_id = Some("agent-1".to_string());
        let second_id = second.id.clone();

        let shown = present(&[first, second]);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, second_id);
    }

    #[test]
    fn different_status_is_not_collapsed() {
        let description = "Implement the authentication flow end to end with refresh tokens";
        let mut first = task_at("Auth flow", description, 0);
        first.assigned_agent_id = Some("agent-1".to_string());
        first.status = TaskStatus::Completed;
        let mut second = task_at("Authentication work", description, 10);
        second.assigned_agent_id = Some("agent-1".to_string());

        assert_eq!(present(&[first, second]).len(), 2);
    }

    #[test]
    fn unassigned_tasks_never_collapse_by_description() {
        let description = "A shared description that is identical for both entries here";
        let first = task_at("One", description, 0);
        let second = task_at("Two", description, 10);

        assert_eq!(present(&[first, second]).len(), 2);
    }

    #[test]
    fn output_is_newest_first_and_input_untouched() {
        let a = task_at("First", "a", 0);
        let b = task_at("Second", "b", 20);
        let c = task_at("Third", "c", 10);
        let input = vec![a.clone(), b.clone(), c.clone()];

        let shown = present(&input);
        let titles: Vec<&str> = shown.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "Third", "First"]);
        // Input order preserved.
        assert_eq!(input[0].id, a.id);
        assert_eq!(input[2].id, c.id);
    }

    #[test]
    fn presenter_is_deterministic() {
        let first = task_at("Alpha", "a", 0);
        let second = task_at("Beta", "b", 5);
        let input = vec![first, second];
        let once = present(&input);
        let twice = present(&input);
        let ids_once: Vec<&str> = once.iter().map(|t| t.id.as_str()).collect();
        let ids_twice: Vec<&str> = twice.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids_once, ids_twice);
    }
}
