//! Draft task record parser
//!
//! Agents hand work to each other through four-line records embedded in
//! their replies:
//!
//! ```text
//! Task: <title>
//! Assigned to: <agent name>
//! Description: <one line>
//! Priority: <low|medium|high>
//! ```
//!
//! Labels are matched case-insensitively; a malformed record is skipped
//! rather than failing the whole extraction.

use crate::models::{DraftTask, TaskPriority};
use once_cell::sync::Lazy;
use regex::Regex;

static TASK_RECORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^task:[ \t]*(.+?)[ \t]*\r?\n^assigned to:[ \t]*(.+?)[ \t]*\r?\n^description:[ \t]*(.+?)[ \t]*\r?\n^priority:[ \t]*(\S+)",
    )
    .unwrap()
});

/// Pull every well-formed task record out of a reply.
pub fn parse(text: &str) -> Vec<DraftTask> {
    TASK_RECORD
        .captures_iter(text)
        .filter_map(|cap| {
            let title = cap[1].to_string();
            let assignee = cap[2].to_string();
            if title.is_empty() || assignee.is_empty() {
                return None;
            }
            // An unknown priority word degrades to the default, the record
            // itself is still usable.
            let priority = TaskPriority::from_str(&cap[4]).unwrap_or_default();
            Some(DraftTask {
                title,
                assignee,
                description: cap[3].to_string(),
                priority,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_record() {
        let text = concat!(
            "Done with the endpoint. One follow-up:\n",
            "Task: Add rate limiting\n",
            "Assigned to: Backend Agent\n",
            "Description: Throttle the login endpoint to 10 req/min\n",
            "Priority: high\n",
        );
        let drafts = parse(text);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "Add rate limiting");
        assert_eq!(drafts[0].assignee, "Backend Agent");
        assert_eq!(
            drafts[0].description,
            "Throttle the login endpoint to 10 req/min"
        );
        assert_eq!(drafts[0].priority, TaskPriority::High);
    }

    #[test]
    fn labels_are_case_insensitive() {
        let text = concat!(
            "TASK: Ship it\n",
            "ASSIGNED TO: DevOps Agent\n",
            "DESCRIPTION: Cut a release\n",
            "PRIORITY: LOW\n",
        );
        let drafts = parse(text);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].assignee, "DevOps Agent");
        assert_eq!(drafts[0].priority, TaskPriority::Low);
    }

    #[test]
    fn multiple_records_parse_in_order() {
        let text = concat!(
            "Task: First\n",
            "Assigned to: Frontend Agent\n",
            "Description: a\n",
            "Priority: medium\n",
            "\n",
            "Some prose in between.\n",
            "\n",
            "Task: Second\n",
            "Assigned to: Testing Agent\n",
            "Description: b\n",
            "Priority: high\n",
        );
        let drafts = parse(text);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].title, "First");
        assert_eq!(drafts[1].title, "Second");
    }

    #[test]
    fn unknown_priority_falls_back_to_medium() {
        let text = concat!(
            "Task: Tune caching\n",
            "Assigned to: Backend Agent\n",
            "Description: Review TTLs\n",
            "Priority: whenever\n",
        );
        let drafts = parse(text);
        assert_eq!(drafts[0].priority, TaskPriority::Medium);
    }

    #[test]
    fn incomplete_record_is_skipped() {
        let text = concat!(
            "Task: Orphaned title\n",
            "Description: missing the assignee line\n",
            "Priority: high\n",
        );
        assert!(parse(text).is_empty());
    }

    #[test]
    fn prose_mentioning_tasks_does_not_match() {
        let text = "The task: finishing this sprint. Assigned to nobody in particular.";
        assert!(parse(text).is_empty());
    }
}
