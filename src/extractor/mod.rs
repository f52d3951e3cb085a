//! Artifact extractor
//!
//! Parses a model reply into typed code artifacts and draft task
//! descriptors. Code fences are matched by an explicit ordered list of
//! strategies, most specific first, stopping at the first strategy that
//! yields at least one artifact so the same block is never counted twice
//! under a looser pattern:
//!
//! 1. bracketed path on the fence line: ```` ```ts [src/foo.ts] ````
//! 2. a leading `path:` / `filepath:` line inside the block
//! 3. bare fenced block, destination inferred from the content

pub mod path_infer;
pub mod task_records;

use crate::models::{CodeArtifact, DraftTask};
use regex::Regex;

/// Everything extracted from one model reply.
#[derive(Debug, Clone, Default)]
pub struct ExtractedOutput {
    pub artifacts: Vec<CodeArtifact>,
    pub tasks: Vec<DraftTask>,
}

pub struct ArtifactExtractor {
    bracket_fence: Regex,
    bare_fence: Regex,
    path_line: Regex,
}

impl ArtifactExtractor {
    pub fn new() -> Self {
        Self {
            bracket_fence: Regex::new(
                r"```([A-Za-z0-9_+#.-]*)[ \t]*\[([^\]\r\n]+)\][ \t]*\r?\n((?s:.*?))```",
            )
            .unwrap(),
            bare_fence: Regex::new(r"```([A-Za-z0-9_+#.-]*)[ \t]*\r?\n((?s:.*?))```").unwrap(),
            path_line: Regex::new(r"(?i)^(?:file)?path:[ \t]*(\S+)[ \t]*$").unwrap(),
        }
    }

    /// Run the full extraction over one reply.
    pub fn extract(&self, text: &str) -> ExtractedOutput {
        ExtractedOutput {
            artifacts: self.extract_artifacts(text),
            tasks: task_records::parse(text),
        }
    }

    /// Ordered strategy chain with first-success semantics.
    pub fn extract_artifacts(&self, text: &str) -> Vec<CodeArtifact> {
        let strategies: [(&str, fn(&Self, &str) -> Vec<CodeArtifact>); 3] = [
            ("bracketed-path", Self::bracketed_path_blocks),
            ("labelled-path", Self::labelled_path_blocks),
            ("bare-fence", Self::bare_blocks),
        ];
        for (name, strategy) in strategies {
            let found = strategy(self, text);
            if !found.is_empty() {
                log::debug!(
                    "[EXTRACT] Strategy '{}' matched {} block(s)",
                    name,
                    found.len()
                );
                return found;
            }
        }
        Vec::new()
    }

    /// ```` ```lang [path/to/file.ext] ```` fences. Explicit paths always win.
    fn bracketed_path_blocks(&self, text: &str) -> Vec<CodeArtifact> {
        self.bracket_fence
            .captures_iter(text)
            .filter_map(|cap| {
                let language = normalize_language(cap.get(1).map_or("", |m| m.as_str()));
                let path = cap[2].trim().to_string();
                let content = cap[3].trim();
                if content.is_empty() {
                    return None;
                }
                Some(CodeArtifact::new(language, path, content))
            })
            .collect()
    }

    /// Fenced blocks whose first line is `path: ...` or `filepath: ...`.
    /// The label line is stripped from the stored content.
    fn labelled_path_blocks(&self, text: &str) -> Vec<CodeArtifact> {
        self.bare_fence
            .captures_iter(text)
            .filter_map(|cap| {
                let language = normalize_language(cap.get(1).map_or("", |m| m.as_str()));
                let body = cap[2].trim();
                let (first_line, rest) = match body.split_once('\n') {
                    Some((first, rest)) => (first.trim(), rest),
                    None => (body, ""),
                };
                let path = self.path_line.captures(first_line)?[1].to_string();
                let content = rest.trim();
                if content.is_empty() {
                    return None;
                }
                Some(CodeArtifact::new(language, path, content))
            })
            .collect()
    }

    /// Plain fences; destination path inferred best-effort from the content.
    fn bare_blocks(&self, text: &str) -> Vec<CodeArtifact> {
        self.bare_fence
            .captures_iter(text)
            .filter_map(|cap| {
                let language = normalize_language(cap.get(1).map_or("", |m| m.as_str()));
                let content = cap[2].trim();
                if content.is_empty() {
                    return None;
                }
                let path = path_infer::infer_path(&language, content);
                Some(CodeArtifact::new(language, path, content))
            })
            .collect()
    }
}

impl Default for ArtifactExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_language(tag: &str) -> String {
    let tag = tag.trim().to_lowercase();
    if tag.is_empty() {
        "text".to_string()
    } else {
        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;

    fn extractor() -> ArtifactExtractor {
        ArtifactExtractor::new()
    }

    #[test]
    fn bracketed_path_always_wins_over_inference() {
        // Heuristics would put a component under src/components; the explicit
        // annotation must be taken verbatim.
        let text = "Here you go:\n```ts [src/foo.ts]\nexport default function Widget() {}\n```\n";
        let artifacts = extractor().extract_artifacts(text);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "src/foo.ts");
        assert_eq!(artifacts[0].language, "ts");
    }

    #[test]
    fn labelled_path_line_is_stripped_from_content() {
        let text = "```python\npath: scripts/migrate.py\nprint('hi')\n```";
        let artifacts = extractor().extract_artifacts(text);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "scripts/migrate.py");
        assert_eq!(artifacts[0].content, "print('hi')");
    }

    #[test]
    fn filepath_label_also_accepted() {
        let text = "```rust\nfilepath: src/main.rs\nfn main() {}\n```";
        let artifacts = extractor().extract_artifacts(text);
        assert_eq!(artifacts[0].path, "src/main.rs");
    }

    #[test]
    fn first_matching_strategy_stops_the_chain() {
        // One bracketed block and one bare block: the looser pattern would
        // also match the bracketed block, so only the specific strategy runs.
        let text = concat!(
            "```ts [src/a.ts]\nconst a = 1;\n```\n",
            "```ts\nconst b = 2;\n```\n",
        );
        let artifacts = extractor().extract_artifacts(text);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "src/a.ts");
    }

    #[test]
    fn bare_block_path_is_inferred() {
        let text = "```typescript\nexport default function LoginForm() {\n  return <form />;\n}\n```";
        let artifacts = extractor().extract_artifacts(text);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "src/components/login-form.tsx");
    }

    #[test]
    fn empty_blocks_are_discarded() {
        let text = "```ts [src/empty.ts]\n\n```\n```js\n   \n```";
        assert!(extractor().extract_artifacts(text).is_empty());
    }

    #[test]
    fn multiple_bracketed_blocks_kept_in_order() {
        let text = concat!(
            "```ts [src/a.ts]\nconst a = 1;\n```\n",
            "```css [src/styles/app.css]\nbody {}\n```\n",
        );
        let artifacts = extractor().extract_artifacts(text);
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].path, "src/a.ts");
        assert_eq!(artifacts[1].path, "src/styles/app.css");
    }

    #[test]
    fn extract_returns_tasks_alongside_artifacts() {
        let text = concat!(
            "Task: Wire up login\n",
            "Assigned to: Frontend Agent\n",
            "Description: Connect the form to the auth endpoint\n",
            "Priority: HIGH\n",
        );
        let output = extractor().extract(text);
        assert!(output.artifacts.is_empty());
        assert_eq!(output.tasks.len(), 1);
        assert_eq!(output.tasks[0].priority, TaskPriority::High);
    }
}
