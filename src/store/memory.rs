//! In-memory file store
//!
//! Deterministic adapter used by tests and offline sessions. Version tokens
//! are sha1 content hashes, matching the shape the hosted backend returns.

use super::{FileEntry, FileRecord, FileStore, WriteOutcome};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use dashmap::DashMap;
use sha1::{Digest, Sha1};

pub struct MemoryStore {
    // Keyed by (ref, path).
    files: DashMap<(String, String), FileRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }

    fn key(ref_name: &str, path: &str) -> (String, String) {
        (ref_name.to_string(), path.to_string())
    }

    pub fn content_token(content: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn read(&self, path: &str, ref_name: &str) -> EngineResult<FileRecord> {
        self.files
            .get(&Self::key(ref_name, path))
            .map(|record| record.clone())
            .ok_or_else(|| EngineError::FileNotFound {
                path: path.to_string(),
                ref_name: ref_name.to_string(),
            })
    }

    async fn write_conditional(
        &self,
        path: &str,
        content: &str,
        message: &str,
        ref_name: &str,
        token: Option<&str>,
    ) -> EngineResult<WriteOutcome> {
        use dashmap::mapref::entry::Entry;

        let new_token = Self::content_token(content);
        log::debug!("[STORE] write {} on {} ({})", path, ref_name, message);

        match self.files.entry(Self::key(ref_name, path)) {
            Entry::Occupied(mut occupied) => {
                if token != Some(occupied.get().version_token.as_str()) {
                    return Err(EngineError::VersionConflict {
                        path: path.to_string(),
                    });
                }
                if occupied.get().content == content {
                    return Ok(WriteOutcome::Unchanged);
                }
                occupied.insert(FileRecord {
                    path: path.to_string(),
                    content: content.to_string(),
                    version_token: new_token.clone(),
                });
                Ok(WriteOutcome::Updated {
                    version_token: new_token,
                })
            }
            Entry::Vacant(vacant) => {
                // A token for a path that no longer exists is stale too.
                if token.is_some() {
                    return Err(EngineError::VersionConflict {
                        path: path.to_string(),
                    });
                }
                vacant.insert(FileRecord {
                    path: path.to_string(),
                    content: content.to_string(),
                    version_token: new_token.clone(),
                });
                Ok(WriteOutcome::Created {
                    version_token: new_token,
                })
            }
        }
    }

    async fn delete(&self, path: &str, message: &str, ref_name: &str) -> EngineResult<()> {
        log::debug!("[STORE] delete {} on {} ({})", path, ref_name, message);
        self.files
            .remove(&Self::key(ref_name, path))
            .map(|_| ())
            .ok_or_else(|| EngineError::FileNotFound {
                path: path.to_string(),
                ref_name: ref_name.to_string(),
            })
    }

    async fn list(&self, dir: &str, ref_name: &str) -> EngineResult<Vec<FileEntry>> {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir.trim_end_matches('/'))
        };
        let mut entries: Vec<FileEntry> = self
            .files
            .iter()
            .filter(|entry| entry.key().0 == ref_name && entry.key().1.starts_with(&prefix))
            .map(|entry| {
                let rest = &entry.key().1[prefix.len()..];
                match rest.split_once('/') {
                    Some((child_dir, _)) => FileEntry {
                        name: child_dir.to_string(),
                        path: format!("{}{}", prefix, child_dir),
                        is_dir: true,
                    },
                    None => FileEntry {
                        name: rest.to_string(),
                        path: entry.key().1.clone(),
                        is_dir: false,
                    },
                }
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries.dedup_by(|a, b| a.path == b.path);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRANCH: &str = "main";

    #[tokio::test]
    async fn write_is_idempotent_at_path_level() {
        let store = MemoryStore::new();
        let first = store
            .write("src/app.ts", "const a = 1;", "add app", BRANCH)
            .await
            .unwrap();
        assert!(matches!(first, WriteOutcome::Created { .. }));

        // Identical content: second write still succeeds, no-change revision.
        let second = store
            .write("src/app.ts", "const a = 1;", "add app again", BRANCH)
            .await
            .unwrap();
        assert_eq!(second, WriteOutcome::Unchanged);

        let record = store.read("src/app.ts", BRANCH).await.unwrap();
        assert_eq!(record.content, "const a = 1;");
    }

    #[tokio::test]
    async fn stale_token_is_a_version_conflict() {
        let store = MemoryStore::new();
        let outcome = store
            .write("src/app.ts", "v1", "create", BRANCH)
            .await
            .unwrap();
        let stale = outcome.version_token().unwrap().to_string();

        // Another writer lands in between.
        store.write("src/app.ts", "v2", "update", BRANCH).await.unwrap();

        let err = store
            .write_conditional("src/app.ts", "v3", "racing update", BRANCH, Some(&stale))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::VersionConflict { .. }));

        // The current token still works.
        let current = store.read("src/app.ts", BRANCH).await.unwrap().version_token;
        let outcome = store
            .write_conditional("src/app.ts", "v3", "retried update", BRANCH, Some(&current))
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Updated { .. }));
    }

    #[tokio::test]
    async fn token_for_missing_file_is_stale() {
        let store = MemoryStore::new();
        let err = store
            .write_conditional("gone.txt", "x", "m", BRANCH, Some("deadbeef"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn update_requires_current_token_through_write() {
        let store = MemoryStore::new();
        store.write("notes.md", "hello", "create", BRANCH).await.unwrap();
        // Plain write re-reads the token itself, so an update goes through.
        let outcome = store
            .write("notes.md", "hello world", "update", BRANCH)
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Updated { .. }));
    }

    #[tokio::test]
    async fn delete_and_missing_read() {
        let store = MemoryStore::new();
        store.write("tmp.txt", "x", "create", BRANCH).await.unwrap();
        store.delete("tmp.txt", "cleanup", BRANCH).await.unwrap();

        let err = store.read("tmp.txt", BRANCH).await.unwrap_err();
        assert!(matches!(err, EngineError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn refs_are_isolated() {
        let store = MemoryStore::new();
        store.write("a.txt", "main copy", "m", "main").await.unwrap();
        store.write("a.txt", "feature copy", "m", "feature").await.unwrap();

        assert_eq!(store.read("a.txt", "main").await.unwrap().content, "main copy");
        assert_eq!(
            store.read("a.txt", "feature").await.unwrap().content,
            "feature copy"
        );
    }

    #[tokio::test]
    async fn list_groups_subdirectories() {
        let store = MemoryStore::new();
        store.write("src/a.ts", "a", "m", BRANCH).await.unwrap();
        store.write("src/components/b.tsx", "b", "m", BRANCH).await.unwrap();

        let entries = store.list("src", BRANCH).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.name == "a.ts" && !e.is_dir));
        assert!(entries.iter().any(|e| e.name == "components" && e.is_dir));
    }

    #[tokio::test]
    async fn read_back_verification_is_non_fatal() {
        let store = MemoryStore::new();
        let outcome = store
            .write_verified("src/x.ts", "content", "create", BRANCH)
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Created { .. }));
    }
}
