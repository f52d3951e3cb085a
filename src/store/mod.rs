//! Versioned file store adapter
//!
//! Create/update/delete/read of a named file at a path under optimistic
//! concurrency, against an external repository. The version token proves the
//! caller last observed a specific revision; a stale token on the write
//! itself is a hard `VersionConflict` (last-writer-wins is not acceptable).
//! Adapters are explicitly constructed and passed by reference; there is no
//! ambient singleton.

pub mod github;
pub mod memory;

pub use github::GitHubStore;
pub use memory::MemoryStore;

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One revision of a file as the store sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub content: String,
    /// Opaque optimistic-concurrency marker, overwritten on every write.
    /// Mirrors a content hash in the real backend.
    pub version_token: String,
}

/// Directory listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
}

/// What a successful write did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Created { version_token: String },
    Updated { version_token: String },
    /// The stored content already matched; a no-change revision.
    Unchanged,
}

impl WriteOutcome {
    pub fn version_token(&self) -> Option<&str> {
        match self {
            WriteOutcome::Created { version_token } | WriteOutcome::Updated { version_token } => {
                Some(version_token)
            }
            WriteOutcome::Unchanged => None,
        }
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Fetch the current revision of `path` on `ref_name`.
    async fn read(&self, path: &str, ref_name: &str) -> EngineResult<FileRecord>;

    /// Conditional write. `token` must be the current version token for an
    /// existing path (stale -> `VersionConflict`) and `None` for a new one.
    async fn write_conditional(
        &self,
        path: &str,
        content: &str,
        message: &str,
        ref_name: &str,
        token: Option<&str>,
    ) -> EngineResult<WriteOutcome>;

    /// Remove `path` on `ref_name`.
    async fn delete(&self, path: &str, message: &str, ref_name: &str) -> EngineResult<()>;

    /// List entries directly under `dir` on `ref_name`.
    async fn list(&self, dir: &str, ref_name: &str) -> EngineResult<Vec<FileEntry>>;

    /// Create-or-update: reads the current token for `path` and forwards it
    /// to the conditional write. Writing identical content twice is a no-op
    /// from the caller's perspective.
    async fn write(
        &self,
        path: &str,
        content: &str,
        message: &str,
        ref_name: &str,
    ) -> EngineResult<WriteOutcome> {
        let token = match self.read(path, ref_name).await {
            Ok(record) => {
                if record.content == content {
                    log::debug!("[STORE] No-change write to {} on {}", path, ref_name);
                    return Ok(WriteOutcome::Unchanged);
                }
                Some(record.version_token)
            }
            Err(EngineError::FileNotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        self.write_conditional(path, content, message, ref_name, token.as_deref())
            .await
    }

    /// Write followed by a read-back verification. A mismatch (including a
    /// conflicting overwrite landing between write and read-back) is reported
    /// as a warning, not an error: the write itself already succeeded.
    async fn write_verified(
        &self,
        path: &str,
        content: &str,
        message: &str,
        ref_name: &str,
    ) -> EngineResult<WriteOutcome> {
        let outcome = self.write(path, content, message, ref_name).await?;
        match self.read(path, ref_name).await {
            Ok(record) if record.content == content => {}
            Ok(_) => {
                log::warn!(
                    "[STORE] Read-back mismatch for {} on {}: stored content differs from what was sent",
                    path,
                    ref_name
                );
            }
            Err(e) => {
                log::warn!("[STORE] Read-back of {} on {} failed: {}", path, ref_name, e);
            }
        }
        Ok(outcome)
    }
}
