//! GitHub contents-API file store
//!
//! REST create/read/update/delete of repository files keyed by (path, ref).
//! The blob sha returned on every read is the version token; a conditional
//! PUT with a stale sha is rejected by the API and surfaces as
//! `VersionConflict`.

use super::{FileEntry, FileRecord, FileStore, WriteOutcome};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct GitHubStore {
    client: Client,
    owner: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: Option<ContentSha>,
}

#[derive(Debug, Deserialize)]
struct ContentSha {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GitHubStore {
    pub fn new(owner: &str, repo: &str, token: &str) -> EngineResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("fleet-engine"),
        );
        if !token.is_empty() {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| EngineError::Store(format!("invalid token format: {}", e)))?;
            headers.insert(header::AUTHORIZATION, auth_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| EngineError::Store(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        // Slashes stay, each segment is encoded.
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/repos/{}/{}/contents/{}",
            API_BASE,
            self.owner,
            self.repo,
            encoded.join("/")
        )
    }

    async fn fetch_contents(&self, path: &str, ref_name: &str) -> EngineResult<ContentsResponse> {
        let response = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", ref_name)])
            .send()
            .await
            .map_err(|e| EngineError::Store(format!("GET {} failed: {}", path, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(EngineError::FileNotFound {
                path: path.to_string(),
                ref_name: ref_name.to_string(),
            }),
            status if status.is_success() => response
                .json::<ContentsResponse>()
                .await
                .map_err(|e| EngineError::Store(format!("bad contents payload: {}", e))),
            status => Err(EngineError::Store(format!(
                "GET {} returned {}",
                path, status
            ))),
        }
    }
}

#[async_trait]
impl FileStore for GitHubStore {
    async fn read(&self, path: &str, ref_name: &str) -> EngineResult<FileRecord> {
        let contents = self.fetch_contents(path, ref_name).await?;
        let encoded = contents.content.unwrap_or_default();
        // The API wraps base64 at 60 columns.
        let stripped: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64
            .decode(stripped)
            .map_err(|e| EngineError::Store(format!("invalid base64 for {}: {}", path, e)))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| EngineError::Store(format!("non-utf8 content at {}: {}", path, e)))?;

        Ok(FileRecord {
            path: path.to_string(),
            content,
            version_token: contents.sha,
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
        let body = WriteRequest {
            message,
            content: BASE64.encode(content.as_bytes()),
            branch: ref_name,
            sha: token,
        };

        let response = self
            .client
            .put(self.contents_url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Store(format!("PUT {} failed: {}", path, e)))?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(EngineError::VersionConflict {
                    path: path.to_string(),
                })
            }
            status if status.is_success() => {
                let created = status == StatusCode::CREATED;
                let payload = response
                    .json::<WriteResponse>()
                    .await
                    .map_err(|e| EngineError::Store(format!("bad write payload: {}", e)))?;
                let version_token = payload
                    .content
                    .map(|c| c.sha)
                    .ok_or_else(|| EngineError::Store("write response missing sha".to_string()))?;
                log::info!("[STORE] Wrote {} on {} ({})", path, ref_name, message);
                if created {
                    Ok(WriteOutcome::Created { version_token })
                } else {
                    Ok(WriteOutcome::Updated { version_token })
                }
            }
            status => Err(EngineError::Store(format!(
                "PUT {} returned {}",
                path, status
            ))),
        }
    }

    async fn delete(&self, path: &str, message: &str, ref_name: &str) -> EngineResult<()> {
        let current = self.fetch_contents(path, ref_name).await?;
        let response = self
            .client
            .delete(self.contents_url(path))
            .json(&json!({
                "message": message,
                "sha": current.sha,
                "branch": ref_name,
            }))
            .send()
            .await
            .map_err(|e| EngineError::Store(format!("DELETE {} failed: {}", path, e)))?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(EngineError::VersionConflict {
                    path: path.to_string(),
                })
            }
            status if status.is_success() => {
                log::info!("[STORE] Deleted {} on {} ({})", path, ref_name, message);
                Ok(())
            }
            status => Err(EngineError::Store(format!(
                "DELETE {} returned {}",
                path, status
            ))),
        }
    }

    async fn list(&self, dir: &str, ref_name: &str) -> EngineResult<Vec<FileEntry>> {
        let response = self
            .client
            .get(self.contents_url(dir))
            .query(&[("ref", ref_name)])
            .send()
            .await
            .map_err(|e| EngineError::Store(format!("GET {} failed: {}", dir, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(EngineError::FileNotFound {
                path: dir.to_string(),
                ref_name: ref_name.to_string(),
            }),
            status if status.is_success() => {
                let entries = response
                    .json::<Vec<ListEntry>>()
                    .await
                    .map_err(|e| EngineError::Store(format!("bad listing payload: {}", e)))?;
                Ok(entries
                    .into_iter()
                    .map(|entry| FileEntry {
                        name: entry.name,
                        path: entry.path,
                        is_dir: entry.entry_type == "dir",
                    })
                    .collect())
            }
            status => Err(EngineError::Store(format!(
                "GET {} returned {}",
                dir, status
            ))),
        }
    }
}
