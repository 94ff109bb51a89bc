//! Approval persistence + vendor HTTP fetch for FRD.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use frd_core::{payload_items, ApprovalMap};
use reqwest::header::ACCEPT;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "frd-storage";

pub const DEFAULT_HOSTAWAY_API_URL: &str = "https://api.hostaway.com/v1";

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Missing reviewId")]
    MissingReviewId,
    #[error("approval file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing approvals: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ApprovalError + '_ {
    move |source| ApprovalError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File-backed review id → approved map.
///
/// Whole-map read/modify/write; writes go through a temp file and rename so
/// readers never observe a half-written file. Writes from this process are
/// serialized, external writers are not coordinated.
#[derive(Debug)]
pub struct ApprovalStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ApprovalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the parent directory and an empty `{}` file when missing.
    pub async fn ensure_initialized(&self) -> Result<(), ApprovalError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_error(parent))?;
        }
        let created = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&self.path)
            .await;
        match created {
            Ok(mut file) => {
                file.write_all(b"{}").await.map_err(io_error(&self.path))?;
                file.flush().await.map_err(io_error(&self.path))?;
                info!(path = %self.path.display(), "created empty approvals file");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(io_error(&self.path)(err)),
        }
    }

    /// Current approvals; a missing or unreadable file reads as empty.
    pub async fn read(&self) -> ApprovalMap {
        if let Err(err) = self.ensure_initialized().await {
            warn!(error = %err, "approvals bootstrap failed");
        }
        self.load().await
    }

    pub async fn write(&self, review_id: &str, approved: bool) -> Result<ApprovalMap, ApprovalError> {
        if review_id.trim().is_empty() {
            return Err(ApprovalError::MissingReviewId);
        }
        let _guard = self.write_lock.lock().await;
        self.ensure_initialized().await?;

        let mut current = self.load().await;
        current.insert(review_id.to_string(), approved);
        self.persist(&current).await?;
        info!(review_id, approved, "approval saved");
        Ok(current)
    }

    async fn load(&self) -> ApprovalMap {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "approvals unreadable; using empty map");
                return ApprovalMap::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), error = %err, "approvals corrupt; using empty map");
            ApprovalMap::new()
        })
    }

    async fn persist(&self, approvals: &ApprovalMap) -> Result<(), ApprovalError> {
        let bytes = serde_json::to_vec_pretty(approvals)?;
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp_path = parent.join(format!(".approvals.{}.tmp", Uuid::new_v4()));

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .map_err(io_error(&temp_path))?;
        file.write_all(&bytes).await.map_err(io_error(&temp_path))?;
        file.flush().await.map_err(io_error(&temp_path))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_error(&self.path)(err));
        }
        Ok(())
    }
}

/// Why a live vendor fetch produced no payload. `Display` is the wire-level
/// `fallbackReason`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("missing_envs")]
    MissingEnvs,
    #[error("http_{0}")]
    HttpStatus(u16),
    #[error("network_error")]
    Network,
    #[error("invalid_payload")]
    InvalidPayload,
}

impl FetchFailure {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct HostawayConfig {
    pub account_id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HostawayConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            api_key: None,
            base_url: DEFAULT_HOSTAWAY_API_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: None,
        }
    }
}

/// Single-attempt client for the vendor review listing. No retries.
#[derive(Debug, Clone)]
pub struct HostawayClient {
    client: reqwest::Client,
    config: HostawayConfig,
}

impl HostawayClient {
    pub fn new(config: HostawayConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client, config })
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        let account_id = self.config.account_id.as_deref().filter(|v| !v.trim().is_empty())?;
        let api_key = self.config.api_key.as_deref().filter(|v| !v.trim().is_empty())?;
        Some((account_id, api_key))
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    /// One bounded GET of `{base}/reviews?accountId=..`; the decoded body is
    /// returned untouched on 2xx.
    pub async fn fetch_reviews(&self) -> Result<JsonValue, FetchFailure> {
        let Some((account_id, api_key)) = self.credentials() else {
            warn!("vendor account id or api key missing; skipping live fetch");
            return Err(FetchFailure::MissingEnvs);
        };
        let url = format!("{}/reviews", self.config.base_url.trim_end_matches('/'));
        let span = info_span!("hostaway_fetch", account_id, url = %url);

        async move {
            info!("requesting vendor reviews");
            let resp = self
                .client
                .get(&url)
                .query(&[("accountId", account_id)])
                .bearer_auth(api_key)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|err| {
                    warn!(error = %err, "vendor request failed");
                    FetchFailure::Network
                })?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                let snippet = body.chars().take(512).collect::<String>();
                warn!(status = status.as_u16(), body = %snippet, "vendor returned non-success status");
                return Err(FetchFailure::HttpStatus(status.as_u16()));
            }

            let bytes = resp.bytes().await.map_err(|err| {
                warn!(error = %err, "reading vendor response body failed");
                FetchFailure::Network
            })?;
            let payload: JsonValue = serde_json::from_slice(&bytes).map_err(|err| {
                warn!(error = %err, "vendor response is not JSON");
                FetchFailure::InvalidPayload
            })?;

            info!(result_len = payload_items(&payload).len(), "vendor reviews fetched");
            Ok(payload)
        }
        .instrument(span)
        .await
    }
}
