//! Review source contracts: live vendor fetch, bundled fallback dataset, and
//! the policy choosing between them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use frd_storage::{FetchFailure, HostawayClient};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

pub const CRATE_NAME: &str = "frd-sources";

/// Built-in dataset locations, relative to the workspace root, after the
/// explicit override.
pub const DEFAULT_DATASET_PATHS: [&str; 2] =
    ["server/data/mock-reviews.json", "server/mock-reviews.json"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(
        "fallback dataset not found; place mock-reviews.json at server/data/ or set MOCK_JSON_PATH (tried: {})",
        display_paths(.tried)
    )]
    FallbackUnavailable { tried: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
pub trait LiveSource: Send + Sync {
    async fn fetch(&self) -> Result<JsonValue, FetchFailure>;
}

#[async_trait]
impl LiveSource for HostawayClient {
    async fn fetch(&self) -> Result<JsonValue, FetchFailure> {
        self.fetch_reviews().await
    }
}

#[async_trait]
pub trait FallbackSource: Send + Sync {
    async fn load(&self) -> Result<JsonValue, SourceError>;
}

/// Reads the first candidate file that parses as JSON.
#[derive(Debug, Clone)]
pub struct FallbackLoader {
    candidates: Vec<PathBuf>,
}

impl FallbackLoader {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn from_workspace(root: &Path, override_path: Option<PathBuf>) -> Self {
        let candidates = override_path
            .into_iter()
            .chain(DEFAULT_DATASET_PATHS.iter().map(|rel| root.join(rel)))
            .collect();
        Self::new(candidates)
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub async fn load_dataset(&self) -> Result<JsonValue, SourceError> {
        for path in &self.candidates {
            match read_json_file(path).await {
                Ok(value) => {
                    info!(path = %path.display(), "fallback dataset loaded");
                    return Ok(value);
                }
                Err(err) => debug!(error = %format!("{err:#}"), "fallback candidate skipped"),
            }
        }
        Err(SourceError::FallbackUnavailable {
            tried: self.candidates.clone(),
        })
    }
}

#[async_trait]
impl FallbackSource for FallbackLoader {
    async fn load(&self) -> Result<JsonValue, SourceError> {
        self.load_dataset().await
    }
}

async fn read_json_file(path: &Path) -> anyhow::Result<JsonValue> {
    let data = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Caller preference from the `source` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceHint {
    #[default]
    Auto,
    Live,
    Mock,
}

impl SourceHint {
    /// Anything other than `live` or `mock` means automatic.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("live") => Self::Live,
            Some("mock") => Self::Mock,
            _ => Self::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Live,
    Mock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedPayload {
    pub payload: JsonValue,
    pub source: SourceKind,
    pub fallback_reason: Option<String>,
}

/// Two-tier source policy: one live attempt unless bypassed, then the
/// fallback dataset. Never retries and never runs both concurrently.
pub struct SourceSelector {
    live: Arc<dyn LiveSource>,
    fallback: Arc<dyn FallbackSource>,
    force_fallback: bool,
}

impl SourceSelector {
    pub fn new(
        live: Arc<dyn LiveSource>,
        fallback: Arc<dyn FallbackSource>,
        force_fallback: bool,
    ) -> Self {
        Self {
            live,
            fallback,
            force_fallback,
        }
    }

    pub fn force_fallback(&self) -> bool {
        self.force_fallback
    }

    pub async fn select(&self, hint: SourceHint) -> Result<SelectedPayload, SourceError> {
        if self.force_fallback || hint == SourceHint::Mock {
            return self.load_fallback(None).await;
        }

        match self.live.fetch().await {
            Ok(payload) => Ok(SelectedPayload {
                payload,
                source: SourceKind::Live,
                fallback_reason: None,
            }),
            Err(failure) => {
                warn!(reason = %failure, "live source unavailable; using fallback dataset");
                self.load_fallback(Some(failure.reason())).await
            }
        }
    }

    /// Loads the fallback once so a missing dataset fails at startup rather
    /// than on the first request.
    pub async fn probe_fallback(&self) -> Result<(), SourceError> {
        self.fallback.load().await.map(|_| ())
    }

    async fn load_fallback(&self, reason: Option<String>) -> Result<SelectedPayload, SourceError> {
        let payload = self.fallback.load().await?;
        Ok(SelectedPayload {
            payload,
            source: SourceKind::Mock,
            fallback_reason: reason,
        })
    }
}
