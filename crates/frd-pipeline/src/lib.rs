//! Review pipeline orchestration: source selection → normalize → aggregate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use frd_core::{build_aggregates, normalize_payload, payload_items, AggregateSnapshot, CanonicalReview};
use frd_sources::{FallbackLoader, SourceHint, SourceKind, SourceSelector};
use frd_storage::{HostawayClient, HostawayConfig, DEFAULT_HOSTAWAY_API_URL};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const CRATE_NAME: &str = "frd-pipeline";

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_APPROVALS_PATH: &str = "server/data/approvals.json";
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = [
    "http://localhost:3000",
    "https://flex-review-dashboard-six.vercel.app",
];

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub hostaway_account_id: Option<String>,
    pub hostaway_api_key: Option<String>,
    pub hostaway_api_url: String,
    pub http_timeout_secs: u64,
    pub force_mock: bool,
    pub mock_json_path: Option<PathBuf>,
    pub approvals_path: PathBuf,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub workspace_root: PathBuf,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            hostaway_account_id: non_blank("HOSTAWAY_ACCOUNT_ID"),
            hostaway_api_key: non_blank("HOSTAWAY_API_KEY"),
            hostaway_api_url: non_blank("HOSTAWAY_API_URL")
                .unwrap_or_else(|| DEFAULT_HOSTAWAY_API_URL.to_string()),
            http_timeout_secs: non_blank("HOSTAWAY_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(10),
            force_mock: non_blank("FORCE_MOCK")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            mock_json_path: non_blank("MOCK_JSON_PATH").map(PathBuf::from),
            approvals_path: non_blank("APPROVALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_APPROVALS_PATH)),
            port: non_blank("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            allowed_origins: non_blank("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect()),
            workspace_root: PathBuf::from("."),
        }
    }

    pub fn hostaway(&self) -> HostawayConfig {
        HostawayConfig {
            account_id: self.hostaway_account_id.clone(),
            api_key: self.hostaway_api_key.clone(),
            base_url: self.hostaway_api_url.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(format!("frd/{}", env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Approval file location; relative paths hang off the workspace root.
    pub fn resolved_approvals_path(&self) -> PathBuf {
        self.workspace_root.join(&self.approvals_path)
    }

    pub fn fallback_loader(&self) -> FallbackLoader {
        FallbackLoader::from_workspace(&self.workspace_root, self.mock_json_path.clone())
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Raw query parameters of the reviews endpoint; kept as text so bad input
/// degrades instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewQuery {
    pub source: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsReport {
    pub status: String,
    pub source: SourceKind,
    pub fallback_reason: Option<String>,
    pub count: usize,
    pub items: Vec<CanonicalReview>,
    pub aggregates: AggregateSnapshot,
}

pub struct ReviewPipeline {
    selector: SourceSelector,
}

impl ReviewPipeline {
    pub fn new(selector: SourceSelector) -> Self {
        Self { selector }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let live = HostawayClient::new(config.hostaway()).context("building vendor client")?;
        let selector = SourceSelector::new(
            Arc::new(live),
            Arc::new(config.fallback_loader()),
            config.force_mock,
        );
        Ok(Self::new(selector))
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }

    pub async fn run(&self, query: &ReviewQuery) -> Result<ReviewsReport> {
        let hint = SourceHint::parse(query.source.as_deref());
        let selected = self.selector.select(hint).await?;

        let items = apply_limit(payload_items(&selected.payload), parse_limit(query.limit.as_deref()));
        let reviews = normalize_payload(items);
        let aggregates = build_aggregates(&reviews);

        info!(
            source = ?selected.source,
            fallback_reason = selected.fallback_reason.as_deref().unwrap_or("-"),
            count = reviews.len(),
            "reviews assembled"
        );

        Ok(ReviewsReport {
            status: "ok".to_string(),
            source: selected.source,
            fallback_reason: selected.fallback_reason,
            count: reviews.len(),
            items: reviews,
            aggregates,
        })
    }
}

/// A finite number, or none for blank/unparsable input.
pub fn parse_limit(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Leading-slice semantics: fractions truncate toward zero and negative
/// limits drop that many items from the end.
pub fn apply_limit<T>(items: &[T], limit: Option<f64>) -> &[T] {
    let Some(limit) = limit else {
        return items;
    };
    let len = items.len() as f64;
    let n = limit.trunc();
    let end = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
    &items[..end as usize]
}
