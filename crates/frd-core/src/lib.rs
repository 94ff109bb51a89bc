//! Core review model, normalization and aggregation for FRD.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub mod aggregate;
pub mod defaults;
pub mod listing;
pub mod normalize;

pub use aggregate::{build_aggregates, AggregateSnapshot, ListingStat, MonthStat, TypeStat};
pub use listing::{reviews_for_listing, ListingReviews};
pub use normalize::{normalize_payload, normalize_review};

pub const CRATE_NAME: &str = "frd-core";

/// Approval decisions keyed by review id.
pub type ApprovalMap = BTreeMap<String, bool>;

/// Category scores in the order the vendor listed them.
pub type CategoryScores = IndexMap<String, Option<f64>>;

/// One `{category, rating}` entry of a vendor review.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCategoryScore {
    pub category: String,
    pub rating: Option<f64>,
}

/// Vendor review record as extracted from an untrusted JSON item.
///
/// Extraction is lenient: a field with the wrong JSON type is treated as
/// absent, so building a `RawReview` never fails.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawReview {
    pub id: JsonValue,
    pub rating: Option<f64>,
    pub review_category: Option<Vec<RawCategoryScore>>,
    pub review_type: Option<String>,
    pub status: Option<String>,
    pub public_review: Option<String>,
    pub submitted_at: Option<String>,
    pub guest_name: Option<String>,
    pub listing_name: Option<String>,
}

impl RawReview {
    pub fn from_json(item: &JsonValue) -> Self {
        let review_category = item
            .get("reviewCategory")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| RawCategoryScore {
                        category: json_text(entry.get("category").unwrap_or(&JsonValue::Null)),
                        rating: entry.get("rating").and_then(json_number),
                    })
                    .collect()
            });

        Self {
            id: item.get("id").cloned().unwrap_or(JsonValue::Null),
            rating: item.get("rating").and_then(json_number),
            review_category,
            review_type: json_str(item, "type"),
            status: json_str(item, "status"),
            public_review: json_str(item, "publicReview"),
            submitted_at: json_str(item, "submittedAt"),
            guest_name: json_str(item, "guestName"),
            listing_name: json_str(item, "listingName"),
        }
    }
}

/// Normalized review shape served to dashboard clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalReview {
    pub id: String,
    pub channel: String,
    #[serde(rename = "type")]
    pub review_type: String,
    pub status: String,
    pub overall_rating: Option<f64>,
    pub categories: CategoryScores,
    pub text: String,
    pub submitted_at: Option<String>,
    pub guest_name: Option<String>,
    pub listing_name: String,
}

/// Items of a vendor payload (`result` array), empty when the shape is off.
pub fn payload_items(payload: &JsonValue) -> &[JsonValue] {
    payload
        .get("result")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Rounds to one decimal place, halves away from zero.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn json_str(value: &JsonValue, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(ToString::to_string)
}

fn json_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Casts a JSON scalar to text; `null` becomes the empty string.
pub(crate) fn json_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => number_text(n),
        other => other.to_string(),
    }
}

/// Shortest text for a JSON number; whole floats drop the fraction, so
/// `7453.0` and `7453` name the same review.
pub fn number_text(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(v) if v == 0.0 => "0".to_string(),
        Some(v) if v.fract() == 0.0 && v.abs() < 1e21 => format!("{v:.0}"),
        _ => n.to_string(),
    }
}
