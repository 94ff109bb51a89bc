//! Raw vendor record → canonical review.

use serde_json::Value as JsonValue;

use crate::defaults::{
    resolve_guest_name, resolve_id, resolve_listing_name, resolve_overall_rating,
    resolve_review_type, resolve_status, resolve_submitted_at, resolve_text, CHANNEL_HOSTAWAY,
};
use crate::{CanonicalReview, CategoryScores, RawReview};

/// Total mapping: malformed input degrades to defaults, never to an error.
pub fn normalize_review(raw: &RawReview) -> CanonicalReview {
    // a repeated category keeps its first position and its last score
    let categories = raw
        .review_category
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|c| (c.category.clone(), c.rating))
        .collect::<CategoryScores>();

    CanonicalReview {
        id: resolve_id(&raw.id),
        channel: CHANNEL_HOSTAWAY.to_string(),
        review_type: resolve_review_type(raw.review_type.as_deref()),
        status: resolve_status(raw.status.as_deref()),
        overall_rating: resolve_overall_rating(raw.rating, raw.review_category.as_deref()),
        categories,
        text: resolve_text(raw.public_review.as_deref()),
        submitted_at: resolve_submitted_at(raw.submitted_at.as_deref()),
        guest_name: resolve_guest_name(raw.guest_name.as_deref()),
        listing_name: resolve_listing_name(raw.listing_name.as_deref()),
    }
}

pub fn normalize_payload(items: &[JsonValue]) -> Vec<CanonicalReview> {
    items
        .iter()
        .map(|item| normalize_review(&RawReview::from_json(item)))
        .collect()
}
