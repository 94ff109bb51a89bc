//! Per-field default resolution for canonical reviews.
//!
//! Each resolver takes the raw vendor value and returns the canonical value,
//! so the rules can be checked one field at a time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

use crate::{json_text, round_one_decimal, RawCategoryScore};

pub const CHANNEL_HOSTAWAY: &str = "hostaway";
pub const DEFAULT_REVIEW_TYPE: &str = "guest-to-host";
pub const DEFAULT_STATUS: &str = "published";
pub const UNKNOWN_LISTING: &str = "Unknown";

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.is_empty())
}

pub fn resolve_id(raw: &JsonValue) -> String {
    json_text(raw)
}

pub fn resolve_review_type(raw: Option<&str>) -> String {
    non_empty(raw).unwrap_or(DEFAULT_REVIEW_TYPE).to_string()
}

pub fn resolve_status(raw: Option<&str>) -> String {
    non_empty(raw).unwrap_or(DEFAULT_STATUS).to_string()
}

pub fn resolve_text(raw: Option<&str>) -> String {
    raw.unwrap_or_default().to_string()
}

pub fn resolve_guest_name(raw: Option<&str>) -> Option<String> {
    non_empty(raw).map(ToString::to_string)
}

pub fn resolve_listing_name(raw: Option<&str>) -> String {
    non_empty(raw).unwrap_or(UNKNOWN_LISTING).to_string()
}

/// Top-level rating wins as-is; otherwise half the mean category score
/// (0–10 → 0–5) rounded to one decimal; otherwise none.
pub fn resolve_overall_rating(
    rating: Option<f64>,
    categories: Option<&[RawCategoryScore]>,
) -> Option<f64> {
    if rating.is_some() {
        return rating;
    }
    let scores = categories
        .unwrap_or_default()
        .iter()
        .filter_map(|c| c.rating)
        .collect::<Vec<_>>();
    if scores.is_empty() {
        return None;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Some(round_one_decimal(mean / 2.0))
}

/// `"YYYY-MM-DD HH:mm:ss"` read as UTC and rendered as an ISO instant with
/// millisecond precision.
pub fn resolve_submitted_at(raw: Option<&str>) -> Option<String> {
    let raw = non_empty(raw)?;
    let candidate = format!("{}Z", raw.replacen(' ', "T", 1));
    parse_utc_instant(&candidate).map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_utc_instant(candidate: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(candidate) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%MZ"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(candidate, fmt).ok())
        .or_else(|| {
            // date-only values mean midnight UTC
            NaiveDate::parse_from_str(candidate, "%Y-%m-%dZ")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn score(category: &str, rating: Option<f64>) -> RawCategoryScore {
        RawCategoryScore {
            category: category.to_string(),
            rating,
        }
    }

    #[test]
    fn id_is_cast_to_text() {
        assert_eq!(resolve_id(&json!(7453)), "7453");
        assert_eq!(resolve_id(&json!(7453.0)), "7453");
        assert_eq!(resolve_id(&json!(12.5)), "12.5");
        assert_eq!(resolve_id(&json!("rev-1")), "rev-1");
        assert_eq!(resolve_id(&JsonValue::Null), "");
    }

    #[test]
    fn string_defaults_apply_to_missing_and_empty() {
        assert_eq!(resolve_review_type(None), "guest-to-host");
        assert_eq!(resolve_review_type(Some("")), "guest-to-host");
        assert_eq!(resolve_review_type(Some("host-to-guest")), "host-to-guest");
        assert_eq!(resolve_status(None), "published");
        assert_eq!(resolve_listing_name(Some("")), "Unknown");
        assert_eq!(resolve_text(None), "");
        assert_eq!(resolve_guest_name(Some("")), None);
        assert_eq!(resolve_guest_name(Some("Shane Finkelstein")).as_deref(), Some("Shane Finkelstein"));
    }

    #[test]
    fn overall_rating_halves_category_mean() {
        let cats = [score("cleanliness", Some(8.0)), score("wifi", Some(6.0))];
        assert_eq!(resolve_overall_rating(None, Some(&cats)), Some(3.5));
    }

    #[test]
    fn overall_rating_rounds_to_one_decimal() {
        let cats = [score("a", Some(10.0)), score("b", Some(9.0)), score("c", Some(9.0))];
        // mean 9.333.. / 2 = 4.666..
        assert_eq!(resolve_overall_rating(None, Some(&cats)), Some(4.7));
    }

    #[test]
    fn overall_rating_passthrough_ignores_categories() {
        let cats = [score("cleanliness", Some(2.0))];
        assert_eq!(resolve_overall_rating(Some(4.2), Some(&cats)), Some(4.2));
    }

    #[test]
    fn overall_rating_skips_non_numeric_scores() {
        let cats = [score("a", None), score("b", Some(9.0))];
        assert_eq!(resolve_overall_rating(None, Some(&cats)), Some(4.5));
        let empty = [score("a", None)];
        assert_eq!(resolve_overall_rating(None, Some(&empty)), None);
        assert_eq!(resolve_overall_rating(None, None), None);
    }

    #[test]
    fn submitted_at_becomes_utc_instant() {
        assert_eq!(
            resolve_submitted_at(Some("2023-08-21 14:30:00")).as_deref(),
            Some("2023-08-21T14:30:00.000Z")
        );
        assert_eq!(
            resolve_submitted_at(Some("2020-08-21 22:45:14")).as_deref(),
            Some("2020-08-21T22:45:14.000Z")
        );
    }

    #[test]
    fn submitted_at_date_only_is_midnight_utc() {
        assert_eq!(
            resolve_submitted_at(Some("2023-08-21")).as_deref(),
            Some("2023-08-21T00:00:00.000Z")
        );
        assert_eq!(resolve_submitted_at(Some("2023-02-30")), None);
    }

    #[test]
    fn submitted_at_invalid_is_none() {
        assert_eq!(resolve_submitted_at(None), None);
        assert_eq!(resolve_submitted_at(Some("")), None);
        assert_eq!(resolve_submitted_at(Some("yesterday")), None);
        assert_eq!(resolve_submitted_at(Some("2023-13-40 99:00:00")), None);
    }
}
