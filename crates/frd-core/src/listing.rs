//! Approved reviews for a single property page.

use serde::{Deserialize, Serialize};

use crate::{ApprovalMap, CanonicalReview};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingReviews {
    pub listing_id: String,
    pub listing_name: String,
    pub reviews: Vec<CanonicalReview>,
}

/// Matches a URL slug such as `29-shoreditch-heights` against listing names
/// and keeps only reviews a manager approved.
pub fn reviews_for_listing(
    items: &[CanonicalReview],
    approvals: &ApprovalMap,
    slug: &str,
) -> ListingReviews {
    let needle = slug.replace('-', " ").to_lowercase().trim().to_string();
    let matching = items
        .iter()
        .filter(|r| comparable_name(&r.listing_name).contains(&needle))
        .collect::<Vec<_>>();
    let approved = matching
        .iter()
        .filter(|r| approvals.get(&r.id).copied().unwrap_or(false))
        .map(|r| (*r).clone())
        .collect::<Vec<_>>();

    let listing_name = approved
        .first()
        .map(|r| r.listing_name.clone())
        .or_else(|| matching.first().map(|r| r.listing_name.clone()))
        .unwrap_or_else(|| slug.replace('-', " "));

    ListingReviews {
        listing_id: slug.to_string(),
        listing_name,
        reviews: approved,
    }
}

/// Lowercase, every run of non-alphanumerics collapsed to one space.
fn comparable_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_gap = false;
    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
            in_gap = false;
        } else if !in_gap {
            out.push(' ');
            in_gap = true;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CategoryScores;

    fn review(id: &str, listing: &str) -> CanonicalReview {
        CanonicalReview {
            id: id.into(),
            channel: "hostaway".into(),
            review_type: "guest-to-host".into(),
            status: "published".into(),
            overall_rating: Some(4.0),
            categories: CategoryScores::new(),
            text: String::new(),
            submitted_at: None,
            guest_name: None,
            listing_name: listing.into(),
        }
    }

    #[test]
    fn comparable_name_collapses_punctuation() {
        assert_eq!(comparable_name("2B N1 A - 29 Shoreditch Heights"), "2b n1 a 29 shoreditch heights");
        assert_eq!(comparable_name("  Café—Loft!! "), "caf loft");
    }

    #[test]
    fn only_approved_matches_are_returned() {
        let items = vec![
            review("1", "2B N1 A - 29 Shoreditch Heights"),
            review("2", "2B N1 A - 29 Shoreditch Heights"),
            review("3", "Camden Lofts"),
        ];
        let approvals = ApprovalMap::from([
            ("1".to_string(), true),
            ("2".to_string(), false),
            ("3".to_string(), true),
        ]);
        let page = reviews_for_listing(&items, &approvals, "29-shoreditch-heights");
        assert_eq!(page.listing_id, "29-shoreditch-heights");
        assert_eq!(page.listing_name, "2B N1 A - 29 Shoreditch Heights");
        assert_eq!(page.reviews.len(), 1);
        assert_eq!(page.reviews[0].id, "1");
    }

    #[test]
    fn name_falls_back_to_first_match_then_slug() {
        let items = vec![review("1", "Camden Lofts")];
        let none_approved = reviews_for_listing(&items, &ApprovalMap::new(), "camden");
        assert_eq!(none_approved.listing_name, "Camden Lofts");
        assert!(none_approved.reviews.is_empty());

        let unknown = reviews_for_listing(&items, &ApprovalMap::new(), "soho-studio");
        assert_eq!(unknown.listing_name, "soho studio");
    }
}
