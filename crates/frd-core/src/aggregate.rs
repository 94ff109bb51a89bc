//! Grouped statistics over one batch of canonical reviews.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{round_one_decimal, CanonicalReview};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingStat {
    pub listing: String,
    pub count: usize,
    pub avg_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStat {
    #[serde(rename = "type")]
    pub review_type: String,
    pub count: usize,
    pub avg_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthStat {
    pub month: String,
    pub count: usize,
    pub avg_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub listing_stats: Vec<ListingStat>,
    pub type_stats: Vec<TypeStat>,
    pub monthly: Vec<MonthStat>,
}

/// Listings by count desc then average desc, types in discovery order,
/// months ascending.
pub fn build_aggregates(reviews: &[CanonicalReview]) -> AggregateSnapshot {
    let mut listing_stats = group_by(reviews, |r| Some(r.listing_name.clone()))
        .into_iter()
        .map(|(listing, group)| ListingStat {
            listing,
            count: group.len(),
            avg_rating: average_rating(&group),
        })
        .collect::<Vec<_>>();
    listing_stats.sort_by(|a, b| {
        b.count.cmp(&a.count).then_with(|| {
            b.avg_rating
                .unwrap_or(0.0)
                .total_cmp(&a.avg_rating.unwrap_or(0.0))
        })
    });

    let type_stats = group_by(reviews, |r| Some(r.review_type.clone()))
        .into_iter()
        .map(|(review_type, group)| TypeStat {
            review_type,
            count: group.len(),
            avg_rating: average_rating(&group),
        })
        .collect();

    let mut monthly = group_by(reviews, |r| r.submitted_at.as_deref().map(month_bucket))
        .into_iter()
        .map(|(month, group)| MonthStat {
            month,
            count: group.len(),
            avg_rating: average_rating(&group),
        })
        .collect::<Vec<_>>();
    monthly.sort_by(|a, b| a.month.cmp(&b.month));

    AggregateSnapshot {
        listing_stats,
        type_stats,
        monthly,
    }
}

/// `YYYY-MM` prefix of an ISO instant.
fn month_bucket(submitted_at: &str) -> String {
    submitted_at.chars().take(7).collect()
}

fn group_by<'a, F>(reviews: &'a [CanonicalReview], key: F) -> Vec<(String, Vec<&'a CanonicalReview>)>
where
    F: Fn(&CanonicalReview) -> Option<String>,
{
    let mut index = HashMap::<String, usize>::new();
    let mut groups = Vec::<(String, Vec<&CanonicalReview>)>::new();
    for review in reviews {
        let Some(k) = key(review) else { continue };
        match index.get(&k) {
            Some(&slot) => groups[slot].1.push(review),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![review]));
            }
        }
    }
    groups
}

/// Unrated reviews count as 0 toward the mean.
fn average_rating(group: &[&CanonicalReview]) -> Option<f64> {
    if group.is_empty() {
        return None;
    }
    let total = group
        .iter()
        .map(|r| r.overall_rating.unwrap_or(0.0))
        .sum::<f64>();
    Some(round_one_decimal(total / group.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CategoryScores;

    fn review(listing: &str, review_type: &str, rating: Option<f64>, submitted_at: Option<&str>) -> CanonicalReview {
        CanonicalReview {
            id: format!("{listing}-{review_type}-{rating:?}"),
            channel: "hostaway".into(),
            review_type: review_type.into(),
            status: "published".into(),
            overall_rating: rating,
            categories: CategoryScores::new(),
            text: String::new(),
            submitted_at: submitted_at.map(ToString::to_string),
            guest_name: None,
            listing_name: listing.into(),
        }
    }

    #[test]
    fn unrated_reviews_count_as_zero() {
        let reviews = vec![
            review("A", "guest-to-host", Some(4.0), None),
            review("A", "guest-to-host", Some(5.0), None),
            review("A", "guest-to-host", None, None),
            review("B", "guest-to-host", Some(3.0), None),
        ];
        let snapshot = build_aggregates(&reviews);
        assert_eq!(
            snapshot.listing_stats,
            vec![
                ListingStat { listing: "A".into(), count: 3, avg_rating: Some(3.0) },
                ListingStat { listing: "B".into(), count: 1, avg_rating: Some(3.0) },
            ]
        );
    }

    #[test]
    fn listing_ties_on_count_break_by_average() {
        let reviews = vec![
            review("Low", "guest-to-host", Some(2.0), None),
            review("Unrated", "guest-to-host", None, None),
            review("High", "guest-to-host", Some(4.5), None),
        ];
        let snapshot = build_aggregates(&reviews);
        let order = snapshot
            .listing_stats
            .iter()
            .map(|s| s.listing.as_str())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["High", "Low", "Unrated"]);
        assert_eq!(snapshot.listing_stats[2].avg_rating, Some(0.0));
    }

    #[test]
    fn types_keep_discovery_order() {
        let reviews = vec![
            review("A", "host-to-guest", Some(4.0), None),
            review("A", "guest-to-host", Some(5.0), None),
            review("B", "guest-to-host", Some(3.0), None),
        ];
        let snapshot = build_aggregates(&reviews);
        assert_eq!(snapshot.type_stats[0].review_type, "host-to-guest");
        assert_eq!(snapshot.type_stats[1].review_type, "guest-to-host");
        assert_eq!(snapshot.type_stats[1].count, 2);
        assert_eq!(snapshot.type_stats[1].avg_rating, Some(4.0));
    }

    #[test]
    fn monthly_buckets_sorted_and_skip_undated() {
        let reviews = vec![
            review("A", "guest-to-host", Some(4.0), Some("2024-03-02T10:00:00.000Z")),
            review("A", "guest-to-host", Some(5.0), Some("2023-11-30T10:00:00.000Z")),
            review("B", "guest-to-host", Some(3.0), Some("2024-03-15T09:00:00.000Z")),
            review("B", "guest-to-host", Some(1.0), None),
        ];
        let snapshot = build_aggregates(&reviews);
        assert_eq!(
            snapshot.monthly,
            vec![
                MonthStat { month: "2023-11".into(), count: 1, avg_rating: Some(5.0) },
                MonthStat { month: "2024-03".into(), count: 2, avg_rating: Some(3.5) },
            ]
        );
    }

    #[test]
    fn empty_batch_yields_empty_snapshot() {
        assert_eq!(build_aggregates(&[]), AggregateSnapshot::default());
    }

    #[test]
    fn repeated_runs_serialize_identically() {
        let reviews = vec![
            review("A", "guest-to-host", Some(4.0), Some("2024-01-01T00:00:00.000Z")),
            review("B", "host-to-guest", None, Some("2024-02-01T00:00:00.000Z")),
            review("C", "guest-to-host", Some(2.5), None),
        ];
        let first = serde_json::to_vec(&build_aggregates(&reviews)).unwrap();
        let second = serde_json::to_vec(&build_aggregates(&reviews)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn snapshot_uses_wire_field_names() {
        let snapshot = build_aggregates(&[review("A", "guest-to-host", Some(4.0), None)]);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["listingStats"][0]["avgRating"], serde_json::json!(4.0));
        assert_eq!(value["typeStats"][0]["type"], serde_json::json!("guest-to-host"));
        assert!(value["monthly"].as_array().unwrap().is_empty());
    }
}
