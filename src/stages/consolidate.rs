use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::models::TimePoint;

/// Sorted, deduplicated timeline computed from a snapshot.
///
/// Nothing is mutated while the plan is built; the owner of the document
/// applies it in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationPlan {
    /// Surviving points, ascending by time
    pub timeline: Vec<TimePoint>,
    /// For each surviving point, its index in the snapshot
    pub kept: Vec<usize>,
    /// Removed point id -> id of the point that replaces it
    pub rewrites: HashMap<String, String>,
}

impl ConsolidationPlan {
    /// Number of points folded into a survivor
    pub fn removed_count(&self) -> usize {
        self.rewrites.len()
    }

    /// Surviving point for a removed id; `None` when `id` was kept
    pub fn survivor(&self, id: &str) -> Option<&str> {
        self.rewrites.get(id).map(String::as_str)
    }
}

/// Sort the points and fold every point whose time exactly equals the
/// previous survivor's time into that survivor.
pub fn plan_consolidation(points: &[TimePoint]) -> ConsolidationPlan {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| points[a].time.total_cmp(&points[b].time));

    let mut timeline: Vec<TimePoint> = Vec::with_capacity(points.len());
    let mut kept = Vec::with_capacity(points.len());
    let mut rewrites = HashMap::new();

    for index in order {
        let point = &points[index];
        match timeline.last() {
            Some(survivor) if survivor.time == point.time => {
                trace!(
                    "Removing tli {} at {}, duplicate of {}",
                    point.id, point.time, survivor.id
                );
                if point.id != survivor.id {
                    rewrites.insert(point.id.clone(), survivor.id.clone());
                }
            }
            _ => {
                timeline.push(point.clone());
                kept.push(index);
            }
        }
    }

    ConsolidationPlan {
        timeline,
        kept,
        rewrites,
    }
}

/// Round seconds to millisecond precision.
///
/// Rounds the exact binary value, so `1.0005` (stored just below the
/// half-way point) becomes `1.0`.
pub fn round_to_millis(seconds: f64) -> f64 {
    format!("{seconds:.3}").parse().unwrap_or(seconds)
}

/// First point whose time rounds to the same millisecond as `seconds`.
pub fn find_rounded(points: &[TimePoint], seconds: f64) -> Option<&TimePoint> {
    let target = round_to_millis(seconds);
    points
        .iter()
        .find(|point| round_to_millis(point.time) == target)
}

/// Fresh `T<n>` id, starting at one past the number of distinct ids.
pub fn next_point_id(points: &[TimePoint]) -> String {
    let used: HashSet<&str> = points.iter().map(|p| p.id.as_str()).collect();
    let mut n = used.len() + 1;
    loop {
        let candidate = format!("T{n}");
        if !used.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// Shortest decimal form that reads back to the same value, always with a
/// fractional part (`2.0`, `1.235`).
pub fn format_time(seconds: f64) -> String {
    if seconds.is_finite() && seconds.fract() == 0.0 {
        format!("{seconds:.1}")
    } else {
        format!("{seconds}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(entries: &[(&str, f64)]) -> Vec<TimePoint> {
        entries.iter().map(|(id, t)| TimePoint::new(*id, *t)).collect()
    }

    #[test]
    fn test_duplicates_are_folded_into_first_survivor() {
        let snapshot = points(&[
            ("T0", 0.0),
            ("T1", 1.5),
            ("T2", 1.5),
            ("T3", 0.75),
            ("T4", 1.5),
        ]);

        let plan = plan_consolidation(&snapshot);

        let ids: Vec<_> = plan.timeline.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["T0", "T3", "T1"]);
        assert_eq!(plan.kept, vec![0, 3, 1]);
        assert_eq!(plan.removed_count(), 2);
        assert_eq!(plan.survivor("T2"), Some("T1"));
        assert_eq!(plan.survivor("T4"), Some("T1"));
        assert_eq!(plan.survivor("T3"), None);
        assert_eq!(plan.survivor("T1"), None);
    }

    #[test]
    fn test_equal_times_keep_document_order() {
        let snapshot = points(&[("T2", 1.0), ("T0", 0.0), ("T1", 1.0), ("T3", 0.5)]);

        let plan = plan_consolidation(&snapshot);

        let ids: Vec<_> = plan.timeline.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["T0", "T3", "T2"]);
        assert_eq!(plan.survivor("T1"), Some("T2"));
    }

    #[test]
    fn test_dedup_uses_exact_equality() {
        let snapshot = points(&[("T0", 1.0), ("T1", 1.0004)]);
        let plan = plan_consolidation(&snapshot);
        assert_eq!(plan.timeline.len(), 2);
        assert!(plan.rewrites.is_empty());
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let snapshot = points(&[("a", 2.0), ("b", 1.0), ("c", 2.0), ("d", 1.0)]);
        let first = plan_consolidation(&snapshot);
        let second = plan_consolidation(&first.timeline);

        assert_eq!(second.timeline, first.timeline);
        assert!(second.rewrites.is_empty());
    }

    #[test]
    fn test_round_to_millis_uses_exact_binary_value() {
        assert_eq!(round_to_millis(1.0005), 1.0);
        assert_eq!(round_to_millis(1.2345), 1.234);
        assert_eq!(round_to_millis(0.33333), 0.333);
        assert_eq!(round_to_millis(2.0), 2.0);
    }

    #[test]
    fn test_rounded_lookup() {
        let timeline = points(&[("T0", 0.0), ("T1", 1.2344), ("T2", 3.0)]);
        assert_eq!(find_rounded(&timeline, 1.234).map(|p| p.id.as_str()), Some("T1"));
        assert_eq!(find_rounded(&timeline, 1.2341).map(|p| p.id.as_str()), Some("T1"));
        assert!(find_rounded(&timeline, 1.236).is_none());
    }

    #[test]
    fn test_next_point_id_skips_used_ids() {
        let timeline = points(&[("T0", 0.0), ("T3", 1.0), ("T4", 2.0)]);
        assert_eq!(next_point_id(&timeline), "T5");

        let timeline = points(&[("T0", 0.0), ("T1", 1.0)]);
        assert_eq!(next_point_id(&timeline), "T3");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(2.0), "2.0");
        assert_eq!(format_time(round_to_millis(1.23456)), "1.235");
        assert_eq!(format_time(0.1), "0.1");
    }
}
