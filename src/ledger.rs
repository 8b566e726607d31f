//! Budget bookkeeping for a single ballot.
//!
//! Every function here takes the current allocations by reference and returns a fresh map, so a
//! caller can keep older snapshots around.

use crate::models::Allocations;

/// Sum of all points. Saturates instead of overflowing on corrupt input.
pub fn allocated(allocations: &Allocations) -> u32 {
    allocations
        .values()
        .fold(0u32, |total, points| total.saturating_add(*points))
}

/// Points still available. Saturates at zero if the map is already over budget.
pub fn remaining(allocations: &Allocations, budget: u32) -> u32 {
    budget.saturating_sub(allocated(allocations))
}

/// Sets one candidate's points, clamped to `[0, budget]` and capped so the ledger never exceeds
/// the budget. Lowering a value is always applied in full; raising it can only use points that
/// are currently free. Returns the new allocations and the value actually applied.
pub fn set_candidate_points(
    allocations: &Allocations,
    candidate_id: &str,
    requested: i64,
    budget: u32,
) -> (Allocations, u32) {
    let requested = requested.clamp(0, budget as i64) as u32;

    let current = allocations.get(candidate_id).copied().unwrap_or(0);
    let others_total = allocated(allocations).saturating_sub(current);
    let max_allowed = budget.saturating_sub(others_total);
    let applied = requested.min(max_allowed);

    let mut updated = allocations.clone();
    updated.insert(candidate_id.to_string(), applied);
    (updated, applied)
}

/// Lenient parse for text typed into a points field. Anything unreadable counts as zero.
pub fn parse_points(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return value;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value.trunc() as i64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocations(pairs: &[(&str, u32)]) -> Allocations {
        pairs.iter().map(|(id, p)| (id.to_string(), *p)).collect()
    }

    #[test]
    fn remaining_counts_down_from_budget() {
        assert_eq!(remaining(&Allocations::new(), 100), 100);
        assert_eq!(remaining(&allocations(&[("a", 30), ("b", 45)]), 100), 25);
        assert_eq!(remaining(&allocations(&[("a", 60), ("b", 60)]), 100), 0);
    }

    #[test]
    fn increase_is_capped_by_free_points() {
        let current = allocations(&[("a", 70), ("b", 10)]);
        let (updated, applied) = set_candidate_points(&current, "b", 50, 100);

        assert_eq!(applied, 30);
        assert_eq!(updated["b"], 30);
        assert_eq!(updated["a"], 70);
        assert_eq!(allocated(&updated), 100);
        // input snapshot untouched
        assert_eq!(current["b"], 10);
    }

    #[test]
    fn requested_value_is_clamped_to_budget_range() {
        let (updated, applied) = set_candidate_points(&Allocations::new(), "a", 250, 100);
        assert_eq!(applied, 100);
        assert_eq!(updated["a"], 100);

        let (updated, applied) = set_candidate_points(&updated, "a", -20, 100);
        assert_eq!(applied, 0);
        assert_eq!(updated["a"], 0);
    }

    #[test]
    fn setting_zero_never_touches_others() {
        let current = allocations(&[("a", 40), ("b", 35), ("c", 25)]);
        for id in ["a", "b", "c"] {
            let (updated, applied) = set_candidate_points(&current, id, 0, 100);
            assert_eq!(applied, 0);
            for (other, points) in &current {
                if other != id {
                    assert_eq!(updated[other], *points);
                }
            }
        }
    }

    #[test]
    fn full_ledger_rejects_any_increase() {
        let current = allocations(&[("a", 50), ("b", 30), ("c", 20)]);
        for id in ["a", "b", "c"] {
            let (updated, _) = set_candidate_points(&current, id, current[id] as i64 + 1, 100);
            assert_eq!(updated, current);
        }
    }

    #[test]
    fn unknown_candidate_starts_at_zero() {
        let current = allocations(&[("a", 90)]);
        let (updated, applied) = set_candidate_points(&current, "z", 25, 100);

        assert_eq!(applied, 10);
        assert_eq!(updated["z"], 10);
    }

    #[test]
    fn conservation_holds_over_arbitrary_edits() {
        let requests: [(&str, i64); 8] = [
            ("a", 80),
            ("b", 80),
            ("c", -3),
            ("a", 10),
            ("c", 95),
            ("b", 1000),
            ("a", 0),
            ("b", 7),
        ];
        let mut current = Allocations::new();
        for (id, value) in requests {
            current = set_candidate_points(&current, id, value, 100).0;
            assert!(allocated(&current) <= 100);
        }
    }

    #[test]
    fn oversized_values_saturate() {
        let corrupt = allocations(&[("a", u32::MAX), ("b", 1)]);

        assert_eq!(allocated(&corrupt), u32::MAX);
        assert_eq!(remaining(&corrupt, 100), 0);

        let (updated, applied) = set_candidate_points(&corrupt, "b", 50, 100);
        assert_eq!(applied, 0);
        assert_eq!(updated["b"], 0);
    }

    #[test]
    fn malformed_input_reads_as_zero() {
        assert_eq!(parse_points("42"), 42);
        assert_eq!(parse_points("  17 "), 17);
        assert_eq!(parse_points("-8"), -8);
        assert_eq!(parse_points("12.9"), 12);
        assert_eq!(parse_points(""), 0);
        assert_eq!(parse_points("abc"), 0);
        assert_eq!(parse_points("NaN"), 0);
        assert_eq!(parse_points("inf"), 0);
    }
}
