use crate::analyzer::fields::TRACKED_FIELDS;
use crate::analyzer::trend::compare;
use crate::types::{DeltaIndex, Side, SideComparison, Snapshot, SnapshotDelta};

/// Build the delta index for a series delivered most-recent-first.
///
/// Each snapshot is compared with the one after it (the next older record);
/// the oldest compares with itself, so all of its trends are `Unchanged`.
/// Pairing is positional: the caller is responsible for the ordering.
/// Duplicate primary keys are not merged; the later position wins.
pub fn analyze(snapshots: &[Snapshot]) -> DeltaIndex {
    let mut index = DeltaIndex::new();
    for (i, current) in snapshots.iter().enumerate() {
        let baseline = snapshots.get(i + 1).unwrap_or(current);
        index.insert(current.prediction_id, compare_snapshots(baseline, current));
    }
    index
}

/// Compare every tracked field on both sides.
pub fn compare_snapshots(baseline: &Snapshot, current: &Snapshot) -> SnapshotDelta {
    SnapshotDelta {
        left: compare_side(Side::Left, baseline, current),
        right: compare_side(Side::Right, baseline, current),
    }
}

fn compare_side(side: Side, baseline: &Snapshot, current: &Snapshot) -> SideComparison {
    TRACKED_FIELDS
        .iter()
        .filter_map(|field| {
            let previous = field.extract(side, baseline)?;
            let now = field.extract(side, current)?;
            Some((field.name, compare(previous, now)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldComparison, Trend};

    fn snap(id: i64, min: i64) -> Snapshot {
        Snapshot {
            prediction_id: id,
            min,
            ..Default::default()
        }
    }

    fn full_snap(id: i64, min: i64, base: f64) -> Snapshot {
        Snapshot {
            prediction_id: id,
            min,
            left_num_z: Some(base),
            left_num_p: Some(base),
            left_num_n: Some(base),
            left_avg_time_player_in_game: Some(base),
            left_num_y: Some(base),
            left_num_y2r: Some(base),
            left_total_transfer_value: Some(base),
            left_avg_transfer_value: Some(base),
            left_right_transfer_value_div: Some(base),
            right_num_z: Some(base),
            right_num_p: Some(base),
            right_num_n: Some(base),
            right_avg_time_player_in_game: Some(base),
            right_num_y: Some(base),
            right_num_y2r: Some(base),
            right_total_transfer_value: Some(base),
            right_avg_transfer_value: Some(base),
            right_left_transfer_value_div: Some(base),
            ..Default::default()
        }
    }

    #[test]
    fn newer_card_is_increase_and_oldest_is_unchanged() {
        let series = vec![
            Snapshot { left_num_y: Some(1.0), ..snap(5, 10) },
            Snapshot { left_num_y: Some(0.0), ..snap(4, 5) },
        ];
        let index = analyze(&series);

        assert_eq!(
            index[&5].left["num_y"],
            FieldComparison { previous: 0.0, current: 1.0, trend: Trend::Increased }
        );
        assert_eq!(
            index[&4].left["num_y"],
            FieldComparison { previous: 0.0, current: 0.0, trend: Trend::Unchanged }
        );
    }

    #[test]
    fn empty_series_gives_empty_index() {
        assert!(analyze(&[]).is_empty());
    }

    #[test]
    fn one_entry_per_snapshot() {
        let series: Vec<_> = (0..6).rev().map(|i| full_snap(100 + i, i * 10, i as f64)).collect();
        let index = analyze(&series);
        assert_eq!(index.len(), series.len());
        for s in &series {
            assert!(index.contains_key(&s.prediction_id));
        }
    }

    #[test]
    fn baseline_is_next_older_snapshot() {
        let series = vec![full_snap(3, 30, 7.0), full_snap(2, 20, 9.0), full_snap(1, 10, 9.0)];
        let index = analyze(&series);

        for cmp in index[&3].left.values().chain(index[&3].right.values()) {
            assert_eq!(cmp.previous, 9.0);
            assert_eq!(cmp.current, 7.0);
            assert_eq!(cmp.trend, Trend::Decreased);
        }
        for cmp in index[&2].left.values() {
            assert_eq!(cmp.trend, Trend::Unchanged);
        }
    }

    #[test]
    fn oldest_compares_with_itself() {
        let series = vec![full_snap(2, 20, 1.0), full_snap(1, 10, 4.0)];
        let index = analyze(&series);
        let oldest = &index[&1];
        assert_eq!(oldest.left.len(), 9);
        assert_eq!(oldest.right.len(), 9);
        for cmp in oldest.left.values().chain(oldest.right.values()) {
            assert_eq!(cmp.previous, cmp.current);
            assert_eq!(cmp.trend, Trend::Unchanged);
        }
    }

    #[test]
    fn trend_matches_value_ordering_for_every_field() {
        let mut newer = full_snap(2, 20, 5.0);
        newer.left_num_z = Some(6.0);
        newer.right_total_transfer_value = Some(4.0);
        let older = full_snap(1, 10, 5.0);
        let index = analyze(&[newer, older]);

        for side in [Side::Left, Side::Right] {
            for cmp in index[&2].side(side).values() {
                let expected = if cmp.current > cmp.previous {
                    Trend::Increased
                } else if cmp.current < cmp.previous {
                    Trend::Decreased
                } else {
                    Trend::Unchanged
                };
                assert_eq!(cmp.trend, expected);
            }
        }
        assert_eq!(index[&2].left["num_z"].trend, Trend::Increased);
        assert_eq!(index[&2].right["total_value"].trend, Trend::Decreased);
    }

    #[test]
    fn missing_field_on_either_side_is_skipped() {
        let newer = Snapshot { left_num_y: Some(2.0), left_num_z: None, ..snap(2, 20) };
        let older = Snapshot { left_num_y: None, left_num_z: Some(4.0), ..snap(1, 10) };
        let index = analyze(&[newer, older]);

        assert!(index[&2].left.is_empty());
        assert!(index[&2].right.is_empty());
        // The oldest has only its own num_z.
        assert_eq!(index[&1].left.keys().copied().collect::<Vec<_>>(), vec!["num_z"]);
    }

    #[test]
    fn analysis_is_idempotent() {
        let series = vec![full_snap(3, 30, 1.0), full_snap(2, 20, 2.0), full_snap(1, 10, 0.5)];
        assert_eq!(analyze(&series), analyze(&series));
    }

    #[test]
    fn duplicate_keys_are_not_merged() {
        let series = vec![
            Snapshot { left_num_y: Some(3.0), ..snap(9, 30) },
            Snapshot { left_num_y: Some(1.0), ..snap(9, 20) },
            Snapshot { left_num_y: Some(1.0), ..snap(8, 10) },
        ];
        let index = analyze(&series);
        assert_eq!(index.len(), 2);
        // Position 1 overwrote position 0.
        assert_eq!(index[&9].left["num_y"].trend, Trend::Unchanged);
    }
}
