use crate::types::{Side, Snapshot};

/// Extracts one side's value of a tracked field from a snapshot.
pub type Extractor = fn(&Snapshot) -> Option<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldGroup {
    Formation,
    Time,
    Discipline,
    Value,
}

impl FieldGroup {
    pub fn title(self) -> &'static str {
        match self {
            FieldGroup::Formation => "Formation",
            FieldGroup::Time => "Time",
            FieldGroup::Discipline => "Discipline",
            FieldGroup::Value => "Squad value",
        }
    }
}

/// How a renderer should print a tracked value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Count,
    Minutes,
    /// Euros, printed in millions.
    Millions,
    /// Euros, printed in thousands.
    Thousands,
    Ratio,
}

impl ValueFormat {
    pub fn render(self, v: f64) -> String {
        match self {
            ValueFormat::Count => format!("{v:.0}"),
            ValueFormat::Minutes => format!("{:.0} min", v.round()),
            ValueFormat::Millions => format!("€{:.1}M", v / 1_000_000.0),
            ValueFormat::Thousands => format!("€{:.1}K", v / 1_000.0),
            ValueFormat::Ratio => format!("{v:.2}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackedField {
    pub name: &'static str,
    pub label: &'static str,
    pub group: FieldGroup,
    pub format: ValueFormat,
    left: Extractor,
    right: Extractor,
}

impl TrackedField {
    pub fn extract(&self, side: Side, snapshot: &Snapshot) -> Option<f64> {
        match side {
            Side::Left => (self.left)(snapshot),
            Side::Right => (self.right)(snapshot),
        }
    }
}

/// The fields compared between consecutive snapshots, in display order.
/// The value differential is directional: left side reads left-minus-right,
/// right side reads right-minus-left.
pub const TRACKED_FIELDS: &[TrackedField] = &[
    TrackedField {
        name: "num_z",
        label: "Defenders",
        group: FieldGroup::Formation,
        format: ValueFormat::Count,
        left: |s| s.left_num_z,
        right: |s| s.right_num_z,
    },
    TrackedField {
        name: "num_p",
        label: "Midfielders",
        group: FieldGroup::Formation,
        format: ValueFormat::Count,
        left: |s| s.left_num_p,
        right: |s| s.right_num_p,
    },
    TrackedField {
        name: "num_n",
        label: "Forwards",
        group: FieldGroup::Formation,
        format: ValueFormat::Count,
        left: |s| s.left_num_n,
        right: |s| s.right_num_n,
    },
    TrackedField {
        name: "avg_time",
        label: "Avg. minutes on pitch",
        group: FieldGroup::Time,
        format: ValueFormat::Minutes,
        left: |s| s.left_avg_time_player_in_game,
        right: |s| s.right_avg_time_player_in_game,
    },
    TrackedField {
        name: "num_y",
        label: "Yellow cards",
        group: FieldGroup::Discipline,
        format: ValueFormat::Count,
        left: |s| s.left_num_y,
        right: |s| s.right_num_y,
    },
    TrackedField {
        name: "num_y2r",
        label: "Second yellows",
        group: FieldGroup::Discipline,
        format: ValueFormat::Count,
        left: |s| s.left_num_y2r,
        right: |s| s.right_num_y2r,
    },
    TrackedField {
        name: "total_value",
        label: "Total value",
        group: FieldGroup::Value,
        format: ValueFormat::Millions,
        left: |s| s.left_total_transfer_value,
        right: |s| s.right_total_transfer_value,
    },
    TrackedField {
        name: "avg_value",
        label: "Average value",
        group: FieldGroup::Value,
        format: ValueFormat::Thousands,
        left: |s| s.left_avg_transfer_value,
        right: |s| s.right_avg_transfer_value,
    },
    TrackedField {
        name: "value_div",
        label: "Value differential",
        group: FieldGroup::Value,
        format: ValueFormat::Ratio,
        left: |s| s.left_right_transfer_value_div,
        right: |s| s.right_left_transfer_value_div,
    },
];

pub fn tracked_field(name: &str) -> Option<&'static TrackedField> {
    TRACKED_FIELDS.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn nine_unique_fields_per_side() {
        assert_eq!(TRACKED_FIELDS.len(), 9);
        let names: HashSet<_> = TRACKED_FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn extractors_read_the_matching_side() {
        let s = Snapshot {
            left_num_y: Some(2.0),
            right_num_y: Some(5.0),
            left_right_transfer_value_div: Some(1.5),
            right_left_transfer_value_div: Some(0.66),
            ..Default::default()
        };
        let cards = tracked_field("num_y").unwrap();
        assert_eq!(cards.extract(Side::Left, &s), Some(2.0));
        assert_eq!(cards.extract(Side::Right, &s), Some(5.0));

        let div = tracked_field("value_div").unwrap();
        assert_eq!(div.extract(Side::Left, &s), Some(1.5));
        assert_eq!(div.extract(Side::Right, &s), Some(0.66));

        let defenders = tracked_field("num_z").unwrap();
        assert_eq!(defenders.extract(Side::Left, &s), None);
    }

    #[test]
    fn value_formats() {
        assert_eq!(ValueFormat::Millions.render(12_345_678.0), "€12.3M");
        assert_eq!(ValueFormat::Thousands.render(950_000.0), "€950.0K");
        assert_eq!(ValueFormat::Minutes.render(61.6), "62 min");
        assert_eq!(ValueFormat::Ratio.render(1.234), "1.23");
        assert_eq!(ValueFormat::Count.render(3.0), "3");
    }
}
