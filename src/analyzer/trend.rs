use crate::types::{FieldComparison, Trend};

/// Classify the move from `previous` to `current`. Exact comparison, no
/// tolerance: renderers round for display but the trend uses full precision.
pub fn classify(previous: f64, current: f64) -> Trend {
    if current > previous {
        Trend::Increased
    } else if current < previous {
        Trend::Decreased
    } else {
        Trend::Unchanged
    }
}

pub fn compare(previous: f64, current: f64) -> FieldComparison {
    FieldComparison {
        previous,
        current,
        trend: classify(previous, current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_current_is_increase() {
        assert_eq!(classify(0.0, 1.0), Trend::Increased);
    }

    #[test]
    fn lower_current_is_decrease() {
        assert_eq!(classify(3.0, 2.0), Trend::Decreased);
    }

    #[test]
    fn equal_values_are_unchanged() {
        assert_eq!(classify(4.5, 4.5), Trend::Unchanged);
    }

    #[test]
    fn tiny_differences_still_count() {
        let previous = 1_250_000.0;
        let current = previous + 1e-6;
        assert_eq!(classify(previous, current), Trend::Increased);
        assert_eq!(classify(current, previous), Trend::Decreased);
    }

    #[test]
    fn compare_keeps_both_values() {
        let c = compare(0.0, 1.0);
        assert_eq!(c.previous, 0.0);
        assert_eq!(c.current, 1.0);
        assert_eq!(c.trend, Trend::Increased);
    }
}
