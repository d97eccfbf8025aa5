use chrono::TimeDelta;

/// Units in decreasing order.
const UNITS: [(i64, &str); 4] = [(24 * 60 * 60, "d"), (60 * 60, "h"), (60, "m"), (1, "s")];

/// Render `d` as its two most significant units, starting at the first
/// non-zero one: `3h0m`, `1d1h`, `45m21s`. Sub-second remainders are dropped
/// and anything under a second renders as `0`.
pub fn rough_duration(d: TimeDelta) -> String {
    let mut secs = d.num_seconds();
    if secs <= 0 {
        return "0".to_string();
    }
    let mut parts = Vec::with_capacity(2);
    for (unit, suffix) in UNITS {
        if secs < unit && parts.is_empty() {
            continue;
        }
        let n = secs / unit;
        parts.push(format!("{n}{suffix}"));
        secs -= n * unit;
        if parts.len() == 2 {
            break;
        }
    }
    parts.concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rough_duration_table() {
        let cases = [
            (TimeDelta::zero(), "0"),
            (TimeDelta::seconds(10), "10s"),
            (
                TimeDelta::minutes(45) + TimeDelta::seconds(21) + TimeDelta::milliseconds(150),
                "45m21s",
            ),
            (TimeDelta::hours(3) + TimeDelta::seconds(21), "3h0m"),
            (TimeDelta::hours(25), "1d1h"),
            (TimeDelta::hours(51) + TimeDelta::minutes(6), "2d3h"),
        ];
        for (input, want) in cases {
            assert_eq!(rough_duration(input), want, "rough_duration({input:?})");
        }
    }

    #[test]
    fn negative_renders_zero() {
        assert_eq!(rough_duration(TimeDelta::seconds(-5)), "0");
    }

    #[test]
    fn sub_second_renders_zero() {
        assert_eq!(rough_duration(TimeDelta::milliseconds(999)), "0");
    }

    #[test]
    fn exact_day_keeps_trailing_zero_unit() {
        assert_eq!(rough_duration(TimeDelta::days(2)), "2d0h");
    }
}
