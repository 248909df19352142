// SPDX: CC0-1.0

//! Grid lines and axis labels.

use crate::Number;
use core::ops::Range;

/// Roughly how many grid lines to aim for across a range.
pub const TARGET_TICKS: usize = 10;

/// Rounds `value` to 1, 2 or 5 times a power of ten.
///
/// With `round` the nearest such number is picked, otherwise the smallest
/// one not below `value`.
pub fn nice_number(value: Number, round: bool) -> Number {
    if value == 0.0 || !value.is_finite() {
        return 0.0;
    }
    let exponent = value.abs().log10().floor();
    let magnitude = Number::powf(10.0, exponent);
    let fraction = value.abs() / magnitude;
    let nice = if round {
        match fraction {
            f if f < 1.5 => 1.0,
            f if f < 3.0 => 2.0,
            f if f < 7.0 => 5.0,
            _ => 10.0,
        }
    } else {
        match fraction {
            f if f <= 1.0 => 1.0,
            f if f <= 2.0 => 2.0,
            f if f <= 5.0 => 5.0,
            _ => 10.0,
        }
    };
    nice * magnitude
}

/// Distance between grid lines for `range` split into about `target` parts.
pub fn tick_step(range: &Range<Number>, target: usize) -> Number {
    let span = range.end - range.start;
    let parts = target.max(1) as Number;
    nice_number(span / parts, true)
}

/// Multiples of [`tick_step`] inside `range`, ascending.
pub fn ticks(range: Range<Number>, target: usize) -> Vec<Number> {
    let step = tick_step(&range, target);
    if !(step.is_finite() && step > 0.0) {
        return Vec::new();
    }
    let first = (range.start / step).ceil() as i64;
    let last = (range.end / step).floor() as i64;
    // computed from the index so ticks sit exactly on multiples of step
    (first..=last).map(|k| k as Number * step).collect()
}

/// Label for a tick at `value` on a grid of spacing `step`, with just enough
/// decimals to tell neighbouring ticks apart.
pub fn format_tick(value: Number, step: Number) -> String {
    if value.abs() < step.abs() * 1e-9 {
        return "0".to_string();
    }
    let decimals = if step > 0.0 && step < 1.0 {
        (-step.log10() - 1e-9).ceil() as usize
    } else {
        0
    };
    let text = format!("{value:.decimals$}");
    if text.starts_with('-') && text[1..].chars().all(|c| c == '0' || c == '.') {
        text[1..].to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn nice_numbers() {
        assert_relative_eq!(nice_number(0.013, true), 0.01, epsilon = 1e-15);
        assert_relative_eq!(nice_number(2.4, true), 2.0);
        assert_relative_eq!(nice_number(4.0, true), 5.0);
        assert_relative_eq!(nice_number(8.0, true), 10.0);
        assert_relative_eq!(nice_number(2.4, false), 5.0);
        assert_relative_eq!(nice_number(130.0, false), 200.0);
        assert_eq!(nice_number(0.0, true), 0.0);
    }

    #[test]
    fn ticks_cover_symmetric_range() {
        let ts = ticks(-10.0..10.0, 10);
        assert_eq!(ts.len(), 11);
        assert_relative_eq!(ts[0], -10.0);
        assert_relative_eq!(ts[5], 0.0);
        assert_relative_eq!(ts[10], 10.0);
    }

    #[test]
    fn ticks_stay_inside_offset_range() {
        let ts = ticks(0.35..1.27, 10);
        assert_relative_eq!(ts[0], 0.4, epsilon = 1e-12);
        assert!(ts.iter().all(|t| (0.35..=1.27).contains(t)));
        assert!(ticks(1.0..1.0, 10).is_empty());
    }

    #[test]
    fn labels_use_step_precision() {
        assert_eq!(format_tick(2.0, 1.0), "2");
        assert_eq!(format_tick(0.30000000000000004, 0.1), "0.3");
        assert_eq!(format_tick(-0.25, 0.05), "-0.25");
        assert_eq!(format_tick(1e-17, 0.1), "0");
        assert_eq!(format_tick(-0.0001, 0.1), "0.0");
        assert_eq!(format_tick(-1500.0, 500.0), "-1500");
    }
}
