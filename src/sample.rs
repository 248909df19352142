// SPDX: CC0-1.0

use crate::{adapter::Evaluator, viewport::Viewport, Number, Point};
use core::ops::Range;
use log::trace;

/// Consecutive finite samples further apart than this many viewport
/// heights are treated as an asymptote rather than a steep curve.
pub const JUMP_FACTOR: Number = 2.0;

/// Samples `f` once per horizontal pixel of `viewport`.
pub fn sample<E: Evaluator + ?Sized>(f: &mut E, viewport: &Viewport) -> Vec<Point> {
    sample_range(f, viewport.min_x()..viewport.max_x(), viewport.width())
}

/// Samples `f` at `steps + 1` evenly spaced inputs from `range.start` to
/// `range.end` inclusive.
///
/// A failed or non-finite evaluation becomes a gap marker, except before
/// the first real point where it is dropped. Inputs are computed from the
/// step index so the last sample lands on `range.end` exactly.
pub fn sample_range<E: Evaluator + ?Sized>(
    f: &mut E,
    range: Range<Number>,
    steps: u32,
) -> Vec<Point> {
    sample_by(f, range, steps, |input, val| (input, val))
}

/// Traces the polar curve `r = f(θ)` for θ across `theta`.
pub fn sample_polar<E: Evaluator + ?Sized>(
    f: &mut E,
    theta: Range<Number>,
    steps: u32,
) -> Vec<Point> {
    sample_by(f, theta, steps, |t, r| (r * t.cos(), r * t.sin()))
}

fn sample_by<E, P>(f: &mut E, range: Range<Number>, steps: u32, mut place: P) -> Vec<Point>
where
    E: Evaluator + ?Sized,
    P: FnMut(Number, Number) -> (Number, Number),
{
    let steps = steps.max(1);
    let span = range.end - range.start;
    let mut out = Vec::with_capacity(steps as usize + 1);
    let mut failures = 0_usize;

    for i in 0..=steps {
        let input = range.start + span * (Number::from(i) / Number::from(steps));
        match f.evaluate(input) {
            Ok(val) => {
                let (x, y) = place(input, val);
                if x.is_finite() && y.is_finite() {
                    out.push(Point::connected(x, y));
                    continue;
                }
                failures += 1;
                if !out.is_empty() {
                    out.push(Point::gap(x));
                }
            }
            Err(_) => {
                failures += 1;
                if !out.is_empty() {
                    out.push(Point::gap(input));
                }
            }
        }
    }

    trace!(
        "sampled {} inputs over {range:?}: {} points, {failures} failures",
        steps + 1,
        out.len()
    );
    out
}

/// Splits the curve where consecutive finite samples differ by more than
/// [`JUMP_FACTOR`] × `y_range`.
///
/// The transition is replaced by a disconnected copy of the earlier point
/// followed by the later point flagged as the start of a new run. Points
/// that already start a run are never split again, so the function is
/// idempotent.
pub fn detect_jumps(points: &[Point], y_range: Number) -> Vec<Point> {
    let threshold = JUMP_FACTOR * y_range;
    if !(threshold.is_finite() && threshold > 0.0) {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len());
    let mut jumps = 0_usize;
    let mut prev: Option<&Point> = None;
    for cur in points {
        match prev {
            Some(prev)
                if cur.connected
                    && prev.is_finite()
                    && cur.is_finite()
                    && (cur.y - prev.y).abs() > threshold =>
            {
                out.push(Point {
                    connected: false,
                    ..*prev
                });
                out.push(Point {
                    connected: false,
                    ..*cur
                });
                jumps += 1;
            }
            _ => out.push(*cur),
        }
        prev = Some(cur);
    }

    if jumps > 0 {
        trace!("split curve at {jumps} jumps (threshold {threshold})");
    }
    out
}
