// SPDX: CC0-1.0

//! Approximate intersections between sampled curves.
//!
//! Everything here works on the sampled polylines only; no root refinement
//! goes back to the expressions, so results are as precise as the sampling
//! resolution.

use crate::{
    graph::{Function, FunctionId},
    Number, PlotMode, Point,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Largest vertical distance that still counts as two curves touching.
pub const TANGENT_THRESHOLD: Number = 0.02;
/// Distance, in merged samples, between the three probes of the tangency
/// test.
pub const TANGENT_STRIDE: usize = 5;
/// Samples skipped at both ends of the merged x coordinates before
/// probing for tangency.
pub const TANGENT_MARGIN: usize = 10;
/// Below this the two segments are treated as parallel.
pub const PARALLEL_EPSILON: Number = 1e-10;
const DUPLICATE_EPSILON: Number = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    pub x: Number,
    pub y: Number,
    pub func1: FunctionId,
    pub func2: FunctionId,
    pub is_approximate: bool,
    #[serde(default)]
    pub is_tangent: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Hit {
    x: Number,
    y: Number,
    tangent: bool,
}

/// Intersections between every pair of enabled functions that have points.
pub fn find_intersections(functions: &[Function], mode: PlotMode) -> Vec<Intersection> {
    let live: Vec<&Function> = functions
        .iter()
        .filter(|f| f.enabled && !f.points.is_empty())
        .collect();

    let mut out = Vec::new();
    for (i, a) in live.iter().enumerate() {
        for b in &live[i + 1..] {
            let hits = match mode {
                PlotMode::Rectangular => rectangular_hits(&a.points, &b.points),
                PlotMode::Polar => segment_hits(&a.points, &b.points),
            };
            out.extend(hits.into_iter().map(|hit| Intersection {
                x: hit.x,
                y: hit.y,
                func1: a.id,
                func2: b.id,
                is_approximate: true,
                is_tangent: hit.tangent,
            }));
        }
    }

    debug!(
        "{} intersections across {} functions ({mode})",
        out.len(),
        live.len()
    );
    out
}

/// Linear interpolation of a rectangular-mode curve at `x`.
///
/// Defined only where the curve is drawn: either `x` hits a connected
/// sample exactly, or both samples bracketing it are connected.
pub fn interpolate(points: &[Point], x: Number) -> Option<Number> {
    let hi = points.partition_point(|p| p.x <= x);
    let lo = points.get(hi.checked_sub(1)?)?;

    if lo.x == x {
        // jump splitting duplicates x coordinates; any drawn copy will do
        return points[..hi]
            .iter()
            .rev()
            .take_while(|p| p.x == x)
            .find(|p| p.connected && p.is_finite())
            .map(|p| p.y);
    }

    let hi = points.get(hi)?;
    if !(lo.connected && hi.connected && lo.is_finite() && hi.is_finite()) {
        return None;
    }
    let t = (x - lo.x) / (hi.x - lo.x);
    Some(lo.y + t * (hi.y - lo.y))
}

fn merged_xs(a: &[Point], b: &[Point]) -> Vec<Number> {
    let mut xs: Vec<Number> = a
        .iter()
        .chain(b)
        .map(|p| p.x)
        .filter(|x| x.is_finite())
        .collect();
    xs.sort_by(Number::total_cmp);
    xs.dedup();
    xs
}

fn rectangular_hits(a: &[Point], b: &[Point]) -> Vec<Hit> {
    let xs = merged_xs(a, b);
    let mut hits = crossings(a, b, &xs);
    tangencies(a, b, &xs, &mut hits);
    hits
}

/// Sign changes of `a - b` between neighbouring merged x coordinates.
fn crossings(a: &[Point], b: &[Point], xs: &[Number]) -> Vec<Hit> {
    let mut hits = Vec::new();
    // difference at the left end of the previous bracket, if it was defined
    let mut before: Option<Number> = None;
    for w in xs.windows(2) {
        let (x1, x2) = (w[0], w[1]);
        let (Some(a1), Some(b1), Some(a2), Some(b2)) = (
            interpolate(a, x1),
            interpolate(b, x1),
            interpolate(a, x2),
            interpolate(b, x2),
        ) else {
            before = None;
            continue;
        };

        let d1 = a1 - b1;
        let d2 = a2 - b2;
        let d0 = before.replace(d1);
        if d1 == 0.0 {
            // exactly on a sample: a crossing only if the sign flips across
            // it, touching is left to the tangency pass
            if matches!(d0, Some(d0) if d0 != 0.0 && d2 != 0.0 && (d0 < 0.0) != (d2 < 0.0)) {
                hits.push(Hit {
                    x: x1,
                    y: a1,
                    tangent: false,
                });
            }
        } else if d2 != 0.0 && (d1 < 0.0) != (d2 < 0.0) {
            let t = d1.abs() / (d1.abs() + d2.abs());
            hits.push(Hit {
                x: x1 + t * (x2 - x1),
                y: a1 + t * (a2 - a1),
                tangent: false,
            });
        }
    }
    hits
}

/// Places where the curves approach within [`TANGENT_THRESHOLD`] without
/// necessarily crossing: strict local minima of the vertical distance.
fn tangencies(a: &[Point], b: &[Point], xs: &[Number], hits: &mut Vec<Hit>) {
    let gap = |x: Number| Some((interpolate(a, x)?, interpolate(b, x)?));
    let dist = |x: Number| gap(x).map(|(ya, yb)| (ya - yb).abs());

    if xs.len() <= 2 * TANGENT_MARGIN {
        return;
    }
    for i in TANGENT_MARGIN..xs.len() - TANGENT_MARGIN {
        let (lo, hi) = (xs[i - TANGENT_STRIDE], xs[i + TANGENT_STRIDE]);
        let (Some(before), Some(mid), Some(after)) = (dist(lo), dist(xs[i]), dist(hi)) else {
            continue;
        };
        if !(mid < before && mid < after && mid <= TANGENT_THRESHOLD) {
            continue;
        }

        // settle on the closest approach inside the probe window
        let mut best = (xs[i], mid);
        for &x in &xs[i - TANGENT_STRIDE + 1..i + TANGENT_STRIDE] {
            if let Some(d) = dist(x) {
                if d < best.1 {
                    best = (x, d);
                }
            }
        }
        let (x, _) = best;

        let window = 0.5 * (hi - lo);
        if hits.iter().any(|hit| (hit.x - x).abs() <= window) {
            continue;
        }
        if let Some((ya, yb)) = gap(x) {
            hits.push(Hit {
                x,
                y: 0.5 * (ya + yb),
                tangent: true,
            });
        }
    }
}

/// Where two segments cross, with the parameters along each.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentHit {
    pub x: Number,
    pub y: Number,
    /// Position along the first segment, `0..=1`.
    pub t: Number,
    /// Position along the second segment, `0..=1`.
    pub u: Number,
}

/// Intersection of the closed segments `p1–p2` and `p3–p4`, if any.
pub fn segment_intersection(
    [x1, y1]: [Number; 2],
    [x2, y2]: [Number; 2],
    [x3, y3]: [Number; 2],
    [x4, y4]: [Number; 2],
) -> Option<SegmentHit> {
    let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / denom;
    let u = -((x1 - x2) * (y1 - y3) - (y1 - y2) * (x1 - x3)) / denom;
    if !((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)) {
        return None;
    }

    Some(SegmentHit {
        x: x1 + t * (x2 - x1),
        y: y1 + t * (y2 - y1),
        t,
        u,
    })
}

#[derive(Clone, Copy)]
struct Segment {
    start: [Number; 2],
    end: [Number; 2],
    min: [Number; 2],
    max: [Number; 2],
}

impl Segment {
    fn overlaps(&self, other: &Self) -> bool {
        self.min[0] <= other.max[0]
            && other.min[0] <= self.max[0]
            && self.min[1] <= other.max[1]
            && other.min[1] <= self.max[1]
    }
}

/// Drawn segments of a polyline, in traversal order.
fn segments(points: &[Point]) -> Vec<Segment> {
    points
        .windows(2)
        .filter(|w| w[0].connected && w[1].connected && w[0].is_finite() && w[1].is_finite())
        .map(|w| {
            let (start, end) = ([w[0].x, w[0].y], [w[1].x, w[1].y]);
            Segment {
                start,
                end,
                min: [start[0].min(end[0]), start[1].min(end[1])],
                max: [start[0].max(end[0]), start[1].max(end[1])],
            }
        })
        .collect()
}

fn segment_hits(a: &[Point], b: &[Point]) -> Vec<Hit> {
    let (sa, sb) = (segments(a), segments(b));
    let mut hits: Vec<Hit> = Vec::new();
    for s in &sa {
        for r in sb.iter().filter(|r| s.overlaps(r)) {
            let Some(hit) = segment_intersection(s.start, s.end, r.start, r.end) else {
                continue;
            };
            // a crossing through a shared vertex shows up on both segments
            let duplicate = hits.iter().any(|h| {
                (h.x - hit.x).abs() < DUPLICATE_EPSILON && (h.y - hit.y).abs() < DUPLICATE_EPSILON
            });
            if !duplicate {
                hits.push(Hit {
                    x: hit.x,
                    y: hit.y,
                    tangent: false,
                });
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapter::{AngleMode, CompiledExpr},
        graph::Color,
        sample::{detect_jumps, sample, sample_polar},
        viewport::Viewport,
    };
    use approx::assert_relative_eq;
    use core::{f64::consts::TAU, num::NonZeroU32, ops::Range};

    fn viewport(x: Range<Number>, y: Range<Number>, width: u32) -> Viewport {
        Viewport::new(x, y, NonZeroU32::new(width).unwrap(), NonZeroU32::new(600).unwrap())
            .unwrap()
    }

    fn curve(id: u32, expression: &str, vp: &Viewport) -> Function {
        let mut f = CompiledExpr::new(expression, AngleMode::Radians).unwrap();
        Function {
            id: FunctionId(id),
            expression: expression.to_string(),
            points: detect_jumps(&sample(&mut f, vp), vp.y_range()),
            color: Color::BLACK,
            enabled: true,
        }
    }

    fn polar(id: u32, expression: &str) -> Function {
        let mut f = CompiledExpr::polar(expression, AngleMode::Radians).unwrap();
        Function {
            id: FunctionId(id),
            expression: expression.to_string(),
            points: sample_polar(&mut f, 0.0..TAU, 720),
            color: Color::BLACK,
            enabled: true,
        }
    }

    #[test]
    fn opposite_diagonals_cross_once_at_origin() {
        for width in [800, 801, 333] {
            let vp = viewport(-10.0..10.0, -10.0..10.0, width);
            let step = vp.x_range() / Number::from(width);
            let found = find_intersections(
                &[curve(0, "x", &vp), curve(1, "-x", &vp)],
                PlotMode::Rectangular,
            );
            assert_eq!(found.len(), 1, "width {width}: {found:?}");
            let hit = found[0];
            assert!(hit.x.abs() <= step);
            assert!(hit.y.abs() <= step);
            assert!(hit.is_approximate);
            assert!(!hit.is_tangent);
            assert_eq!((hit.func1, hit.func2), (FunctionId(0), FunctionId(1)));
        }
    }

    #[test]
    fn parallel_lines_never_meet() {
        let vp = viewport(-7.0..3.0, -5.0..5.0, 640);
        let found = find_intersections(
            &[curve(0, "x + 1", &vp), curve(1, "x + 2", &vp)],
            PlotMode::Rectangular,
        );
        assert!(found.is_empty());
    }

    #[test]
    fn near_touch_is_a_tangent() {
        let vp = viewport(-1.0..1.0, -1.0..1.0, 200);
        let found = find_intersections(
            &[curve(0, "x^2", &vp), curve(1, "-(x^2) - 0.01", &vp)],
            PlotMode::Rectangular,
        );
        assert_eq!(found.len(), 1, "{found:?}");
        assert!(found[0].is_tangent);
        assert_relative_eq!(found[0].x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(found[0].y, -0.005, epsilon = 1e-12);
    }

    #[test]
    fn tangent_settles_on_the_closest_sample() {
        // step 0.02: the touch point 0.013 is nearer the sample at 0.02 than at 0
        let vp = viewport(-5.0..5.0, -5.0..5.0, 500);
        let found = find_intersections(
            &[curve(0, "(x - 0.013)^2", &vp), curve(1, "0", &vp)],
            PlotMode::Rectangular,
        );
        assert_eq!(found.len(), 1, "{found:?}");
        assert!(found[0].is_tangent);
        assert_relative_eq!(found[0].x, 0.02, epsilon = 1e-9);
    }

    #[test]
    fn tangent_next_to_crossing_is_not_duplicated() {
        // |x - 0.3| has its minimum exactly where the lines cross
        let vp = viewport(-1.0..1.0, -1.0..1.0, 300);
        let found = find_intersections(
            &[curve(0, "x - 0.3", &vp), curve(1, "0.3 - x", &vp)],
            PlotMode::Rectangular,
        );
        assert_eq!(found.len(), 1, "{found:?}");
        assert!(!found[0].is_tangent);
    }

    #[test]
    fn crossing_of_a_parabola_and_a_line() {
        let vp = viewport(-3.0..3.0, -3.0..3.0, 600);
        let found = find_intersections(
            &[curve(0, "x^2", &vp), curve(1, "1", &vp)],
            PlotMode::Rectangular,
        );
        let mut xs: Vec<_> = found.iter().map(|i| i.x).collect();
        xs.sort_by(Number::total_cmp);
        assert_eq!(xs.len(), 2);
        assert_relative_eq!(xs[0], -1.0, epsilon = 1e-2);
        assert_relative_eq!(xs[1], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn no_crossing_reported_across_an_asymptote() {
        // 1/x flips sign at the pole, but the curve is not drawn there
        let vp = viewport(-2.0..2.0, -2.0..2.0, 401);
        let found = find_intersections(
            &[curve(0, "1 / x", &vp), curve(1, "0", &vp)],
            PlotMode::Rectangular,
        );
        assert!(found.iter().all(|i| i.x.abs() > 0.5), "{found:?}");
    }

    #[test]
    fn every_pair_is_checked() {
        let vp = viewport(-5.0..5.0, -5.0..5.0, 500);
        let fs = [
            curve(0, "x", &vp),
            curve(1, "-x", &vp),
            curve(2, "x", &vp),
        ];
        let found = find_intersections(&fs, PlotMode::Rectangular);
        let pairs: Vec<_> = found
            .iter()
            .filter(|i| !i.is_tangent)
            .map(|i| (i.func1.0, i.func2.0))
            .collect();
        assert!(pairs.contains(&(0, 1)));
        assert!(pairs.contains(&(1, 2)));
    }

    #[test]
    fn disabled_and_empty_functions_are_skipped() {
        let vp = viewport(-10.0..10.0, -10.0..10.0, 100);
        let mut off = curve(1, "-x", &vp);
        off.enabled = false;
        let mut empty = curve(2, "-x", &vp);
        empty.points.clear();
        assert!(find_intersections(&[curve(0, "x", &vp), off, empty], PlotMode::Rectangular)
            .is_empty());
        assert!(find_intersections(&[], PlotMode::Polar).is_empty());
    }

    #[test]
    fn crossing_diagonal_segments() {
        let hit = segment_intersection([0.0, 0.0], [2.0, 2.0], [0.0, 2.0], [2.0, 0.0]).unwrap();
        assert_relative_eq!(hit.x, 1.0);
        assert_relative_eq!(hit.y, 1.0);
        assert_relative_eq!(hit.t, 0.5);
        assert_relative_eq!(hit.u, 0.5);
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        assert_eq!(
            segment_intersection([0.0, 0.0], [2.0, 0.0], [0.0, 1.0], [2.0, 1.0]),
            None
        );
    }

    #[test]
    fn extensions_do_not_count() {
        assert_eq!(
            segment_intersection([0.0, 0.0], [1.0, 0.0], [2.0, -1.0], [2.0, 1.0]),
            None
        );
    }

    #[test]
    fn polar_circles_meet_twice() {
        // r = 1 and r = 2 cos(t) meet at (1/2, ±√3/2)
        let found = find_intersections(&[polar(0, "1"), polar(1, "2 * cos(t)")], PlotMode::Polar);
        let mut ys: Vec<_> = found.iter().map(|i| i.y).collect();
        ys.sort_by(Number::total_cmp);
        assert_eq!(ys.len(), 2, "{found:?}");
        assert_relative_eq!(ys[0], -(3.0_f64.sqrt()) / 2.0, epsilon = 1e-2);
        assert_relative_eq!(ys[1], 3.0_f64.sqrt() / 2.0, epsilon = 1e-2);
        assert!(found.iter().all(|i| (i.x - 0.5).abs() < 1e-2));
    }

    #[test]
    fn interpolation_respects_gaps() {
        let pts = [
            Point::connected(0.0, 0.0),
            Point::connected(1.0, 2.0),
            Point::gap(2.0),
            Point::connected(3.0, 6.0),
        ];
        assert_relative_eq!(interpolate(&pts, 0.5).unwrap(), 1.0);
        assert_relative_eq!(interpolate(&pts, 1.0).unwrap(), 2.0);
        assert_eq!(interpolate(&pts, 1.5), None);
        assert_eq!(interpolate(&pts, 2.5), None);
        assert_eq!(interpolate(&pts, -1.0), None);
        assert_eq!(interpolate(&pts, 4.0), None);
    }
}
