// SPDX: CC0-1.0

//! Turning sampled functions into strokes, gnuplot data and SVG.

use crate::{
    graph::Function,
    grid,
    intersect::Intersection,
    viewport::{ScreenPos, Viewport},
    Number, Point,
};
use std::io::{self, Write};

/// Points further than this many viewport sizes outside the surface are not
/// stroked to.
pub const RENDER_MARGIN: Number = 1.0;

/// Radius of the dot drawn at each intersection, in pixels.
pub const INTERSECTION_RADIUS: Number = 4.0;

/// A surface that can draw polylines.
pub trait Canvas {
    /// Starts a new subpath at `pos`.
    fn move_to(&mut self, pos: ScreenPos);
    /// Extends the current subpath to `pos`.
    fn line_to(&mut self, pos: ScreenPos);
}

fn within_margin(viewport: &Viewport, pos: ScreenPos) -> bool {
    let w = Number::from(viewport.width());
    let h = Number::from(viewport.height());
    (-w * RENDER_MARGIN..=w * (1.0 + RENDER_MARGIN)).contains(&pos.x)
        && (-h * RENDER_MARGIN..=h * (1.0 + RENDER_MARGIN)).contains(&pos.y)
}

/// Strokes `points` onto `canvas`, never joining across a break.
///
/// A new subpath starts at every point that is not connected, and after
/// every point that is non-finite or far outside the viewport.
pub fn stroke<C: Canvas + ?Sized>(points: &[Point], viewport: &Viewport, canvas: &mut C) {
    let mut pen_down = false;
    for p in points {
        if !p.is_finite() {
            pen_down = false;
            continue;
        }
        let pos = viewport.to_screen(p.x, p.y);
        if !within_margin(viewport, pos) {
            pen_down = false;
            continue;
        }
        if pen_down && p.connected {
            canvas.line_to(pos);
        } else {
            canvas.move_to(pos);
        }
        pen_down = true;
    }
}

/// Canvas that records an SVG path `d` attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SvgPath {
    d: String,
}

impl SvgPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.d.is_empty()
    }

    pub fn finish(self) -> String {
        self.d
    }

    fn push(&mut self, cmd: char, pos: ScreenPos) {
        if !self.d.is_empty() {
            self.d.push(' ');
        }
        self.d.push_str(&format!("{cmd}{:.2},{:.2}", pos.x, pos.y));
    }
}

impl Canvas for SvgPath {
    fn move_to(&mut self, pos: ScreenPos) {
        self.push('M', pos);
    }

    fn line_to(&mut self, pos: ScreenPos) {
        self.push('L', pos);
    }
}

/// Writes `points` as gnuplot data, `x y` per line, with a blank line
/// wherever the curve breaks.
pub fn write_gnuplot_data<W: Write>(mut out: W, points: &[Point]) -> io::Result<()> {
    let mut in_run = false;
    for p in points {
        if in_run && !(p.connected && p.is_finite()) {
            writeln!(out)?;
            in_run = false;
        }
        if p.is_finite() {
            writeln!(out, "{} {}", p.x, p.y)?;
            in_run = true;
        }
    }
    Ok(())
}

/// Writes intersections as gnuplot data, one `x y` point per line.
pub fn write_gnuplot_points<W: Write>(mut out: W, intersections: &[Intersection]) -> io::Result<()> {
    for i in intersections {
        writeln!(out, "{} {}", i.x, i.y)?;
    }
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Writes a standalone SVG of every enabled function with grid, axes and
/// intersections.
pub fn write_svg<W: Write>(
    mut out: W,
    functions: &[Function],
    intersections: &[Intersection],
    viewport: &Viewport,
) -> io::Result<()> {
    let (w, h) = (viewport.width(), viewport.height());
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    )?;
    writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#)?;

    // grid
    let x_step = grid::tick_step(&(viewport.min_x()..viewport.max_x()), grid::TARGET_TICKS);
    let y_step = grid::tick_step(&(viewport.min_y()..viewport.max_y()), grid::TARGET_TICKS);
    let origin = viewport.to_screen(0.0, 0.0);
    let label_y = origin.y.clamp(12.0, Number::from(h) - 4.0);
    let label_x = origin.x.clamp(4.0, Number::from(w) - 40.0);
    writeln!(out, r##"<g stroke="#e0e0e0" stroke-width="1">"##)?;
    for x in grid::ticks(viewport.min_x()..viewport.max_x(), grid::TARGET_TICKS) {
        let sx = viewport.to_screen(x, 0.0).x;
        writeln!(out, r#"<line x1="{sx:.2}" y1="0" x2="{sx:.2}" y2="{h}"/>"#)?;
    }
    for y in grid::ticks(viewport.min_y()..viewport.max_y(), grid::TARGET_TICKS) {
        let sy = viewport.to_screen(0.0, y).y;
        writeln!(out, r#"<line x1="0" y1="{sy:.2}" x2="{w}" y2="{sy:.2}"/>"#)?;
    }
    writeln!(out, "</g>")?;

    // axes
    writeln!(out, r##"<g stroke="#404040" stroke-width="1.5">"##)?;
    if (viewport.min_x()..=viewport.max_x()).contains(&0.0) {
        writeln!(
            out,
            r#"<line x1="{x:.2}" y1="0" x2="{x:.2}" y2="{h}"/>"#,
            x = origin.x
        )?;
    }
    if (viewport.min_y()..=viewport.max_y()).contains(&0.0) {
        writeln!(
            out,
            r#"<line x1="0" y1="{y:.2}" x2="{w}" y2="{y:.2}"/>"#,
            y = origin.y
        )?;
    }
    writeln!(out, "</g>")?;

    writeln!(
        out,
        r##"<g font-family="sans-serif" font-size="10" fill="#404040">"##
    )?;
    for x in grid::ticks(viewport.min_x()..viewport.max_x(), grid::TARGET_TICKS) {
        if x == 0.0 {
            continue;
        }
        let sx = viewport.to_screen(x, 0.0).x;
        writeln!(
            out,
            r#"<text x="{:.2}" y="{:.2}">{}</text>"#,
            sx + 2.0,
            label_y - 2.0,
            grid::format_tick(x, x_step)
        )?;
    }
    for y in grid::ticks(viewport.min_y()..viewport.max_y(), grid::TARGET_TICKS) {
        if y == 0.0 {
            continue;
        }
        let sy = viewport.to_screen(0.0, y).y;
        writeln!(
            out,
            r#"<text x="{:.2}" y="{:.2}">{}</text>"#,
            label_x + 2.0,
            sy - 2.0,
            grid::format_tick(y, y_step)
        )?;
    }
    writeln!(out, "</g>")?;

    // curves
    for f in functions.iter().filter(|f| f.enabled) {
        let mut path = SvgPath::new();
        stroke(&f.points, viewport, &mut path);
        if path.is_empty() {
            continue;
        }
        writeln!(
            out,
            r#"<path fill="none" stroke="{color}" stroke-width="2" d="{d}"><title>{id}: {expr}</title></path>"#,
            color = f.color,
            d = path.finish(),
            id = f.id,
            expr = escape(&f.expression),
        )?;
    }

    for i in intersections {
        let pos = viewport.to_screen(i.x, i.y);
        if !within_margin(viewport, pos) {
            continue;
        }
        writeln!(
            out,
            r#"<circle cx="{:.2}" cy="{:.2}" r="{INTERSECTION_RADIUS}" fill="{}" stroke="black"/>"#,
            pos.x,
            pos.y,
            if i.is_tangent { "white" } else { "black" },
        )?;
    }

    writeln!(out, "</svg>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Color, FunctionId};
    use core::num::NonZeroU32;
    use pretty_assertions::assert_eq;

    fn viewport() -> Viewport {
        Viewport::new(
            0.0..10.0,
            0.0..10.0,
            NonZeroU32::new(100).unwrap(),
            NonZeroU32::new(100).unwrap(),
        )
        .unwrap()
    }

    #[derive(Default)]
    struct Recorder(Vec<(char, Number, Number)>);

    impl Canvas for Recorder {
        fn move_to(&mut self, pos: ScreenPos) {
            self.0.push(('M', pos.x, pos.y));
        }

        fn line_to(&mut self, pos: ScreenPos) {
            self.0.push(('L', pos.x, pos.y));
        }
    }

    #[test]
    fn breaks_start_new_subpaths() {
        let pts = [
            Point::connected(0.0, 0.0),
            Point::connected(1.0, 1.0),
            Point::gap(2.0),
            Point::connected(3.0, 3.0),
            Point::connected(4.0, 4.0),
            Point {
                connected: false,
                ..Point::connected(5.0, 5.0)
            },
            Point::connected(6.0, 6.0),
        ];
        let mut rec = Recorder::default();
        stroke(&pts, &viewport(), &mut rec);
        let cmds: String = rec.0.iter().map(|c| c.0).collect();
        assert_eq!(cmds, "MLMLML");
        assert_eq!(rec.0[2], ('M', 30.0, 70.0));
    }

    #[test]
    fn far_points_are_not_joined() {
        let pts = [
            Point::connected(1.0, 1.0),
            Point::connected(2.0, 1e6),
            Point::connected(3.0, 1.0),
        ];
        let mut rec = Recorder::default();
        stroke(&pts, &viewport(), &mut rec);
        let cmds: String = rec.0.iter().map(|c| c.0).collect();
        assert_eq!(cmds, "MM");

        // just outside the surface is still inside the margin
        let pts = [Point::connected(1.0, 1.0), Point::connected(2.0, 15.0)];
        let mut rec = Recorder::default();
        stroke(&pts, &viewport(), &mut rec);
        assert_eq!(rec.0.len(), 2);
        assert_eq!(rec.0[1].0, 'L');
    }

    #[test]
    fn svg_path_data() {
        let mut path = SvgPath::new();
        stroke(
            &[Point::connected(0.0, 10.0), Point::connected(5.0, 5.0)],
            &viewport(),
            &mut path,
        );
        assert_eq!(path.finish(), "M0.00,0.00 L50.00,50.00");
    }

    #[test]
    fn gnuplot_data_separates_runs() {
        let pts = [
            Point::connected(0.0, 1.0),
            Point::gap(1.0),
            Point::gap(2.0),
            Point::connected(3.0, 4.0),
            Point {
                connected: false,
                ..Point::connected(4.0, 5.0)
            },
        ];
        let mut buf = Vec::new();
        write_gnuplot_data(&mut buf, &pts).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "0 1\n\n3 4\n\n4 5\n");
    }

    #[test]
    fn svg_document_has_curves_and_dots() {
        let f = Function {
            id: FunctionId(0),
            expression: "x < 1".to_string(),
            points: vec![Point::connected(1.0, 1.0), Point::connected(9.0, 9.0)],
            color: Color::PALETTE[0],
            enabled: true,
        };
        let mut hidden = f.clone();
        hidden.enabled = false;
        let hit = Intersection {
            x: 5.0,
            y: 5.0,
            func1: FunctionId(0),
            func2: FunctionId(1),
            is_approximate: true,
            is_tangent: false,
        };
        let mut buf = Vec::new();
        write_svg(&mut buf, &[f, hidden], &[hit], &viewport()).unwrap();
        let svg = String::from_utf8(buf).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<path").count(), 1);
        assert_eq!(svg.matches("<circle").count(), 1);
        assert!(svg.contains("#4285f4"));
        assert!(svg.contains("x &lt; 1"));
    }
}
