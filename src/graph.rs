// SPDX: CC0-1.0

//! Plot state: the functions being drawn, where they are drawn, and the
//! points and intersections derived from them.
//!
//! Presentation code reads `&[Function]` and [`Intersection`]s; only
//! [`Graph`] writes them.

use crate::{
    adapter::{AngleMode, CompiledExpr, Evaluator, Failure},
    eval::EvalErr,
    intersect::{self, Intersection},
    parse::ParseErr,
    pipeline::{self, FunctionSpec, Job, SamplingSettings},
    viewport::Viewport,
    Number, PlotMode, Point,
};
use core::{fmt, num::ParseIntError, str::FromStr};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

impl FromStr for FunctionId {
    type Err = ParseIntError;

    /// Accepts `f3` as well as `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        s.strip_prefix('f').unwrap_or(s).parse().map(Self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    pub const PALETTE: [Self; 8] = [
        Self::rgb(66, 133, 244), // blue
        Self::rgb(234, 67, 53),  // red
        Self::rgb(52, 168, 83),  // green
        Self::rgb(103, 58, 183), // purple
        Self::rgb(255, 87, 34),  // orange
        Self::rgb(0, 150, 136),  // teal
        Self::rgb(251, 188, 4),  // yellow
        Self::rgb(121, 85, 72),  // brown
    ];

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Palette entry for the `n`th function added, cycling.
    pub const fn nth(n: u32) -> Self {
        Self::PALETTE[n as usize % Self::PALETTE.len()]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub id: FunctionId,
    pub expression: String,
    pub points: Vec<Point>,
    pub color: Color,
    pub enabled: bool,
}

#[derive(Clone, Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Parse(#[from] ParseErr),
    #[error(transparent)]
    Eval(#[from] EvalErr),
}

#[derive(Clone, Debug, Error)]
pub enum GraphError {
    #[error("no function with id {0}")]
    UnknownFunction(FunctionId),
    #[error("expression of {id} is invalid")]
    Validation {
        id: FunctionId,
        #[source]
        source: ValidationError,
    },
}

/// Input used to probe an expression for errors that do not depend on the
/// input value.
const PROBE: Number = 1.0;

/// Checks that `expression` compiles and evaluates.
///
/// Blank expressions are valid (they just draw nothing), and so are
/// expressions that are non-finite at the probe: domain gaps are normal.
pub fn validate(expression: &str, angle_mode: AngleMode, mode: PlotMode) -> Result<(), ValidationError> {
    if expression.trim().is_empty() {
        return Ok(());
    }
    let mut compiled = match mode {
        PlotMode::Rectangular => CompiledExpr::new(expression, angle_mode)?,
        PlotMode::Polar => CompiledExpr::polar(expression, angle_mode)?,
    };
    match compiled.evaluate(PROBE) {
        Ok(_) | Err(Failure::NonFinite(_)) => Ok(()),
        Err(Failure::Parse(err)) => Err(err.into()),
        Err(Failure::Eval(err)) => Err(err.into()),
    }
}

#[derive(Clone, Debug)]
pub struct Graph {
    functions: Vec<Function>,
    viewport: Viewport,
    mode: PlotMode,
    settings: SamplingSettings,
    next_id: u32,
    intersections: Vec<Intersection>,
}

impl Graph {
    pub fn new(viewport: Viewport, mode: PlotMode, settings: SamplingSettings) -> Self {
        Self {
            functions: Vec::new(),
            viewport,
            mode,
            settings,
            next_id: 0,
            intersections: Vec::new(),
        }
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }

    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub const fn mode(&self) -> PlotMode {
        self.mode
    }

    pub const fn settings(&self) -> &SamplingSettings {
        &self.settings
    }

    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    /// Adds an enabled function with an empty expression.
    pub fn add(&mut self) -> FunctionId {
        let id = FunctionId(self.next_id);
        self.next_id += 1;
        self.functions.push(Function {
            id,
            expression: String::new(),
            points: Vec::new(),
            color: Color::nth(id.0),
            enabled: true,
        });
        id
    }

    pub fn remove(&mut self, id: FunctionId) -> Result<Function, GraphError> {
        let idx = self.index_of(id)?;
        let removed = self.functions.remove(idx);
        self.refresh_intersections();
        Ok(removed)
    }

    /// Replaces the expression of `id` and resamples it.
    ///
    /// An invalid expression is still stored, but its points are cleared.
    pub fn set_expression(&mut self, id: FunctionId, expression: &str) -> Result<(), GraphError> {
        let idx = self.index_of(id)?;
        self.functions[idx].expression = expression.to_string();

        let result = validate(expression, self.settings.angle_mode, self.mode);
        match &result {
            Ok(()) => self.resample(idx),
            Err(err) => {
                debug!("{id} = '{expression}' rejected: {err}");
                self.functions[idx].points.clear();
            }
        }
        self.refresh_intersections();
        result.map_err(|source| GraphError::Validation { id, source })
    }

    pub fn set_enabled(&mut self, id: FunctionId, enabled: bool) -> Result<(), GraphError> {
        let idx = self.index_of(id)?;
        self.functions[idx].enabled = enabled;
        self.resample(idx);
        self.refresh_intersections();
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.resample_all();
    }

    /// Switches plot mode. Expressions are checked again since the bound
    /// variables differ between modes; the rejected ones are returned.
    pub fn set_mode(&mut self, mode: PlotMode) -> Vec<GraphError> {
        self.mode = mode;
        self.revalidate_all()
    }

    pub fn set_angle_mode(&mut self, angle_mode: AngleMode) -> Vec<GraphError> {
        self.settings.angle_mode = angle_mode;
        self.revalidate_all()
    }

    pub fn set_settings(&mut self, settings: SamplingSettings) -> Vec<GraphError> {
        self.settings = settings;
        self.revalidate_all()
    }

    /// An owned copy of everything needed to compute intersections off this
    /// thread.
    pub fn job(&self, max_resolution: Option<u32>) -> Job {
        Job {
            functions: self.functions.iter().map(FunctionSpec::from).collect(),
            viewport: self.viewport,
            plot_mode: self.mode,
            settings: self.settings,
            max_resolution,
        }
    }

    fn index_of(&self, id: FunctionId) -> Result<usize, GraphError> {
        self.functions
            .iter()
            .position(|f| f.id == id)
            .ok_or(GraphError::UnknownFunction(id))
    }

    fn resample(&mut self, idx: usize) {
        let f = &mut self.functions[idx];
        f.points = if f.enabled {
            pipeline::sample_function(&f.expression, &self.viewport, self.mode, &self.settings, None)
        } else {
            Vec::new()
        };
    }

    fn resample_all(&mut self) {
        for idx in 0..self.functions.len() {
            self.resample(idx);
        }
        self.refresh_intersections();
    }

    fn revalidate_all(&mut self) -> Vec<GraphError> {
        let mut errors = Vec::new();
        for idx in 0..self.functions.len() {
            let f = &self.functions[idx];
            match validate(&f.expression, self.settings.angle_mode, self.mode) {
                Ok(()) => self.resample(idx),
                Err(source) => {
                    let id = f.id;
                    debug!("{id} = '{}' rejected: {source}", f.expression);
                    self.functions[idx].points.clear();
                    errors.push(GraphError::Validation { id, source });
                }
            }
        }
        self.refresh_intersections();
        errors
    }

    fn refresh_intersections(&mut self) {
        self.intersections = intersect::find_intersections(&self.functions, self.mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EvalErrTyp;
    use core::num::NonZeroU32;
    use pretty_assertions::assert_eq;

    fn graph() -> Graph {
        let vp = Viewport::new(
            -10.0..10.0,
            -10.0..10.0,
            NonZeroU32::new(400).unwrap(),
            NonZeroU32::new(400).unwrap(),
        )
        .unwrap();
        Graph::new(vp, PlotMode::Rectangular, SamplingSettings::default())
    }

    #[test]
    fn ids_and_colours_are_assigned_in_order() {
        let mut g = graph();
        let ids: Vec<_> = (0..10).map(|_| g.add()).collect();
        assert_eq!(ids[3], FunctionId(3));
        assert_eq!(g.function(ids[0]).unwrap().color, Color::PALETTE[0]);
        assert_eq!(g.function(ids[9]).unwrap().color, Color::PALETTE[1]);
        assert_eq!(Color::PALETTE[0].to_string(), "#4285f4");
    }

    #[test]
    fn ids_parse_with_or_without_prefix() {
        assert_eq!("f3".parse(), Ok(FunctionId(3)));
        assert_eq!(" 12 ".parse(), Ok(FunctionId(12)));
        assert!("g1".parse::<FunctionId>().is_err());
        assert_eq!(FunctionId(7).to_string(), "f7");
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut g = graph();
        let a = g.add();
        g.remove(a).unwrap();
        assert_ne!(g.add(), a);
        assert!(matches!(g.remove(a), Err(GraphError::UnknownFunction(id)) if id == a));
    }

    #[test]
    fn valid_expression_is_sampled() {
        let mut g = graph();
        let id = g.add();
        g.set_expression(id, "x^2").unwrap();
        assert_eq!(g.function(id).unwrap().points.len(), 401);
    }

    #[test]
    fn invalid_expression_clears_points() {
        let mut g = graph();
        let id = g.add();
        g.set_expression(id, "x").unwrap();
        let err = g.set_expression(id, "sin(").unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation {
                source: ValidationError::Parse(_),
                ..
            }
        ));
        let f = g.function(id).unwrap();
        assert_eq!(f.expression, "sin(");
        assert!(f.points.is_empty());
    }

    #[test]
    fn unknown_names_fail_validation() {
        let err = validate("foo(x)", AngleMode::Radians, PlotMode::Rectangular).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Eval(EvalErr {
                typ: EvalErrTyp::UndefinedIdent { .. },
                ..
            })
        ));
        // x means nothing in polar mode
        assert!(validate("x", AngleMode::Radians, PlotMode::Polar).is_err());
        assert!(validate("theta", AngleMode::Radians, PlotMode::Polar).is_ok());
    }

    #[test]
    fn domain_gaps_are_not_validation_errors() {
        for src in ["1 / (x - 1)", "sqrt(-x)", "ln(0 * x)", "", "  "] {
            assert!(
                validate(src, AngleMode::Radians, PlotMode::Rectangular).is_ok(),
                "{src:?}"
            );
        }
    }

    #[test]
    fn intersections_follow_edits() {
        let mut g = graph();
        let a = g.add();
        let b = g.add();
        g.set_expression(a, "x").unwrap();
        assert!(g.intersections().is_empty());
        g.set_expression(b, "-x").unwrap();
        assert_eq!(g.intersections().len(), 1);

        g.set_enabled(b, false).unwrap();
        assert!(g.intersections().is_empty());
        assert!(g.function(b).unwrap().points.is_empty());

        g.set_enabled(b, true).unwrap();
        assert_eq!(g.intersections().len(), 1);
        g.remove(a).unwrap();
        assert!(g.intersections().is_empty());
    }

    #[test]
    fn viewport_change_resamples() {
        let mut g = graph();
        let id = g.add();
        g.set_expression(id, "x").unwrap();
        let vp = Viewport::new(
            0.0..1.0,
            0.0..1.0,
            NonZeroU32::new(50).unwrap(),
            NonZeroU32::new(50).unwrap(),
        )
        .unwrap();
        g.set_viewport(vp);
        let pts = &g.function(id).unwrap().points;
        assert_eq!(pts.len(), 51);
        assert_eq!(pts[0].x, 0.0);
    }

    #[test]
    fn mode_switch_reports_expressions_it_invalidates() {
        let mut g = graph();
        let a = g.add();
        let b = g.add();
        g.set_expression(a, "x").unwrap();
        g.set_expression(b, "1").unwrap();

        let errors = g.set_mode(PlotMode::Polar);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], GraphError::Validation { id, .. } if id == a));
        assert!(g.function(a).unwrap().points.is_empty());
        assert!(!g.function(b).unwrap().points.is_empty());

        assert!(g.set_mode(PlotMode::Rectangular).is_empty());
        assert_eq!(g.function(a).unwrap().points.len(), 401);
        assert!(g.set_angle_mode(AngleMode::Degrees).is_empty());
    }

    #[test]
    fn job_carries_every_function() {
        let mut g = graph();
        let a = g.add();
        g.set_expression(a, "x").unwrap();
        let b = g.add();
        g.set_enabled(b, false).unwrap();
        let job = g.job(Some(2000));
        assert_eq!(job.functions.len(), 2);
        assert_eq!(job.functions[0].expression, "x");
        assert!(!job.functions[1].enabled);
        assert_eq!(job.max_resolution, Some(2000));
    }
}
