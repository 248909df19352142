// SPDX: CC0-1.0

//! Expression → points → intersections, shared by the interactive path in
//! [`crate::graph`] and the background path in [`crate::worker`].

use crate::{
    adapter::{AngleMode, CompiledExpr, Evaluator, Failure},
    graph::{Color, Function, FunctionId},
    intersect::{self, Intersection},
    sample, Number, PlotMode, Point,
    viewport::Viewport,
};
use core::f64::consts::TAU;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    pub angle_mode: AngleMode,
    /// Full turns of θ traced by polar curves.
    pub polar_turns: Number,
    /// θ steps per polar curve.
    pub polar_steps: u32,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            angle_mode: AngleMode::Radians,
            polar_turns: 1.0,
            polar_steps: 1000,
        }
    }
}

/// Samples `expression` for display in `viewport`.
///
/// `resolution` overrides the number of steps: the viewport's pixel width
/// in rectangular mode, [`SamplingSettings::polar_steps`] in polar mode.
/// Blank or uncompilable expressions produce no points.
pub fn sample_function(
    expression: &str,
    viewport: &Viewport,
    mode: PlotMode,
    settings: &SamplingSettings,
    resolution: Option<u32>,
) -> Vec<Point> {
    if expression.trim().is_empty() {
        return Vec::new();
    }

    match mode {
        PlotMode::Rectangular => {
            let mut f = match CompiledExpr::new(expression, settings.angle_mode) {
                Ok(f) => f,
                Err(err) => {
                    debug!("not sampling '{expression}': {err}");
                    return Vec::new();
                }
            };
            let steps = resolution.unwrap_or(viewport.width());
            let points = sample::sample_range(&mut f, viewport.min_x()..viewport.max_x(), steps);
            sample::detect_jumps(&points, viewport.y_range())
        }

        PlotMode::Polar => {
            let mut f = match CompiledExpr::polar(expression, settings.angle_mode) {
                Ok(f) => f,
                Err(err) => {
                    debug!("not sampling '{expression}': {err}");
                    return Vec::new();
                }
            };
            let degrees = settings.angle_mode == AngleMode::Degrees;
            // θ is traced in radians; the expression sees it in its own unit
            let mut r = |theta: Number| -> Result<Number, Failure> {
                f.evaluate(if degrees { theta.to_degrees() } else { theta })
            };
            let steps = resolution.unwrap_or(settings.polar_steps);
            sample::sample_polar(&mut r, 0.0..settings.polar_turns * TAU, steps)
        }
    }
}

/// A function as the background path receives it: source only, points are
/// resampled on the other side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub id: FunctionId,
    pub expression: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

impl From<&Function> for FunctionSpec {
    fn from(f: &Function) -> Self {
        Self {
            id: f.id,
            expression: f.expression.clone(),
            enabled: f.enabled,
        }
    }
}

/// Everything needed to compute intersections, owned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub functions: Vec<FunctionSpec>,
    pub viewport: Viewport,
    #[serde(default)]
    pub plot_mode: PlotMode,
    #[serde(default)]
    pub settings: SamplingSettings,
    /// Sampling steps per function; `None` keeps the interactive
    /// resolution.
    #[serde(default)]
    pub max_resolution: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub intersections: Vec<Intersection>,
    pub calculation_time: Duration,
    pub function_count: usize,
}

/// Upper bound on sampling steps per function in a [`Job`]. Each step
/// holds one [`Point`], so this keeps a job's memory bounded whatever the
/// requester asks for.
pub const MAX_RESOLUTION: u32 = 100_000;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("max resolution must be at least 1")]
    ZeroResolution,
    #[error("resolution of {requested} samples exceeds the limit of {max}")]
    ResolutionTooLarge { requested: u32, max: u32 },
}

impl Job {
    /// Sampling steps each function of this job would take.
    pub fn resolution(&self) -> u32 {
        self.max_resolution.unwrap_or(match self.plot_mode {
            PlotMode::Rectangular => self.viewport.width(),
            PlotMode::Polar => self.settings.polar_steps,
        })
    }

    fn check(&self) -> Result<(), JobError> {
        match self.resolution() {
            0 => Err(JobError::ZeroResolution),
            requested if requested > MAX_RESOLUTION => Err(JobError::ResolutionTooLarge {
                requested,
                max: MAX_RESOLUTION,
            }),
            _ => Ok(()),
        }
    }
}

/// Resamples every enabled function of `job` and intersects them.
pub fn run(job: &Job) -> Result<Outcome, JobError> {
    job.check()?;

    let start = Instant::now();
    let functions: Vec<Function> = job
        .functions
        .iter()
        .filter(|spec| spec.enabled && !spec.expression.trim().is_empty())
        .map(|spec| Function {
            id: spec.id,
            expression: spec.expression.clone(),
            points: sample_function(
                &spec.expression,
                &job.viewport,
                job.plot_mode,
                &job.settings,
                job.max_resolution,
            ),
            color: Color::BLACK,
            enabled: true,
        })
        .collect();

    let intersections = intersect::find_intersections(&functions, job.plot_mode);
    let outcome = Outcome {
        intersections,
        calculation_time: start.elapsed(),
        function_count: functions.len(),
    };
    debug!(
        "job over {} functions took {:?}",
        outcome.function_count, outcome.calculation_time
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core::num::NonZeroU32;

    fn viewport() -> Viewport {
        Viewport::new(
            -10.0..10.0,
            -10.0..10.0,
            NonZeroU32::new(400).unwrap(),
            NonZeroU32::new(400).unwrap(),
        )
        .unwrap()
    }

    fn spec(id: u32, expression: &str) -> FunctionSpec {
        FunctionSpec {
            id: FunctionId(id),
            expression: expression.to_string(),
            enabled: true,
        }
    }

    #[test]
    fn blank_and_broken_expressions_have_no_points() {
        let settings = SamplingSettings::default();
        for src in ["", "   ", "(x", "x $ 2"] {
            assert!(
                sample_function(src, &viewport(), PlotMode::Rectangular, &settings, None)
                    .is_empty(),
                "{src:?}"
            );
        }
    }

    #[test]
    fn resolution_overrides_pixel_width() {
        let settings = SamplingSettings::default();
        let vp = viewport();
        let coarse = sample_function("x", &vp, PlotMode::Rectangular, &settings, None);
        let fine = sample_function("x", &vp, PlotMode::Rectangular, &settings, Some(2000));
        assert_eq!(coarse.len(), 401);
        assert_eq!(fine.len(), 2001);
    }

    #[test]
    fn polar_parameter_follows_angle_mode() {
        let vp = viewport();
        let settings = SamplingSettings {
            angle_mode: AngleMode::Degrees,
            polar_turns: 1.0,
            polar_steps: 4,
        };
        // r = t in degrees: a quarter turn lands at radius 90 on the y axis
        let pts = sample_function("t", &vp, PlotMode::Polar, &settings, None);
        assert_eq!(pts.len(), 5);
        assert_relative_eq!(pts[1].x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pts[1].y, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn run_counts_only_enabled_functions() {
        let mut off = spec(2, "x^2");
        off.enabled = false;
        let job = Job {
            functions: vec![spec(0, "x"), spec(1, "-x"), off, spec(3, " ")],
            viewport: viewport(),
            plot_mode: PlotMode::Rectangular,
            settings: SamplingSettings::default(),
            max_resolution: Some(1000),
        };
        let outcome = run(&job).unwrap();
        assert_eq!(outcome.function_count, 2);
        assert_eq!(outcome.intersections.len(), 1);
        assert_relative_eq!(outcome.intersections[0].x, 0.0, epsilon = 0.02);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let job = Job {
            functions: vec![spec(0, "x")],
            viewport: viewport(),
            plot_mode: PlotMode::Rectangular,
            settings: SamplingSettings::default(),
            max_resolution: Some(0),
        };
        assert_eq!(run(&job), Err(JobError::ZeroResolution));
    }

    #[test]
    fn oversized_resolution_is_rejected() {
        let mut job = Job {
            functions: vec![spec(0, "x")],
            viewport: viewport(),
            plot_mode: PlotMode::Rectangular,
            settings: SamplingSettings::default(),
            max_resolution: Some(4_000_000_000),
        };
        assert_eq!(
            run(&job),
            Err(JobError::ResolutionTooLarge {
                requested: 4_000_000_000,
                max: MAX_RESOLUTION,
            })
        );
        job.max_resolution = Some(MAX_RESOLUTION);
        assert!(run(&job).is_ok());

        // without an override the polar step count is what gets checked
        job.max_resolution = None;
        job.plot_mode = PlotMode::Polar;
        job.settings.polar_steps = MAX_RESOLUTION + 1;
        assert!(matches!(run(&job), Err(JobError::ResolutionTooLarge { .. })));

        job.plot_mode = PlotMode::Rectangular;
        job.viewport = Viewport::new(
            -1.0..1.0,
            -1.0..1.0,
            NonZeroU32::new(MAX_RESOLUTION + 1).unwrap(),
            NonZeroU32::new(10).unwrap(),
        )
        .unwrap();
        assert!(matches!(run(&job), Err(JobError::ResolutionTooLarge { .. })));
    }
}
