// SPDX: CC0-1.0

pub mod adapter;
pub mod config;
pub mod eval;
pub mod graph;
pub mod grid;
pub mod intersect;
pub mod lex;
pub mod parse;
pub mod pipeline;
pub mod render;
pub mod sample;
pub mod schedule;
pub mod session;
pub mod shell;
pub mod stdlib;
pub mod viewport;
pub mod worker;

use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};

pub type Number = f64;

/// One sample of a curve in function space.
///
/// `connected == false` means the renderer must not stroke a line from the
/// previous point to this one. On evaluation failures `y` is NaN.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: Number,
    pub y: Number,
    pub connected: bool,
}

impl Point {
    #[inline]
    pub const fn connected(x: Number, y: Number) -> Self {
        Self {
            x,
            y,
            connected: true,
        }
    }

    #[inline]
    pub const fn gap(x: Number) -> Self {
        Self {
            x,
            y: Number::NAN,
            connected: false,
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotMode {
    /// One `y` per `x`, sampled along the horizontal axis.
    #[default]
    Rectangular,
    /// `r(t)` traced over a parameter range; may revisit the same `x`.
    Polar,
}

impl fmt::Display for PlotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rectangular => "rectangular",
            Self::Polar => "polar",
        })
    }
}

impl FromStr for PlotMode {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rectangular" | "rect" | "cartesian" => Ok(Self::Rectangular),
            "polar" | "parametric" => Ok(Self::Polar),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized option '{0}'")]
pub struct UnknownVariant(pub String);
