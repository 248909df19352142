// SPDX: CC0-1.0

use crate::Number;
use core::{fmt, num::NonZeroU32, ops::Range};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ViewportError {
    #[error("x range is empty or inverted")]
    EmptyX,
    #[error("y range is empty or inverted")]
    EmptyY,
    #[error("range bounds must be finite")]
    NonFinite,
}

/// Raw viewport bounds as they appear in config files and messages.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: Number,
    pub max_x: Number,
    pub min_y: Number,
    pub max_y: Number,
    pub width: NonZeroU32,
    pub height: NonZeroU32,
}

/// Position on the drawing surface, in pixels from the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPos {
    pub x: Number,
    pub y: Number,
}

/// The visible rectangle of function space mapped onto a `width × height`
/// pixel surface. Always satisfies `min_x < max_x` and `min_y < max_y`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Bounds", into = "Bounds")]
pub struct Viewport {
    bounds: Bounds,
    scale: Number,
}

impl Viewport {
    pub fn new(
        x: Range<Number>,
        y: Range<Number>,
        width: NonZeroU32,
        height: NonZeroU32,
    ) -> Result<Self, ViewportError> {
        Self::try_from(Bounds {
            min_x: x.start,
            max_x: x.end,
            min_y: y.start,
            max_y: y.end,
            width,
            height,
        })
    }

    #[inline]
    pub const fn min_x(&self) -> Number {
        self.bounds.min_x
    }

    #[inline]
    pub const fn max_x(&self) -> Number {
        self.bounds.max_x
    }

    #[inline]
    pub const fn min_y(&self) -> Number {
        self.bounds.min_y
    }

    #[inline]
    pub const fn max_y(&self) -> Number {
        self.bounds.max_y
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.bounds.width.get()
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.bounds.height.get()
    }

    /// Pixels per function-space unit.
    #[inline]
    pub const fn scale(&self) -> Number {
        self.scale
    }

    #[inline]
    pub fn x_range(&self) -> Number {
        self.max_x() - self.min_x()
    }

    #[inline]
    pub fn y_range(&self) -> Number {
        self.max_y() - self.min_y()
    }

    pub const fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn to_screen(&self, x: Number, y: Number) -> ScreenPos {
        ScreenPos {
            x: (x - self.min_x()) / self.x_range() * Number::from(self.width()),
            y: (self.max_y() - y) / self.y_range() * Number::from(self.height()),
        }
    }

    pub fn to_world(&self, pos: ScreenPos) -> (Number, Number) {
        (
            self.min_x() + pos.x / Number::from(self.width()) * self.x_range(),
            self.max_y() - pos.y / Number::from(self.height()) * self.y_range(),
        )
    }

    /// Same size, different bounds.
    pub fn with_range(&self, x: Range<Number>, y: Range<Number>) -> Result<Self, ViewportError> {
        Self::new(x, y, self.bounds.width, self.bounds.height)
    }

    /// Moves the view by a drag of `dx` × `dy` pixels; dragging right reveals
    /// smaller `x`, dragging down reveals larger `y`.
    pub fn pan(&self, dx: Number, dy: Number) -> Result<Self, ViewportError> {
        let ux = dx / Number::from(self.width()) * self.x_range();
        let uy = dy / Number::from(self.height()) * self.y_range();
        self.with_range(
            self.min_x() - ux..self.max_x() - ux,
            self.min_y() + uy..self.max_y() + uy,
        )
    }

    /// Scales both ranges by `factor` (< 1 zooms in) keeping the world point
    /// under `anchor` fixed on screen.
    pub fn zoom_at(&self, factor: Number, anchor: ScreenPos) -> Result<Self, ViewportError> {
        let (ax, ay) = self.to_world(anchor);
        self.with_range(
            ax - (ax - self.min_x()) * factor..ax + (self.max_x() - ax) * factor,
            ay - (ay - self.min_y()) * factor..ay + (self.max_y() - ay) * factor,
        )
    }

    pub fn center(&self) -> ScreenPos {
        ScreenPos {
            x: Number::from(self.width()) / 2.0,
            y: Number::from(self.height()) / 2.0,
        }
    }
}

impl Default for Viewport {
    /// 20 × 15 units centred on the origin at 800 × 600 pixels.
    fn default() -> Self {
        let bounds = Bounds {
            min_x: -10.0,
            max_x: 10.0,
            min_y: -7.5,
            max_y: 7.5,
            width: NonZeroU32::new(800).unwrap_or(NonZeroU32::MIN),
            height: NonZeroU32::new(600).unwrap_or(NonZeroU32::MIN),
        };
        Self { bounds, scale: 40.0 }
    }
}

impl TryFrom<Bounds> for Viewport {
    type Error = ViewportError;

    fn try_from(bounds: Bounds) -> Result<Self, Self::Error> {
        let Bounds {
            min_x,
            max_x,
            min_y,
            max_y,
            width,
            height,
        } = bounds;
        if ![min_x, max_x, min_y, max_y].iter().all(|v| v.is_finite()) {
            return Err(ViewportError::NonFinite);
        }
        if min_x >= max_x {
            return Err(ViewportError::EmptyX);
        }
        if min_y >= max_y {
            return Err(ViewportError::EmptyY);
        }
        let scale = (Number::from(width.get()) / (max_x - min_x))
            .min(Number::from(height.get()) / (max_y - min_y));
        Ok(Self { bounds, scale })
    }
}

impl From<Viewport> for Bounds {
    fn from(viewport: Viewport) -> Self {
        viewport.bounds
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewport")
            .field("x range", &(self.min_x()..self.max_x()))
            .field("y range", &(self.min_y()..self.max_y()))
            .field("size", &format_args!("{}x{}", self.width(), self.height()))
            .finish()
    }
}
