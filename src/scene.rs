//! The display list a render produces.
//!
//! A [`Scene`] is an ordered list of filled paths and placed images on a `width x height`
//! surface. It carries everything the exporters in [`crate::helper`] need and nothing about how
//! it was derived from the options.

use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use image::RgbaImage;

use crate::color::{Color, ColorStop, Gradient, GradientType};
use crate::path::{FillRule, Path, Point};

/// A paint with its geometry fixed in canvas coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum Paint {
    Solid(Color),
    LinearGradient {
        start: Point,
        end: Point,
        stops: Vec<ColorStop>,
    },
    RadialGradient {
        center: Point,
        radius: f64,
        stops: Vec<ColorStop>,
    },
}

impl Paint {
    /// Picks the paint for one layer: a gradient wins over a flat color.
    ///
    /// `(x, y, size)` is the square box the gradient spans and `rotation` is added to the
    /// gradient's own rotation.
    pub fn select(
        color: Option<Color>,
        gradient: Option<&Gradient>,
        x: f64,
        y: f64,
        size: f64,
        rotation: f64,
    ) -> Option<Paint> {
        match (gradient, color) {
            (Some(gradient), _) => Some(Paint::gradient(gradient, x, y, size, rotation)),
            (None, Some(color)) => Some(Paint::Solid(color)),
            (None, None) => None,
        }
    }

    /// Lays out `gradient` over the square box at `(x, y)` with side `size`.
    ///
    /// Radial gradients run from the box center to its inscribed circle. Linear gradients pass
    /// through the center along the total rotation, with both ends on the box edges picked by
    /// the rotation's quadrant and snapped to whole pixels.
    pub fn gradient(gradient: &Gradient, x: f64, y: f64, size: f64, rotation: f64) -> Paint {
        let half = size / 2.0;
        let center = Point::new(x + half, y + half);
        let stops = gradient.color_stops.clone();
        match gradient.kind {
            GradientType::Radial => Paint::RadialGradient {
                center,
                radius: half,
                stops,
            },
            GradientType::Linear => {
                let rotation = (gradient.rotation.unwrap_or(0.0) + rotation) % TAU;
                let (dx, dy) = linear_offset(rotation, half);
                Paint::LinearGradient {
                    start: Point::new(round_half_up(center.x - dx), round_half_up(center.y - dy)),
                    end: Point::new(round_half_up(center.x + dx), round_half_up(center.y + dy)),
                    stops,
                }
            }
        }
    }
}

/// Half of the gradient vector for a signed `rotation` in `(-2π, 2π)`.
fn linear_offset(rotation: f64, half: f64) -> (f64, f64) {
    let positive = (rotation + TAU) % TAU;
    let tan = rotation.tan();
    if (0.0..=0.25 * PI).contains(&positive) || (positive > 1.75 * PI && positive <= TAU) {
        (half, half * tan)
    } else if positive > 0.25 * PI && positive <= 0.75 * PI {
        (half / tan, half)
    } else if positive > 0.75 * PI && positive <= 1.25 * PI {
        (-half, -half * tan)
    } else if positive > 1.25 * PI && positive <= 1.75 * PI {
        (-half / tan, -half)
    } else {
        (0.0, 0.0)
    }
}

/// Rounds `.5` towards positive infinity.
fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

/// A path filled with one paint.
#[derive(Clone, Debug, PartialEq)]
pub struct FillLayer {
    pub path: Path,
    pub paint: Paint,
    pub rule: FillRule,
}

/// A raster image stretched into the box `(x, y, width, height)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageLayer {
    pub image: Arc<RgbaImage>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    Fill(FillLayer),
    Image(ImageLayer),
}

/// A finished render, painted bottom to top.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    width: u32,
    height: u32,
    layers: Vec<Layer>,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Scene {
            width,
            height,
            layers: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Adds an even-odd fill. Empty paths are dropped.
    pub fn fill(&mut self, path: Path, paint: Paint) {
        if path.is_empty() {
            return;
        }
        self.layers.push(Layer::Fill(FillLayer {
            path,
            paint,
            rule: FillRule::EvenOdd,
        }));
    }

    pub fn draw_image(&mut self, layer: ImageLayer) {
        self.layers.push(Layer::Image(layer));
    }

    /// Topmost fill paint covering `p`, ignoring images.
    pub fn paint_at(&self, p: Point) -> Option<&Paint> {
        self.layers.iter().rev().find_map(|layer| match layer {
            Layer::Fill(fill) if fill.path.contains(p, fill.rule) => Some(&fill.paint),
            _ => None,
        })
    }
}
