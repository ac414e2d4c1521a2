//! Outer ring of a finder pattern.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::Deserialize;

use crate::path::{LocalFrame, Path};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CornerSquareType {
    Dot,
    Square,
    ExtraRounded,
}

/// Draws the 7x7-module ring around a finder pattern.
///
/// Each style emits an outer and an inner outline; the even-odd fill leaves the ring.
#[derive(Clone, Copy, Debug)]
pub struct QrCornerSquare {
    kind: CornerSquareType,
}

impl QrCornerSquare {
    pub fn new(kind: CornerSquareType) -> Self {
        QrCornerSquare { kind }
    }

    /// Appends the ring for the box at `(x, y)` with side `size` (seven modules).
    pub fn draw(&self, path: &mut Path, x: f64, y: f64, size: f64, rotation: f64) {
        let dot = size / 7.0;
        let r = size / 2.0;
        LocalFrame::centered(x, y, size, rotation).draw(path, |pen| match self.kind {
            CornerSquareType::Dot => {
                pen.arc(0.0, 0.0, r, 0.0, TAU);
                pen.arc(0.0, 0.0, r - dot, 0.0, TAU);
            }
            CornerSquareType::Square => {
                pen.rect(-r, -r, size, size);
                pen.rect(-r + dot, -r + dot, size - 2.0 * dot, size - 2.0 * dot);
            }
            CornerSquareType::ExtraRounded => {
                // Outer silhouette: four 2.5-module arcs joined by straight edges.
                pen.arc(-dot, -dot, 2.5 * dot, PI, -FRAC_PI_2);
                pen.line_to(dot, -3.5 * dot);
                pen.arc(dot, -dot, 2.5 * dot, -FRAC_PI_2, 0.0);
                pen.line_to(3.5 * dot, -dot);
                pen.arc(dot, dot, 2.5 * dot, 0.0, FRAC_PI_2);
                pen.line_to(-dot, 3.5 * dot);
                pen.arc(-dot, dot, 2.5 * dot, FRAC_PI_2, PI);
                pen.line_to(-3.5 * dot, -dot);
                // Inner cutout: the same layout with 1.5-module arcs.
                pen.arc(-dot, -dot, 1.5 * dot, PI, -FRAC_PI_2);
                pen.line_to(dot, -2.5 * dot);
                pen.arc(dot, -dot, 1.5 * dot, -FRAC_PI_2, 0.0);
                pen.line_to(2.5 * dot, -dot);
                pen.arc(dot, dot, 1.5 * dot, 0.0, FRAC_PI_2);
                pen.line_to(-dot, 2.5 * dot);
                pen.arc(-dot, dot, 1.5 * dot, FRAC_PI_2, PI);
                pen.line_to(-2.5 * dot, -dot);
            }
        });
    }
}
