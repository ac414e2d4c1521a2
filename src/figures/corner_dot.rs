//! Inner 3x3 core of a finder pattern.

use std::f64::consts::TAU;

use serde::Deserialize;

use crate::path::{LocalFrame, Path};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CornerDotType {
    Dot,
    Square,
}

#[derive(Clone, Copy, Debug)]
pub struct QrCornerDot {
    kind: CornerDotType,
}

impl QrCornerDot {
    pub fn new(kind: CornerDotType) -> Self {
        QrCornerDot { kind }
    }

    /// Appends the core for the box at `(x, y)` with side `size` (three modules).
    pub fn draw(&self, path: &mut Path, x: f64, y: f64, size: f64, rotation: f64) {
        let r = size / 2.0;
        LocalFrame::centered(x, y, size, rotation).draw(path, |pen| match self.kind {
            CornerDotType::Dot => pen.arc(0.0, 0.0, r, 0.0, TAU),
            CornerDotType::Square => pen.rect(-r, -r, size, size),
        });
    }
}
