//! Per-module dot shapes.
//!
//! A dot's outline depends only on its style and on which of its four direct neighbors are dark.
//! [`DotType::figure`] is that pure choice; [`QrDot::draw`] turns it into geometry.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::Deserialize;

use crate::path::{LocalFrame, Path};

/// Style of the ordinary data modules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DotType {
    Dots,
    Rounded,
    Classy,
    ClassyRounded,
    #[default]
    Square,
    ExtraRounded,
}

/// Which of the four adjacent modules are dark.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Neighbors {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

impl Neighbors {
    /// Queries `dark(dx, dy)` at the four unit offsets.
    pub fn probe(dark: impl Fn(i32, i32) -> bool) -> Self {
        Neighbors {
            left: dark(-1, 0),
            right: dark(1, 0),
            top: dark(0, -1),
            bottom: dark(0, 1),
        }
    }

    /// From a `left | right << 1 | top << 2 | bottom << 3` bitmask.
    pub fn from_bits(bits: u8) -> Self {
        Neighbors {
            left: bits & 1 != 0,
            right: bits & 2 != 0,
            top: bits & 4 != 0,
            bottom: bits & 8 != 0,
        }
    }

    pub fn count(self) -> u8 {
        self.left as u8 + self.right as u8 + self.top as u8 + self.bottom as u8
    }

    /// The same pattern turned a quarter clockwise: top becomes right, right becomes bottom.
    pub fn rotated(self) -> Self {
        Neighbors {
            right: self.top,
            bottom: self.right,
            left: self.bottom,
            top: self.left,
        }
    }
}

/// The primitive outlines dots are made of, in their canonical (unrotated) orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DotFigure {
    /// Full circle.
    Dot,
    /// Full square.
    Square,
    /// Square on the left, half disc on the right.
    SideRounded,
    /// Square with the top-right corner rounded by a quarter circle of half the cell size.
    CornerRounded,
    /// Quarter disc of the full cell size, rounded towards the top right.
    CornerExtraRounded,
    /// Top-right and bottom-left corners rounded.
    CornersRounded,
}

impl DotType {
    /// Picks the figure and its rotation (radians, clockwise) for a module with `n` neighbors.
    ///
    /// The open side of a rounded figure faces away from the dark neighbors.
    pub fn figure(self, n: Neighbors) -> (DotFigure, f64) {
        match self {
            DotType::Square => (DotFigure::Square, 0.0),
            DotType::Dots => (DotFigure::Dot, 0.0),
            DotType::Rounded => rounded(n, DotFigure::CornerRounded),
            DotType::ExtraRounded => rounded(n, DotFigure::CornerExtraRounded),
            DotType::Classy => classy(n, DotFigure::CornerRounded),
            DotType::ClassyRounded => classy(n, DotFigure::CornerExtraRounded),
        }
    }
}

fn rounded(n: Neighbors, corner: DotFigure) -> (DotFigure, f64) {
    let count = n.count();
    if count == 0 {
        return (DotFigure::Dot, 0.0);
    }
    if count > 2 || (n.left && n.right) || (n.top && n.bottom) {
        return (DotFigure::Square, 0.0);
    }
    if count == 2 {
        let rotation = if n.left && n.top {
            FRAC_PI_2
        } else if n.top && n.right {
            PI
        } else if n.right && n.bottom {
            -FRAC_PI_2
        } else {
            0.0
        };
        return (corner, rotation);
    }
    let rotation = if n.top {
        FRAC_PI_2
    } else if n.right {
        PI
    } else if n.bottom {
        -FRAC_PI_2
    } else {
        0.0
    };
    (DotFigure::SideRounded, rotation)
}

fn classy(n: Neighbors, corner: DotFigure) -> (DotFigure, f64) {
    if n.count() == 0 {
        return (DotFigure::CornersRounded, FRAC_PI_2);
    }
    if !n.left && !n.top {
        return (corner, -FRAC_PI_2);
    }
    if !n.right && !n.bottom {
        return (corner, FRAC_PI_2);
    }
    (DotFigure::Square, 0.0)
}

impl DotFigure {
    /// Appends the figure for the cell at `(x, y)` with side `size`.
    pub fn draw(self, path: &mut Path, x: f64, y: f64, size: f64, rotation: f64) {
        let r = size / 2.0;
        LocalFrame::centered(x, y, size, rotation).draw(path, |pen| match self {
            DotFigure::Dot => pen.arc(0.0, 0.0, r, 0.0, TAU),
            DotFigure::Square => pen.rect(-r, -r, size, size),
            DotFigure::SideRounded => {
                pen.arc(0.0, 0.0, r, -FRAC_PI_2, FRAC_PI_2);
                pen.line_to(-r, r);
                pen.line_to(-r, -r);
                pen.line_to(0.0, -r);
            }
            DotFigure::CornerRounded => {
                pen.arc(0.0, 0.0, r, -FRAC_PI_2, 0.0);
                pen.line_to(r, r);
                pen.line_to(-r, r);
                pen.line_to(-r, -r);
                pen.line_to(0.0, -r);
            }
            DotFigure::CornerExtraRounded => {
                pen.arc(-r, r, size, -FRAC_PI_2, 0.0);
                pen.line_to(-r, r);
                pen.line_to(-r, -r);
            }
            DotFigure::CornersRounded => {
                pen.arc(0.0, 0.0, r, -FRAC_PI_2, 0.0);
                pen.line_to(r, r);
                pen.line_to(0.0, r);
                pen.arc(0.0, 0.0, r, FRAC_PI_2, PI);
                pen.line_to(-r, -r);
                pen.line_to(0.0, -r);
            }
        });
    }
}

/// Draws dots of one style.
#[derive(Clone, Copy, Debug)]
pub struct QrDot {
    kind: DotType,
}

impl QrDot {
    pub fn new(kind: DotType) -> Self {
        QrDot { kind }
    }

    /// Appends the dot for the cell at `(x, y)`.
    ///
    /// `dark(dx, dy)` reports whether the module at that offset is dark and drawn.
    pub fn draw(&self, path: &mut Path, x: f64, y: f64, size: f64, dark: impl Fn(i32, i32) -> bool) {
        let (figure, rotation) = self.kind.figure(Neighbors::probe(dark));
        figure.draw(path, x, y, size, rotation);
    }
}
