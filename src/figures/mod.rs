//! Shape library: module dots and the two finder-pattern layers.
//!
//! Every figure is appended to a [`Path`](crate::path::Path) as closed subpaths. A whole layer is
//! filled once with the even-odd rule, which is what turns the concentric outlines of the corner
//! squares into rings.

pub mod corner_dot;
pub mod corner_square;
pub mod dot;

pub use corner_dot::{CornerDotType, QrCornerDot};
pub use corner_square::{CornerSquareType, QrCornerSquare};
pub use dot::{DotFigure, DotType, Neighbors, QrDot};
