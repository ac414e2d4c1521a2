//! Surface-free vector paths.
//!
//! Shapes are built in a local frame (origin at the figure center, optionally rotated) and
//! stored in world coordinates, so nothing depends on a stateful transform stack. Arcs follow
//! 2D-canvas semantics (clockwise in a y-down space, a connecting line from the current point)
//! and are stored as cubic Bézier segments.

use std::f64::consts::{FRAC_PI_2, TAU};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// How overlapping subpaths decide what is inside.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    #[default]
    EvenOdd,
}

/// A sequence of subpaths in world coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    commands: Vec<PathCommand>,
    current: Option<Point>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn move_to(&mut self, p: Point) {
        self.commands.push(PathCommand::MoveTo(p));
        self.current = Some(p);
    }

    /// Without a current point this starts a new subpath, like a canvas `lineTo`.
    pub fn line_to(&mut self, p: Point) {
        if self.current.is_none() {
            self.move_to(p);
            return;
        }
        self.commands.push(PathCommand::LineTo(p));
        self.current = Some(p);
    }

    pub fn cubic_to(&mut self, c1: Point, c2: Point, p: Point) {
        if self.current.is_none() {
            self.move_to(c1);
        }
        self.commands.push(PathCommand::CubicTo(c1, c2, p));
        self.current = Some(p);
    }

    pub fn close(&mut self) {
        if self.current.take().is_some() {
            self.commands.push(PathCommand::Close);
        }
    }

    /// Appends a clockwise arc from `start` to `end` (radians).
    ///
    /// A sweep of a full turn or more draws a whole circle; anything else is reduced modulo a
    /// full turn. A line joins the current point to the arc start.
    pub fn arc(&mut self, center: Point, radius: f64, start: f64, end: f64) {
        let delta = end - start;
        let sweep = if delta >= TAU - 1e-9 { TAU } else { delta.rem_euclid(TAU) };
        let at = |angle: f64| Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin());

        self.line_to(at(start));
        if sweep <= 0.0 || radius <= 0.0 {
            return;
        }

        let segments = ((sweep / FRAC_PI_2) - 1e-9).ceil().max(1.0) as usize;
        let step = sweep / segments as f64;
        let k = 4.0 / 3.0 * (step / 4.0).tan();
        for i in 0..segments {
            let a0 = start + step * i as f64;
            let a1 = a0 + step;
            let (s0, c0) = a0.sin_cos();
            let (s1, c1) = a1.sin_cos();
            self.cubic_to(
                Point::new(center.x + radius * (c0 - k * s0), center.y + radius * (s0 + k * c0)),
                Point::new(center.x + radius * (c1 + k * s1), center.y + radius * (s1 - k * c1)),
                Point::new(center.x + radius * c1, center.y + radius * s1),
            );
        }
    }

    pub fn append(&mut self, other: &Path) {
        self.commands.extend_from_slice(&other.commands);
        self.current = other.current;
    }

    /// Approximates every subpath by a polygon. Curves are split into `steps` chords.
    pub fn flatten(&self, steps: usize) -> Vec<Vec<Point>> {
        let steps = steps.max(1);
        let mut polygons = Vec::new();
        let mut polygon: Vec<Point> = Vec::new();
        for command in &self.commands {
            match *command {
                PathCommand::MoveTo(p) => {
                    if polygon.len() > 1 {
                        polygons.push(std::mem::take(&mut polygon));
                    }
                    polygon.clear();
                    polygon.push(p);
                }
                PathCommand::LineTo(p) => polygon.push(p),
                PathCommand::CubicTo(c1, c2, p) => {
                    let p0 = polygon.last().copied().unwrap_or(c1);
                    for i in 1..=steps {
                        let t = i as f64 / steps as f64;
                        polygon.push(cubic_point(p0, c1, c2, p, t));
                    }
                }
                PathCommand::Close => {
                    if polygon.len() > 1 {
                        polygons.push(std::mem::take(&mut polygon));
                    }
                    polygon.clear();
                }
            }
        }
        if polygon.len() > 1 {
            polygons.push(polygon);
        }
        polygons
    }

    /// Point-in-path test. Every subpath is treated as closed.
    pub fn contains(&self, p: Point, rule: FillRule) -> bool {
        let mut winding = 0i32;
        let mut crossings = 0u32;
        for polygon in self.flatten(32) {
            for (i, a) in polygon.iter().enumerate() {
                let b = polygon[(i + 1) % polygon.len()];
                if (a.y <= p.y) != (b.y <= p.y) {
                    let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                    if x > p.x {
                        crossings += 1;
                        winding += if b.y > a.y { 1 } else { -1 };
                    }
                }
            }
        }
        match rule {
            FillRule::EvenOdd => crossings % 2 == 1,
            FillRule::NonZero => winding != 0,
        }
    }

    /// Bounding box `(min, max)` of the flattened outline.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let mut points = self.flatten(16).into_iter().flatten();
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        }))
    }
}

fn cubic_point(p0: Point, c1: Point, c2: Point, p3: Point, t: f64) -> Point {
    let u = 1.0 - t;
    let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
    Point::new(
        a * p0.x + b * c1.x + c * c2.x + d * p3.x,
        a * p0.y + b * c1.y + c * c2.y + d * p3.y,
    )
}

/// A translated and rotated coordinate frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalFrame {
    origin: Point,
    rotation: f64,
    sin: f64,
    cos: f64,
}

impl LocalFrame {
    pub fn new(origin: Point, rotation: f64) -> Self {
        let (sin, cos) = rotation.sin_cos();
        LocalFrame { origin, rotation, sin, cos }
    }

    /// Frame centered on the square cell at `(x, y)` with side `size`.
    pub fn centered(x: f64, y: f64, size: f64, rotation: f64) -> Self {
        Self::new(Point::new(x + size / 2.0, y + size / 2.0), rotation)
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn to_world(&self, p: Point) -> Point {
        Point::new(
            self.origin.x + p.x * self.cos - p.y * self.sin,
            self.origin.y + p.x * self.sin + p.y * self.cos,
        )
    }

    /// Draws one figure through `draw` and closes it. The frame never leaks into later figures.
    pub fn draw(&self, path: &mut Path, draw: impl FnOnce(&mut FramePen<'_>)) {
        let mut pen = FramePen { path, frame: *self };
        draw(&mut pen);
        pen.path.close();
    }
}

/// Path operations in local coordinates of a [`LocalFrame`].
pub struct FramePen<'a> {
    path: &'a mut Path,
    frame: LocalFrame,
}

impl FramePen<'_> {
    pub fn arc(&mut self, cx: f64, cy: f64, radius: f64, start: f64, end: f64) {
        let center = self.frame.to_world(Point::new(cx, cy));
        let rotation = self.frame.rotation;
        self.path.arc(center, radius, start + rotation, end + rotation);
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        let p = self.frame.to_world(Point::new(x, y));
        self.path.line_to(p);
    }

    /// Closed rectangle subpath.
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let corners = [(x, y), (x + width, y), (x + width, y + height), (x, y + height)];
        let mut points = corners.iter().map(|&(px, py)| self.frame.to_world(Point::new(px, py)));
        if let Some(first) = points.next() {
            self.path.move_to(first);
            for p in points {
                self.path.line_to(p);
            }
            self.path.close();
        }
    }
}
