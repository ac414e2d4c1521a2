//! Logo keep-clear planning.
//!
//! A logo may hide at most as many modules as the error-correction level can recover. The planner
//! finds the largest centered block of modules, odd on both axes so it sits exactly on module
//! boundaries around the center module, that keeps to that budget and the logo's aspect ratio.

/// Inputs of [`calculate_image_size`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageSizeRequest {
    pub original_width: f64,
    pub original_height: f64,
    /// Module budget, `floor(image_size * tolerance * count^2)`.
    pub max_hidden_dots: i64,
    /// Per-axis cap, conventionally `count - 14` so the finder patterns stay clear.
    /// `None` or `Some(0)` means uncapped.
    pub max_hidden_axis_dots: Option<i64>,
    pub dot_size: i64,
}

/// The centered keep-clear rectangle, in modules and in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogoReservation {
    /// Hidden module columns.
    pub hide_x_dots: u32,
    /// Hidden module rows.
    pub hide_y_dots: u32,
    /// Logo width in pixels.
    pub width: u32,
    /// Logo height in pixels.
    pub height: u32,
}

impl LogoReservation {
    pub fn is_empty(&self) -> bool {
        self.hide_x_dots == 0 || self.hide_y_dots == 0
    }
}

/// Sizes the logo and its keep-clear rectangle.
///
/// Returns the all-zero reservation when any of the logo dimensions, the budget or the dot size
/// is not positive.
///
/// # Example
///
/// ```rust
/// use qirust_canvas::image_size::{calculate_image_size, ImageSizeRequest};
///
/// let reservation = calculate_image_size(ImageSizeRequest {
///     original_width: 100.0,
///     original_height: 100.0,
///     max_hidden_dots: 44,
///     max_hidden_axis_dots: Some(7),
///     dot_size: 14,
/// });
/// assert_eq!((reservation.hide_x_dots, reservation.hide_y_dots), (5, 5));
/// assert_eq!((reservation.width, reservation.height), (70, 70));
/// ```
pub fn calculate_image_size(request: ImageSizeRequest) -> LogoReservation {
    let ImageSizeRequest {
        original_width,
        original_height,
        max_hidden_dots,
        max_hidden_axis_dots,
        dot_size,
    } = request;

    if !(original_height > 0.0 && original_width > 0.0 && max_hidden_dots > 0 && dot_size > 0) {
        return LogoReservation::default();
    }

    let axis_cap = max_hidden_axis_dots.filter(|&cap| cap != 0);
    let dot = dot_size as f64;
    let k = original_height / original_width;

    let mut hide_x = ((max_hidden_dots as f64 / k).sqrt().floor() as i64).max(1);
    if let Some(cap) = axis_cap {
        if cap < hide_x {
            hide_x = cap;
        }
    }
    if hide_x % 2 == 0 {
        hide_x -= 1;
    }
    let mut width = (hide_x * dot_size) as f64;
    let mut hide_y = smallest_odd_at_least(hide_x as f64 * k);
    let mut height = (width * k).round();

    let over_axis = |y: i64| axis_cap.is_some_and(|cap| cap < y);
    if hide_y * hide_x > max_hidden_dots || over_axis(hide_y) {
        match axis_cap {
            Some(cap) if cap < hide_y => {
                hide_y = if cap % 2 == 0 { cap - 1 } else { cap };
            }
            _ => hide_y -= 2,
        }
        height = (hide_y * dot_size) as f64;
        hide_x = smallest_odd_at_least(hide_y as f64 / k);
        width = (height / k).round();
    }

    if hide_x < 1 || hide_y < 1 || hide_x * hide_y > max_hidden_dots {
        return fit_within_budget(hide_x, hide_y, max_hidden_dots, k, dot);
    }

    LogoReservation {
        hide_x_dots: hide_x as u32,
        hide_y_dots: hide_y as u32,
        width: width.max(0.0) as u32,
        height: height.max(0.0) as u32,
    }
}

/// `1 + 2 * ceil((v - 1) / 2)`: the smallest odd integer not below `v`.
fn smallest_odd_at_least(v: f64) -> i64 {
    1 + 2 * ((v - 1.0) / 2.0).ceil() as i64
}

/// Last resort for extreme aspect ratios on tiny budgets: shrink the larger axis until the area
/// fits, then fit the logo box inside the hidden block.
fn fit_within_budget(hide_x: i64, hide_y: i64, max_hidden_dots: i64, k: f64, dot: f64) -> LogoReservation {
    let odd_floor = |v: i64| if v < 1 { 1 } else if v % 2 == 0 { v - 1 } else { v };
    let mut x = odd_floor(hide_x);
    let mut y = odd_floor(hide_y);
    while x * y > max_hidden_dots {
        if x >= y && x > 1 {
            x -= 2;
        } else if y > 1 {
            y -= 2;
        } else {
            break;
        }
    }

    let box_width = x as f64 * dot;
    let box_height = y as f64 * dot;
    let (width, height) = if box_width * k <= box_height {
        (box_width, (box_width * k).round())
    } else {
        ((box_height / k).round(), box_height)
    };
    LogoReservation {
        hide_x_dots: x as u32,
        hide_y_dots: y as u32,
        width: width as u32,
        height: height as u32,
    }
}
