//! The styled render pipeline.
//!
//! [`QrCodeCanvas`] owns the resolved options and the encoder. The first call to
//! [`QrCodeCanvas::created`] builds the [`Scene`] in a fixed order (background, dots, the three
//! finder patterns, logo). Every later call and every export shares that one outcome.

use std::f64::consts::FRAC_PI_2;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

use crate::color::Color;
use crate::error::{QrError, Result};
use crate::figures::{QrCornerDot, QrCornerSquare, QrDot};
use crate::helper::{self, ExportFormat};
use crate::image_size::{calculate_image_size, ImageSizeRequest, LogoReservation};
use crate::options::{self, ImageSource, Options};
use crate::path::{LocalFrame, Path, Point};
use crate::qrcode::{ModuleMatrix, QrEncoder};
use crate::scene::{ImageLayer, Paint, Scene};

/// Side of a finder pattern in modules.
const FINDER_SIZE: usize = 7;

const SQUARE_MASK: [[bool; FINDER_SIZE]; FINDER_SIZE] = {
    const X: bool = true;
    const O: bool = false;
    [
        [X, X, X, X, X, X, X],
        [X, O, O, O, O, O, X],
        [X, O, O, O, O, O, X],
        [X, O, O, O, O, O, X],
        [X, O, O, O, O, O, X],
        [X, O, O, O, O, O, X],
        [X, X, X, X, X, X, X],
    ]
};

const DOT_MASK: [[bool; FINDER_SIZE]; FINDER_SIZE] = {
    const X: bool = true;
    const O: bool = false;
    [
        [O, O, O, O, O, O, O],
        [O, O, O, O, O, O, O],
        [O, O, X, X, X, O, O],
        [O, O, X, X, X, O, O],
        [O, O, X, X, X, O, O],
        [O, O, O, O, O, O, O],
        [O, O, O, O, O, O, O],
    ]
};

/// Upper bound for downloading a remote logo.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// `(column, row, rotation)` of the top-left, top-right and bottom-left finder patterns.
const FINDERS: [(f64, f64, f64); 3] = [(0.0, 0.0, 0.0), (1.0, 0.0, FRAC_PI_2), (0.0, 1.0, -FRAC_PI_2)];

/// Pixel geometry of the module grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layout {
    pub count: usize,
    pub dot_size: f64,
    /// Left edge of the module area.
    pub x_beginning: f64,
    /// Top edge of the module area.
    pub y_beginning: f64,
}

impl Layout {
    /// Fits `count` modules into the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`QrError::Capacity`] when the canvas is narrower than `count` pixels on either
    /// side or the margin leaves less than one pixel per module.
    pub fn new(count: usize, width: f64, height: f64, margin: f64) -> Result<Self> {
        let capacity = || QrError::Capacity { count, width, height };
        if count == 0 || count as f64 > width || count as f64 > height {
            return Err(capacity());
        }
        let min_size = width.min(height) - margin * 2.0;
        let dot_size = (min_size / count as f64).floor();
        if dot_size < 1.0 {
            return Err(capacity());
        }
        let area = count as f64 * dot_size;
        Ok(Layout {
            count,
            dot_size,
            x_beginning: ((width - area) / 2.0).floor(),
            y_beginning: ((height - area) / 2.0).floor(),
        })
    }

    /// Side of the square module area in pixels.
    pub fn area(&self) -> f64 {
        self.count as f64 * self.dot_size
    }

    /// Top-left pixel of the module at `(row, col)`.
    pub fn module_origin(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.x_beginning + col as f64 * self.dot_size,
            self.y_beginning + row as f64 * self.dot_size,
        )
    }

    /// Top-left pixel of a finder pattern box.
    fn finder_origin(&self, column: f64, row: f64) -> (f64, f64) {
        let offset = self.dot_size * (self.count - FINDER_SIZE) as f64;
        (self.x_beginning + column * offset, self.y_beginning + row * offset)
    }

    /// Whether `(row, col)` lies in one of the three 7x7 finder boxes.
    pub fn in_finder(&self, row: usize, col: usize) -> bool {
        let far = self.count.saturating_sub(FINDER_SIZE);
        let near_row = row < FINDER_SIZE;
        let near_col = col < FINDER_SIZE;
        (near_row && near_col) || (near_row && col >= far) || (row >= far && near_col)
    }

    /// Whether `(row, col)` lies in the centered logo reservation.
    pub fn in_reservation(&self, row: usize, col: usize, reservation: &LogoReservation) -> bool {
        let centered = |index: usize, span: u32| {
            let (index, count, span) = (index as i64 * 2, self.count as i64, i64::from(span));
            index >= count - span && index < count + span
        };
        !reservation.is_empty()
            && centered(col, reservation.hide_x_dots)
            && centered(row, reservation.hide_y_dots)
    }
}

/// Outlines every dark module that `keep(row, col)` accepts.
///
/// A module's shape only sees neighbors that are dark and kept too, so dots next to a finder
/// pattern or the logo close off towards it.
pub fn dots_path(
    matrix: &impl ModuleMatrix,
    layout: &Layout,
    dot: QrDot,
    keep: impl Fn(usize, usize) -> bool,
) -> Path {
    let count = layout.count as i64;
    let mut path = Path::new();
    for row in 0..layout.count {
        for col in 0..layout.count {
            if !keep(row, col) || !matrix.is_dark(row, col) {
                continue;
            }
            let (x, y) = layout.module_origin(row, col);
            dot.draw(&mut path, x, y, layout.dot_size, |dx, dy| {
                let (r, c) = (row as i64 + i64::from(dy), col as i64 + i64::from(dx));
                if r < 0 || c < 0 || r >= count || c >= count {
                    return false;
                }
                let (r, c) = (r as usize, c as usize);
                keep(r, c) && matrix.is_dark(r, c)
            });
        }
    }
    path
}

/// Draws a finder part with ordinary dots, one per set mask cell.
fn mask_path(mask: &[[bool; FINDER_SIZE]; FINDER_SIZE], dot: QrDot, x: f64, y: f64, dot_size: f64) -> Path {
    let at = |i: i64, j: i64| -> bool {
        (0..FINDER_SIZE as i64).contains(&i)
            && (0..FINDER_SIZE as i64).contains(&j)
            && mask[i as usize][j as usize]
    };
    let mut path = Path::new();
    for (i, line) in mask.iter().enumerate() {
        for (j, &set) in line.iter().enumerate() {
            if !set {
                continue;
            }
            let (i, j) = (i as i64, j as i64);
            dot.draw(&mut path, x + i as f64 * dot_size, y + j as f64 * dot_size, dot_size, |dx, dy| {
                at(i + i64::from(dx), j + i64::from(dy))
            });
        }
    }
    path
}

/// A styled QR code bound to one set of options.
///
/// # Example
///
/// ```rust
/// use qirust_canvas::canvas::QrCodeCanvas;
/// use qirust_canvas::helper::ExportFormat;
/// use serde_json::json;
///
/// # let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
/// # runtime.block_on(async {
/// let canvas = QrCodeCanvas::from_json(json!({
///     "data": "https://example.com",
///     "dotsOptions": { "type": "rounded", "color": "#4267b2" },
///     "cornersSquareOptions": { "type": "extra-rounded" }
/// }))
/// .unwrap();
/// let png = canvas.to_buffer(ExportFormat::Png).await.unwrap();
/// assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
/// # });
/// ```
#[derive(Debug)]
pub struct QrCodeCanvas {
    options: Options,
    encoder: QrEncoder,
    scene: OnceCell<Result<Scene>>,
}

impl QrCodeCanvas {
    /// Sanitizes `options` and queues the data with the encoder.
    ///
    /// # Errors
    ///
    /// [`QrError::Configuration`] for out-of-range options, [`QrError::Encoding`] when the data
    /// does not fit the requested mode.
    pub fn new(options: Options) -> Result<Self> {
        let options = options.sanitize()?;
        let qr = &options.qr_options;
        let mut encoder = QrEncoder::new(qr.type_number, qr.error_correction_level)?;
        encoder.add_data(&options.data, qr.mode)?;
        debug!(
            width = options.width,
            height = options.height,
            type_number = qr.type_number,
            level = ?qr.error_correction_level,
            "QR canvas configured"
        );
        Ok(QrCodeCanvas {
            options,
            encoder,
            scene: OnceCell::new(),
        })
    }

    /// Resolves JSON options over the defaults, then behaves like [`new`](QrCodeCanvas::new).
    pub fn from_json(value: Value) -> Result<Self> {
        Self::new(options::resolve(value)?)
    }

    pub fn width(&self) -> u32 {
        self.options.width as u32
    }

    pub fn height(&self) -> u32 {
        self.options.height as u32
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Waits for the render to finish.
    ///
    /// The first caller runs it; the outcome, success or failure, is kept and shared. A failed
    /// render is never retried.
    pub async fn created(&self) -> Result<&Scene> {
        self.scene
            .get_or_init(|| self.draw_qr())
            .await
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Exports the finished render.
    pub async fn to_buffer(&self, format: ExportFormat) -> Result<Vec<u8>> {
        let scene = self.created().await?;
        helper::encode(scene, format)
    }

    /// Exports the finished render as a `data:` URL.
    pub async fn to_data_url(&self, format: ExportFormat) -> Result<String> {
        let bytes = self.to_buffer(format).await?;
        Ok(helper::to_data_url(&bytes, format))
    }

    /// Writes the finished render to `path`, creating missing parent directories.
    pub async fn to_file(&self, path: impl AsRef<FsPath>, format: ExportFormat) -> Result<PathBuf> {
        let path = path.as_ref().to_path_buf();
        let bytes = self.to_buffer(format).await?;
        let io_error = |err: std::io::Error| QrError::Export(format!("{}: {}", path.display(), err));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(io_error)?;
        debug!(path = %path.display(), ?format, "QR code written");
        Ok(path)
    }

    async fn draw_qr(&self) -> Result<Scene> {
        let options = &self.options;
        let mut encoder = self.encoder.clone();
        encoder.make()?;
        let layout = Layout::new(encoder.module_count(), options.width, options.height, options.margin)?;
        trace!(?layout, "module grid laid out");

        let logo = match &options.image {
            Some(source) => Some(load_image(source).await?),
            None => None,
        };
        let reservation = match &logo {
            Some(image) => self.reserve(image, &layout),
            None => LogoReservation::default(),
        };

        let mut scene = Scene::new(self.width(), self.height());
        self.draw_background(&mut scene);
        let dots_paint = self.draw_dots(&mut scene, &encoder, &layout, &reservation);
        self.draw_corners(&mut scene, &layout, &dots_paint);
        if let Some(image) = logo {
            self.draw_image(&mut scene, &image, &layout, &reservation);
        }
        debug!(count = layout.count, dot_size = layout.dot_size, layers = scene.layers().len(), "QR scene ready");
        Ok(scene)
    }

    fn reserve(&self, image: &DynamicImage, layout: &Layout) -> LogoReservation {
        let options = &self.options;
        let coverage = options.image_options.image_size * options.qr_options.error_correction_level.tolerance();
        let count = layout.count as f64;
        let reservation = calculate_image_size(ImageSizeRequest {
            original_width: f64::from(image.width()),
            original_height: f64::from(image.height()),
            max_hidden_dots: (coverage * count * count).floor() as i64,
            max_hidden_axis_dots: Some(layout.count as i64 - 14),
            dot_size: layout.dot_size as i64,
        });
        trace!(?reservation, "logo area reserved");
        reservation
    }

    fn draw_background(&self, scene: &mut Scene) {
        let Some(background) = &self.options.background_options else {
            return;
        };
        let (width, height) = (self.options.width, self.options.height);
        let Some(paint) = Paint::select(
            background.color,
            background.gradient.as_ref(),
            0.0,
            0.0,
            width.max(height),
            0.0,
        ) else {
            return;
        };
        let mut path = Path::new();
        LocalFrame::new(Point::default(), 0.0).draw(&mut path, |pen| pen.rect(0.0, 0.0, width, height));
        scene.fill(path, paint);
    }

    /// Adds the data modules and returns their paint for the corners to fall back to.
    fn draw_dots(
        &self,
        scene: &mut Scene,
        matrix: &impl ModuleMatrix,
        layout: &Layout,
        reservation: &LogoReservation,
    ) -> Paint {
        let dots = &self.options.dots_options;
        let hide = self.options.image_options.hide_background_dots;
        let path = dots_path(matrix, layout, QrDot::new(dots.kind), |row, col| {
            !layout.in_finder(row, col) && !(hide && layout.in_reservation(row, col, reservation))
        });
        let paint = Paint::select(
            dots.color,
            dots.gradient.as_ref(),
            layout.x_beginning,
            layout.y_beginning,
            layout.area(),
            0.0,
        )
        .unwrap_or(Paint::Solid(Color::BLACK));
        scene.fill(path, paint.clone());
        paint
    }

    fn draw_corners(&self, scene: &mut Scene, layout: &Layout, dots_paint: &Paint) {
        let options = &self.options;
        let dot = QrDot::new(options.dots_options.kind);
        let square_size = layout.dot_size * FINDER_SIZE as f64;
        let core_size = layout.dot_size * 3.0;

        for (column, row, rotation) in FINDERS {
            let (x, y) = layout.finder_origin(column, row);

            let square = options.corners_square_options.as_ref();
            let path = match square.and_then(|o| o.kind) {
                Some(kind) => {
                    let mut path = Path::new();
                    QrCornerSquare::new(kind).draw(&mut path, x, y, square_size, rotation);
                    path
                }
                None => mask_path(&SQUARE_MASK, dot, x, y, layout.dot_size),
            };
            let paint = square
                .and_then(|o| Paint::select(o.color, o.gradient.as_ref(), x, y, square_size, rotation))
                .unwrap_or_else(|| dots_paint.clone());
            scene.fill(path, paint);

            let core = options.corners_dot_options.as_ref();
            let (cx, cy) = (x + layout.dot_size * 2.0, y + layout.dot_size * 2.0);
            let path = match core.and_then(|o| o.kind) {
                Some(kind) => {
                    let mut path = Path::new();
                    QrCornerDot::new(kind).draw(&mut path, cx, cy, core_size, rotation);
                    path
                }
                None => mask_path(&DOT_MASK, dot, x, y, layout.dot_size),
            };
            let paint = core
                .and_then(|o| Paint::select(o.color, o.gradient.as_ref(), cx, cy, core_size, rotation))
                .unwrap_or_else(|| dots_paint.clone());
            scene.fill(path, paint);
        }
    }

    fn draw_image(&self, scene: &mut Scene, image: &DynamicImage, layout: &Layout, reservation: &LogoReservation) {
        let margin = self.options.image_options.margin;
        let width = f64::from(reservation.width) - margin * 2.0;
        let height = f64::from(reservation.height) - margin * 2.0;
        if width <= 0.0 || height <= 0.0 {
            warn!(width, height, margin, "logo has no room left after its margin, skipping it");
            return;
        }
        scene.draw_image(ImageLayer {
            image: Arc::new(image.to_rgba8()),
            x: layout.x_beginning + margin + (layout.area() - f64::from(reservation.width)) / 2.0,
            y: layout.y_beginning + margin + (layout.area() - f64::from(reservation.height)) / 2.0,
            width,
            height,
        });
    }
}

/// Reads or downloads the logo and decodes it. Decoding runs on the blocking pool.
async fn load_image(source: &ImageSource) -> Result<Arc<DynamicImage>> {
    let bytes = match source {
        ImageSource::Decoded(image) => return Ok(Arc::clone(image)),
        ImageSource::Url(url) => fetch_image(url).await?,
        ImageSource::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|err| QrError::Asset(format!("cannot read {}: {}", path.display(), err)))?,
        ImageSource::Bytes(bytes) => bytes.clone(),
    };
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|err| QrError::Asset(format!("image decoding did not finish: {}", err)))??;
    trace!(width = image.width(), height = image.height(), "logo decoded");
    Ok(Arc::new(image))
}

/// Downloads a remote logo. Transport failures and non-2xx answers are asset errors.
async fn fetch_image(url: &str) -> Result<Vec<u8>> {
    let asset = |err: reqwest::Error| QrError::Asset(format!("cannot fetch {}: {}", url, err));
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build().map_err(asset)?;
    debug!(url, "fetching logo");
    let response = client.get(url).send().await.map_err(asset)?;
    let status = response.status();
    if !status.is_success() {
        warn!(url, %status, "logo request failed");
        return Err(QrError::Asset(format!("cannot fetch {}: HTTP {}", url, status)));
    }
    let bytes = response.bytes().await.map_err(asset)?;
    trace!(url, len = bytes.len(), "logo downloaded");
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figures::DotType;
    use crate::path::FillRule;
    use crate::scene::Layer;
    use image::{ImageFormat, Rgba, RgbaImage};
    use serde_json::json;
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct AllDark(usize);

    impl ModuleMatrix for AllDark {
        fn module_count(&self) -> usize {
            self.0
        }

        fn is_dark(&self, row: usize, col: usize) -> bool {
            row < self.0 && col < self.0
        }
    }

    fn logo_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn fills(scene: &Scene) -> Vec<&Paint> {
        scene
            .layers()
            .iter()
            .filter_map(|layer| match layer {
                Layer::Fill(fill) => Some(&fill.paint),
                Layer::Image(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_layout() {
        let layout = Layout::new(21, 300.0, 300.0, 0.0).unwrap();
        assert_eq!(layout.dot_size, 14.0);
        assert_eq!((layout.x_beginning, layout.y_beginning), (3.0, 3.0));

        let layout = Layout::new(25, 400.0, 300.0, 10.0).unwrap();
        assert_eq!(layout.dot_size, 11.0);
        assert_eq!((layout.x_beginning, layout.y_beginning), (62.0, 12.0));
        assert_eq!(layout.module_origin(1, 2), (84.0, 23.0));
    }

    #[test]
    fn test_layout_capacity() {
        assert!(matches!(
            Layout::new(77, 50.0, 50.0, 0.0),
            Err(QrError::Capacity { count: 77, .. })
        ));
        // Fits on the canvas, but the margin leaves under a pixel per module.
        assert!(matches!(Layout::new(21, 30.0, 30.0, 10.0), Err(QrError::Capacity { .. })));
    }

    #[test]
    fn test_reservation_is_centered() {
        let layout = Layout::new(25, 250.0, 250.0, 0.0).unwrap();
        let reservation = LogoReservation { hide_x_dots: 5, hide_y_dots: 3, width: 50, height: 30 };
        let hidden: Vec<(usize, usize)> = (0..25)
            .flat_map(|r| (0..25).map(move |c| (r, c)))
            .filter(|&(r, c)| layout.in_reservation(r, c, &reservation))
            .collect();
        assert_eq!(hidden.len(), 15);
        assert!(hidden.iter().all(|&(r, c)| (11..=13).contains(&r) && (10..=14).contains(&c)));
        assert!(!layout.in_reservation(12, 12, &LogoReservation::default()));
    }

    #[test]
    fn test_finder_boxes_cover_three_corners() {
        for count in (21..=177).step_by(4) {
            let layout = Layout { count, dot_size: 1.0, x_beginning: 0.0, y_beginning: 0.0 };
            let far = count - FINDER_SIZE;
            let excluded = (0..count)
                .flat_map(|r| (0..count).map(move |c| (r, c)))
                .filter(|&(r, c)| layout.in_finder(r, c))
                .count();
            assert_eq!(excluded, 3 * FINDER_SIZE * FINDER_SIZE, "count {count}");
            for i in 0..FINDER_SIZE {
                for j in 0..FINDER_SIZE {
                    assert!(layout.in_finder(i, j));
                    assert!(layout.in_finder(i, far + j));
                    assert!(layout.in_finder(far + i, j));
                    assert!(!layout.in_finder(far + i, far + j));
                }
            }
        }
    }

    #[test]
    fn test_finder_boxes_never_get_dots() {
        for count in [21, 45] {
            let layout = Layout { count, dot_size: 1.0, x_beginning: 0.0, y_beginning: 0.0 };
            let path = dots_path(&AllDark(count), &layout, QrDot::new(DotType::Square), |r, c| {
                !layout.in_finder(r, c)
            });
            let far = (count - FINDER_SIZE) as f64;
            for (x0, y0) in [(0.0, 0.0), (far, 0.0), (0.0, far)] {
                for i in 0..FINDER_SIZE {
                    for j in 0..FINDER_SIZE {
                        let p = Point::new(x0 + i as f64 + 0.5, y0 + j as f64 + 0.5);
                        assert!(!path.contains(p, FillRule::EvenOdd), "count {count} at {p:?}");
                    }
                }
            }
            // There is no finder pattern in the bottom-right corner.
            assert!(path.contains(Point::new(far + 3.5, far + 3.5), FillRule::EvenOdd));
        }
    }

    #[test]
    fn test_dots_close_off_towards_excluded_modules() {
        let layout = Layout { count: 21, dot_size: 10.0, x_beginning: 0.0, y_beginning: 0.0 };
        let rounded = QrDot::new(DotType::Rounded);

        // Module (0, 7) sits right of the top-left finder box. Only its right and bottom
        // neighbors count, so its top-left corner is rounded off.
        let path = dots_path(&AllDark(21), &layout, rounded, |r, c| !layout.in_finder(r, c));
        assert!(!path.contains(Point::new(70.5, 0.5), FillRule::EvenOdd));
        assert!(path.contains(Point::new(79.5, 0.5), FillRule::EvenOdd));

        // Without the exclusion it has three dark neighbors and stays square.
        let path = dots_path(&AllDark(21), &layout, rounded, |_, _| true);
        assert!(path.contains(Point::new(70.5, 0.5), FillRule::EvenOdd));
    }

    #[tokio::test]
    async fn test_default_render() {
        let canvas = QrCodeCanvas::from_json(json!({ "data": "HELLO" })).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (300, 300));
        let scene = canvas.created().await.unwrap();

        // Dots plus ring and core for each of the three finder patterns.
        assert_eq!(scene.layers().len(), 7);
        assert!(scene.layers().iter().all(|l| matches!(l, Layer::Fill(_))));
        assert!(fills(scene).iter().all(|p| **p == Paint::Solid(Color::BLACK)));

        // xBeginning = 3, dot = 14: module (0, 0) is dark ring, (1, 1) is the light gap.
        let dark = Point::new(3.0 + 3.5, 3.0 + 3.5);
        let gap = Point::new(3.0 + 14.0 + 7.0, 3.0 + 14.0 + 7.0);
        let core = Point::new(3.0 + 3.0 * 14.0 + 7.0, 3.0 + 3.0 * 14.0 + 7.0);
        assert!(scene.paint_at(dark).is_some());
        assert!(scene.paint_at(gap).is_none());
        assert!(scene.paint_at(core).is_some());
        assert!(scene.paint_at(Point::new(1.0, 1.0)).is_none());

        let pixels = helper::to_rgba_image(&helper::rasterize(scene).unwrap());
        assert_eq!(pixels.get_pixel(10, 10).0, [0, 0, 0, 255]);
        assert_eq!(pixels.get_pixel(24, 24).0[3], 0);
    }

    #[tokio::test]
    async fn test_created_is_shared() {
        let canvas = QrCodeCanvas::from_json(json!({ "data": "shared" })).unwrap();
        let (a, b) = tokio::join!(canvas.created(), canvas.created());
        assert!(std::ptr::eq(a.unwrap(), b.unwrap()));
    }

    #[tokio::test]
    async fn test_capacity_error_is_cached() {
        let canvas = QrCodeCanvas::from_json(json!({
            "data": "HELLO",
            "width": 50,
            "height": 50,
            "qrOptions": { "typeNumber": 15 }
        }))
        .unwrap();
        let first = canvas.created().await.unwrap_err();
        assert!(matches!(first, QrError::Capacity { count: 77, .. }));
        assert_eq!(canvas.created().await.unwrap_err(), first);
        assert!(matches!(canvas.to_buffer(ExportFormat::Png).await, Err(QrError::Capacity { .. })));
    }

    #[tokio::test]
    async fn test_encoding_error_surfaces() {
        let canvas = QrCodeCanvas::from_json(json!({
            "data": "x".repeat(200),
            "qrOptions": { "typeNumber": 1 }
        }))
        .unwrap();
        assert!(matches!(canvas.created().await, Err(QrError::Encoding(_))));
        assert!(matches!(
            QrCodeCanvas::from_json(json!({ "data": "abc", "qrOptions": { "mode": "Numeric" } })),
            Err(QrError::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn test_logo_render() {
        let options = Options {
            data: "https://example.com/some/longer/path".to_string(),
            image: Some(ImageSource::Bytes(logo_png(100, 100))),
            ..Options::default()
        };
        let canvas = QrCodeCanvas::new(options).unwrap();
        let scene = canvas.created().await.unwrap();

        let image = scene
            .layers()
            .iter()
            .find_map(|l| match l {
                Layer::Image(image) => Some(image),
                Layer::Fill(_) => None,
            })
            .expect("logo layer");
        assert!(image.width > 0.0 && image.width == image.height);
        let center = 150.0;
        assert!((image.x + image.width / 2.0 - center).abs() <= 1.0);
        assert!((image.y + image.height / 2.0 - center).abs() <= 1.0);

        // Hidden modules leave the area under the logo free of dots.
        assert!(scene.paint_at(Point::new(center, center)).is_none());

        let pixels = helper::to_rgba_image(&helper::rasterize(scene).unwrap());
        let [r, g, b, a] = pixels.get_pixel(150, 150).0;
        assert!(r >= 254 && g <= 1 && b <= 1 && a >= 254);
    }

    #[tokio::test]
    async fn test_hide_background_dots_switch() {
        // Filled samples around the canvas center, logo pixels left out.
        async fn dots_near_center(hide: bool) -> usize {
            let canvas = QrCodeCanvas::new(Options {
                data: "a".repeat(60),
                image: Some(ImageSource::Bytes(logo_png(50, 50))),
                image_options: crate::options::ImageOptions {
                    hide_background_dots: hide,
                    ..Default::default()
                },
                ..Options::default()
            })
            .unwrap();
            let scene = canvas.created().await.unwrap();
            assert!(scene.layers().iter().any(|l| matches!(l, Layer::Image(_))));
            let mut filled = 0;
            for dy in -20..=20 {
                for dx in -20..=20 {
                    let p = Point::new(150.0 + f64::from(dx) + 0.5, 150.0 + f64::from(dy) + 0.5);
                    if scene.paint_at(p).is_some() {
                        filled += 1;
                    }
                }
            }
            filled
        }

        assert_eq!(dots_near_center(true).await, 0);
        assert!(dots_near_center(false).await > 0);
    }

    #[tokio::test]
    async fn test_logo_budget_zero_draws_no_image() {
        let canvas = QrCodeCanvas::from_json(json!({
            "data": "HELLO",
            "image": format!("data:image/png;base64,{}", base64::Engine::encode(&base64::engine::general_purpose::STANDARD, logo_png(10, 10))),
            "imageOptions": { "imageSize": 0 }
        }))
        .unwrap();
        let scene = canvas.created().await.unwrap();
        assert!(scene.layers().iter().all(|l| matches!(l, Layer::Fill(_))));
    }

    #[tokio::test]
    async fn test_logo_margin_too_large_skips_image() {
        let options = Options {
            data: "HELLO WORLD".to_string(),
            image: Some(ImageSource::Decoded(Arc::new(DynamicImage::ImageRgba8(RgbaImage::new(8, 8))))),
            image_options: crate::options::ImageOptions { margin: 500.0, ..Default::default() },
            ..Options::default()
        };
        let scene = QrCodeCanvas::new(options).unwrap().created().await.unwrap().clone();
        assert!(scene.layers().iter().all(|l| matches!(l, Layer::Fill(_))));
    }

    /// Serves one HTTP response on a loopback port and returns its URL.
    async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        // Keep loopback requests away from any proxy configured in the environment.
        std::env::set_var("NO_PROXY", "127.0.0.1");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/logo.png", addr)
    }

    #[tokio::test]
    async fn test_remote_logo_is_fetched() {
        let url = serve_once("200 OK", logo_png(40, 40)).await;
        let canvas = QrCodeCanvas::from_json(json!({ "data": "https://example.com/remote", "image": url })).unwrap();
        let scene = canvas.created().await.unwrap();
        assert!(scene.layers().iter().any(|l| matches!(l, Layer::Image(_))));
    }

    #[tokio::test]
    async fn test_remote_logo_failures() {
        let url = serve_once("404 Not Found", b"missing".to_vec()).await;
        let canvas = QrCodeCanvas::from_json(json!({ "data": "a", "image": url })).unwrap();
        match canvas.created().await {
            Err(QrError::Asset(message)) => assert!(message.contains("404"), "{message}"),
            other => panic!("expected an asset error, got {:?}", other),
        }

        // Nothing listens on a port whose listener was dropped.
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        std::env::set_var("NO_PROXY", "127.0.0.1");
        let canvas =
            QrCodeCanvas::from_json(json!({ "data": "a", "image": format!("http://{}/logo.png", closed) })).unwrap();
        assert!(matches!(canvas.created().await, Err(QrError::Asset(_))));
    }

    #[tokio::test]
    async fn test_asset_errors() {
        let missing = QrCodeCanvas::from_json(json!({ "data": "a", "image": "/definitely/not/here.png" })).unwrap();
        assert!(matches!(missing.created().await, Err(QrError::Asset(_))));

        let garbage = QrCodeCanvas::new(Options {
            data: "a".to_string(),
            image: Some(ImageSource::Bytes(vec![1, 2, 3, 4])),
            ..Options::default()
        })
        .unwrap();
        assert!(matches!(garbage.created().await, Err(QrError::Asset(_))));
    }

    #[tokio::test]
    async fn test_styles_and_paints() {
        let canvas = QrCodeCanvas::from_json(json!({
            "data": "styled",
            "backgroundOptions": { "color": "#ffffff" },
            "dotsOptions": {
                "type": "classy",
                "gradient": {
                    "type": "linear",
                    "colorStops": [{ "offset": 0, "color": "#000" }, { "offset": 1, "color": "#00f" }]
                }
            },
            "cornersSquareOptions": { "type": "extra-rounded", "color": "#f00" },
            "cornersDotOptions": { "type": "dot" }
        }))
        .unwrap();
        let scene = canvas.created().await.unwrap();
        let paints = fills(scene);
        assert_eq!(paints.len(), 8);
        assert_eq!(*paints[0], Paint::Solid(Color::WHITE));
        assert!(matches!(paints[1], Paint::LinearGradient { .. }));
        assert_eq!(*paints[2], Paint::Solid(Color::rgb(255, 0, 0)));
        // No core color: the core inherits the dots gradient.
        assert_eq!(paints[3], paints[1]);
    }

    #[tokio::test]
    async fn test_corner_gradient_follows_rotation() {
        let canvas = QrCodeCanvas::from_json(json!({
            "data": "rotated",
            "cornersSquareOptions": {
                "type": "square",
                "gradient": {
                    "type": "linear",
                    "colorStops": [{ "offset": 0, "color": "#000" }, { "offset": 1, "color": "#f00" }]
                }
            }
        }))
        .unwrap();
        let scene = canvas.created().await.unwrap();
        let paints = fills(scene);
        let (top_left, top_right) = (paints[1], paints[3]);
        match (top_left, top_right) {
            (Paint::LinearGradient { start: a0, end: a1, .. }, Paint::LinearGradient { start: b0, end: b1, .. }) => {
                assert_eq!(a0.y, a1.y);
                assert_eq!(b0.x, b1.x);
            }
            other => panic!("unexpected paints {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exports() {
        let canvas = QrCodeCanvas::from_json(json!({ "data": "export me", "width": 200, "height": 120 })).unwrap();

        let png = canvas.to_buffer(ExportFormat::Png).await.unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 120));

        let url = canvas.to_data_url(ExportFormat::Jpeg).await.unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let svg = String::from_utf8(canvas.to_buffer(ExportFormat::Svg).await.unwrap()).unwrap();
        assert!(svg.contains("viewBox=\"0 0 200 120\""));

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("qr.png");
        let written = canvas.to_file(&target, ExportFormat::Png).await.unwrap();
        assert_eq!(written, target);
        assert_eq!(std::fs::read(&target).unwrap(), png);
    }
}
