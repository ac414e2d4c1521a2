use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use tiny_skia::{
    FilterQuality, GradientStop, IntSize, LinearGradient, PathBuilder, Pixmap, PixmapPaint,
    RadialGradient, Shader, SpreadMode, Transform,
};
use tracing::debug;

use crate::color::{Color, ColorStop};
use crate::error::{QrError, Result};
use crate::path::{FillRule, Path, PathCommand};
use crate::scene::{ImageLayer, Layer, Paint, Scene};

/// JPEG quality used when the caller does not pick one.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/*---- Formats ----*/

/// Output formats a finished scene can be exported to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    Svg,
}

impl ExportFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Svg => "image/svg+xml",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Svg => "svg",
        }
    }

    /// Looks a format up by MIME type (`image/png`, ...).
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(ExportFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ExportFormat::Jpeg),
            "image/svg+xml" => Some(ExportFormat::Svg),
            _ => None,
        }
    }
}

/*---- Raster output ----*/

/// Paints every layer of `scene` onto a new transparent pixmap.
///
/// # Arguments
///
/// * `scene` - The finished scene to paint.
///
/// # Returns
///
/// An anti-aliased, premultiplied `tiny_skia::Pixmap` of the scene's size.
///
/// # Errors
///
/// Returns [`QrError::Export`] if the pixmap cannot be allocated.
pub fn rasterize(scene: &Scene) -> Result<Pixmap> {
    let mut pixmap = Pixmap::new(scene.width(), scene.height()).ok_or_else(|| {
        QrError::Export(format!(
            "cannot allocate a {}x{} pixmap",
            scene.width(),
            scene.height()
        ))
    })?;

    for layer in scene.layers() {
        match layer {
            Layer::Fill(fill) => {
                let Some(path) = to_skia_path(&fill.path) else {
                    continue;
                };
                let mut paint = tiny_skia::Paint::default();
                paint.shader = to_shader(&fill.paint);
                paint.anti_alias = true;
                let rule = match fill.rule {
                    FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
                    FillRule::NonZero => tiny_skia::FillRule::Winding,
                };
                pixmap.fill_path(&path, &paint, rule, Transform::identity(), None);
            }
            Layer::Image(image) => draw_image(&mut pixmap, image),
        }
    }
    debug!(width = scene.width(), height = scene.height(), layers = scene.layers().len(), "scene rasterized");
    Ok(pixmap)
}

fn to_skia_path(path: &Path) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    for command in path.commands() {
        match *command {
            PathCommand::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathCommand::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathCommand::CubicTo(c1, c2, p) => pb.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathCommand::Close => pb.close(),
        }
    }
    pb.finish()
}

fn skia_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

fn to_shader(paint: &Paint) -> Shader<'static> {
    let shader = match paint {
        Paint::Solid(color) => return Shader::SolidColor(skia_color(*color)),
        Paint::LinearGradient { start, end, stops } => LinearGradient::new(
            tiny_skia::Point::from_xy(start.x as f32, start.y as f32),
            tiny_skia::Point::from_xy(end.x as f32, end.y as f32),
            gradient_stops(stops),
            SpreadMode::Pad,
            Transform::identity(),
        ),
        Paint::RadialGradient { center, radius, stops } => {
            let center = tiny_skia::Point::from_xy(center.x as f32, center.y as f32);
            RadialGradient::new(
                center,
                center,
                *radius as f32,
                gradient_stops(stops),
                SpreadMode::Pad,
                Transform::identity(),
            )
        }
    };
    // Degenerate gradients paint nothing, like a canvas gradient without stops.
    shader.unwrap_or(Shader::SolidColor(tiny_skia::Color::TRANSPARENT))
}

fn gradient_stops(stops: &[ColorStop]) -> Vec<GradientStop> {
    stops
        .iter()
        .map(|stop| GradientStop::new(stop.offset.clamp(0.0, 1.0) as f32, skia_color(stop.color)))
        .collect()
}

fn draw_image(pixmap: &mut Pixmap, layer: &ImageLayer) {
    let (w, h) = layer.image.dimensions();
    if w == 0 || h == 0 || layer.width <= 0.0 || layer.height <= 0.0 {
        return;
    }
    let Some(source) = premultiplied(&layer.image) else {
        return;
    };
    let transform = Transform::from_row(
        (layer.width / f64::from(w)) as f32,
        0.0,
        0.0,
        (layer.height / f64::from(h)) as f32,
        layer.x as f32,
        layer.y as f32,
    );
    pixmap.draw_pixmap(0, 0, source.as_ref(), &logo_paint(), transform, None);
}

/// Logos are resampled bicubically.
fn logo_paint() -> PixmapPaint {
    PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    }
}

fn premultiplied(image: &RgbaImage) -> Option<Pixmap> {
    let mut data = image.as_raw().clone();
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, IntSize::from_wh(image.width(), image.height())?)
}

/// Converts a pixmap back to straight-alpha RGBA.
pub fn to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (pixel, color) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = color.demultiply();
        *pixel = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    img
}

/// Encodes the scene as PNG with its transparency.
pub fn to_png(scene: &Scene) -> Result<Vec<u8>> {
    let img = to_rgba_image(&rasterize(scene)?);
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|err| QrError::Export(err.to_string()))?;
    Ok(buf)
}

/// Encodes the scene as JPEG.
///
/// JPEG has no alpha channel, so transparent areas are flattened onto white.
///
/// # Arguments
///
/// * `scene` - The finished scene.
/// * `quality` - Encoder quality, `1..=100`.
pub fn to_jpeg(scene: &Scene, quality: u8) -> Result<Vec<u8>> {
    let rgba = to_rgba_image(&rasterize(scene)?);
    let rgb = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let over_white = |c: u8| ((u16::from(c) * u16::from(a) + 255 * (255 - u16::from(a)) + 127) / 255) as u8;
        Rgb([over_white(r), over_white(g), over_white(b)])
    });
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|err| QrError::Export(err.to_string()))?;
    Ok(buf)
}

/*---- Vector output ----*/

// Returns a string of SVG code for the scene. Paths keep their curves, so the
// result scales without loss. The string always uses Unix newlines (\n).
pub fn to_svg_string(scene: &Scene) -> Result<String> {
    let mut defs = String::new();
    let mut body = String::new();

    for (index, layer) in scene.layers().iter().enumerate() {
        match layer {
            Layer::Fill(fill) => {
                let fill_attr = svg_paint(&fill.paint, index, &mut defs);
                let rule = match fill.rule {
                    FillRule::EvenOdd => "evenodd",
                    FillRule::NonZero => "nonzero",
                };
                body += &format!(
                    "\t<path d=\"{}\" {} fill-rule=\"{}\"/>\n",
                    svg_path_data(&fill.path),
                    fill_attr,
                    rule
                );
            }
            Layer::Image(image) => {
                if image.width <= 0.0 || image.height <= 0.0 {
                    continue;
                }
                let mut png = Vec::new();
                DynamicImage::ImageRgba8((*image.image).clone())
                    .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                    .map_err(|err| QrError::Export(err.to_string()))?;
                body += &format!(
                    "\t<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"none\" href=\"data:image/png;base64,{}\"/>\n",
                    image.x,
                    image.y,
                    image.width,
                    image.height,
                    BASE64.encode(&png)
                );
            }
        }
    }

    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    result += &format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{0}\" height=\"{1}\" viewBox=\"0 0 {0} {1}\">\n",
        scene.width(),
        scene.height()
    );
    if !defs.is_empty() {
        result += "\t<defs>\n";
        result += &defs;
        result += "\t</defs>\n";
    }
    result += &body;
    result += "</svg>\n";
    Ok(result)
}

fn svg_path_data(path: &Path) -> String {
    let mut d = String::new();
    for command in path.commands() {
        if !d.is_empty() {
            d.push(' ');
        }
        d += &match *command {
            PathCommand::MoveTo(p) => format!("M{},{}", num(p.x), num(p.y)),
            PathCommand::LineTo(p) => format!("L{},{}", num(p.x), num(p.y)),
            PathCommand::CubicTo(c1, c2, p) => format!(
                "C{},{} {},{} {},{}",
                num(c1.x),
                num(c1.y),
                num(c2.x),
                num(c2.y),
                num(p.x),
                num(p.y)
            ),
            PathCommand::Close => "Z".to_string(),
        };
    }
    d
}

/// Up to three decimals, without trailing zeros.
fn num(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn svg_paint(paint: &Paint, index: usize, defs: &mut String) -> String {
    let (id, stops) = match paint {
        Paint::Solid(color) => {
            return if color.a == 255 {
                format!("fill=\"{}\"", color.to_hex())
            } else {
                format!("fill=\"{}\" fill-opacity=\"{}\"", color.to_hex(), num(f64::from(color.opacity())))
            };
        }
        Paint::LinearGradient { start, end, stops } => {
            let id = format!("gradient-{}", index);
            *defs += &format!(
                "\t\t<linearGradient id=\"{}\" gradientUnits=\"userSpaceOnUse\" x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\">\n",
                id,
                num(start.x),
                num(start.y),
                num(end.x),
                num(end.y)
            );
            (id, stops)
        }
        Paint::RadialGradient { center, radius, stops } => {
            let id = format!("gradient-{}", index);
            *defs += &format!(
                "\t\t<radialGradient id=\"{}\" gradientUnits=\"userSpaceOnUse\" cx=\"{}\" cy=\"{}\" r=\"{}\">\n",
                id,
                num(center.x),
                num(center.y),
                num(*radius)
            );
            (id, stops)
        }
    };
    for stop in stops {
        *defs += &format!(
            "\t\t\t<stop offset=\"{}\" stop-color=\"{}\" stop-opacity=\"{}\"/>\n",
            num(stop.offset),
            stop.color.to_hex(),
            num(f64::from(stop.color.opacity()))
        );
    }
    let tag = if matches!(paint, Paint::LinearGradient { .. }) {
        "linearGradient"
    } else {
        "radialGradient"
    };
    *defs += &format!("\t\t</{}>\n", tag);
    format!("fill=\"url(#{})\"", id)
}

/*---- Encoded output ----*/

/// Exports the scene in `format`.
///
/// # Example
///
/// ```rust
/// use qirust_canvas::helper::{encode, ExportFormat};
/// use qirust_canvas::scene::Scene;
///
/// let bytes = encode(&Scene::new(4, 4), ExportFormat::Png).unwrap();
/// assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
/// ```
pub fn encode(scene: &Scene, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Png => to_png(scene),
        ExportFormat::Jpeg => to_jpeg(scene, DEFAULT_JPEG_QUALITY),
        ExportFormat::Svg => to_svg_string(scene).map(String::into_bytes),
    }
}

/// Wraps encoded bytes in a `data:<mime>;base64,` URL.
pub fn to_data_url(bytes: &[u8], format: ExportFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), BASE64.encode(bytes))
}
