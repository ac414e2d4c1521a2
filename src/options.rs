//! Style options: documented defaults, deep merge, coercion and sanitizing.
//!
//! User configuration arrives as JSON-shaped data (camelCase keys, like the option objects of
//! browser QR stylers). [`resolve`] layers it over [`default_options`], coerces the loosely typed
//! numeric and boolean fields, deserializes the result into [`Options`] and sanitizes it.

use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::DynamicImage;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::trace;

use crate::color::{Color, Gradient};
use crate::error::{QrError, Result};
use crate::figures::{CornerDotType, CornerSquareType, DotType};
use crate::qrcode::{ErrorCorrectionLevel, Mode, MAX_TYPE_NUMBER};

/// Fully resolved rendering options. Immutable for the duration of a render.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Canvas width in pixels.
    pub width: f64,
    /// Canvas height in pixels.
    pub height: f64,
    /// Minimum distance in pixels between the symbol and the canvas edge.
    pub margin: f64,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub image: Option<ImageSource>,
    #[serde(default)]
    pub qr_options: QrOptions,
    #[serde(default)]
    pub image_options: ImageOptions,
    #[serde(default)]
    pub dots_options: DotsOptions,
    #[serde(default)]
    pub corners_square_options: Option<CornersSquareOptions>,
    #[serde(default)]
    pub corners_dot_options: Option<CornersDotOptions>,
    #[serde(default)]
    pub background_options: Option<BackgroundOptions>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrOptions {
    /// QR version 1..=40, or 0 to pick the smallest that fits.
    #[serde(default)]
    pub type_number: u8,
    /// Segment mode; detected from the data when absent.
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub error_correction_level: ErrorCorrectionLevel,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    /// Leave the modules under the logo undrawn.
    pub hide_background_dots: bool,
    /// Share of the error-correction budget the logo may use, `0.0..=1.0`.
    pub image_size: f64,
    /// Accepted for option compatibility with web renderers. Has no effect outside a browser.
    #[serde(default)]
    pub cross_origin: Option<String>,
    /// Pixel inset between the reserved area and the drawn logo.
    pub margin: f64,
}

impl Default for ImageOptions {
    fn default() -> Self {
        ImageOptions {
            hide_background_dots: true,
            image_size: 0.4,
            cross_origin: None,
            margin: 0.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DotsOptions {
    #[serde(rename = "type", default)]
    pub kind: DotType,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub gradient: Option<Gradient>,
}

impl Default for DotsOptions {
    fn default() -> Self {
        DotsOptions {
            kind: DotType::Square,
            color: Some(Color::BLACK),
            gradient: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CornersSquareOptions {
    #[serde(rename = "type", default)]
    pub kind: Option<CornerSquareType>,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub gradient: Option<Gradient>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CornersDotOptions {
    #[serde(rename = "type", default)]
    pub kind: Option<CornerDotType>,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub gradient: Option<Gradient>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BackgroundOptions {
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub gradient: Option<Gradient>,
}

/// Where the logo comes from.
///
/// From JSON a string is read as a `data:` URL, an `http(s)://` URL (fetched at render time) or
/// a filesystem path.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "String")]
pub enum ImageSource {
    Path(PathBuf),
    Url(String),
    /// Encoded image bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
    Decoded(Arc<DynamicImage>),
}

impl TryFrom<String> for ImageSource {
    type Error = QrError;

    fn try_from(value: String) -> Result<Self> {
        if let Some(rest) = value.strip_prefix("data:") {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                QrError::Configuration("data URL without a ',' separator".to_string())
            })?;
            if !header.ends_with(";base64") {
                return Err(QrError::Configuration(
                    "only base64 data URLs are supported for images".to_string(),
                ));
            }
            let bytes = BASE64
                .decode(payload.trim())
                .map_err(|err| QrError::Configuration(format!("bad image data URL: {}", err)))?;
            return Ok(ImageSource::Bytes(bytes));
        }
        if value.starts_with("http://") || value.starts_with("https://") {
            return Ok(ImageSource::Url(value));
        }
        Ok(ImageSource::Path(PathBuf::from(value)))
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            width: 300.0,
            height: 300.0,
            margin: 0.0,
            data: String::new(),
            image: None,
            qr_options: QrOptions::default(),
            image_options: ImageOptions::default(),
            dots_options: DotsOptions::default(),
            corners_square_options: None,
            corners_dot_options: None,
            background_options: None,
        }
    }
}

impl Options {
    /// Validates ranges and clamps `margin` to `min(width, height)`.
    pub fn sanitize(mut self) -> Result<Self> {
        require("width", self.width, |v| v >= 1.0)?;
        require("height", self.height, |v| v >= 1.0)?;
        require("margin", self.margin, |v| v >= 0.0)?;
        require("imageOptions.imageSize", self.image_options.image_size, |v| {
            (0.0..=1.0).contains(&v)
        })?;
        require("imageOptions.margin", self.image_options.margin, |v| v >= 0.0)?;
        if self.qr_options.type_number > MAX_TYPE_NUMBER {
            return Err(QrError::Configuration(format!(
                "qrOptions.typeNumber must be within 0..={}",
                MAX_TYPE_NUMBER
            )));
        }

        self.width = self.width.floor();
        self.height = self.height.floor();
        let min_side = self.width.min(self.height);
        if self.margin > min_side {
            trace!(margin = self.margin, min_side, "clamping margin");
            self.margin = min_side;
        }
        Ok(self)
    }
}

fn require(field: &str, value: f64, valid: impl Fn(f64) -> bool) -> Result<()> {
    if value.is_finite() && valid(value) {
        Ok(())
    } else {
        Err(QrError::Configuration(format!("{} has invalid value {}", field, value)))
    }
}

/// The documented defaults, as the JSON object user options are merged over.
pub fn default_options() -> Value {
    json!({
        "width": 300,
        "height": 300,
        "data": "",
        "margin": 0,
        "qrOptions": {
            "typeNumber": 0,
            "errorCorrectionLevel": "Q"
        },
        "imageOptions": {
            "hideBackgroundDots": true,
            "imageSize": 0.4,
            "margin": 0
        },
        "dotsOptions": {
            "type": "square",
            "color": "#000"
        }
    })
}

/// Recursively merges `source` over `target`.
///
/// Objects merge key by key. Arrays and scalars in `source` replace the target value whole.
/// Absent keys and `null` leave the target untouched.
///
/// # Example
///
/// ```rust
/// use qirust_canvas::options::merge_deep;
/// use serde_json::json;
///
/// let merged = merge_deep(
///     json!({ "dotsOptions": { "type": "square", "color": "#000" } }),
///     json!({ "dotsOptions": { "color": "#fff" } }),
/// );
/// assert_eq!(merged, json!({ "dotsOptions": { "type": "square", "color": "#fff" } }));
/// ```
pub fn merge_deep(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                if value.is_null() {
                    continue;
                }
                let merged = match base.remove(&key) {
                    Some(existing) => merge_deep(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (target, Value::Null) => target,
        (_, source) => source,
    }
}

/// Merges `user` over the defaults and produces sanitized [`Options`].
///
/// # Errors
///
/// Returns [`QrError::Configuration`] when a field cannot be coerced, has an unknown style
/// name or color, or is out of range.
pub fn resolve(user: Value) -> Result<Options> {
    if !(user.is_object() || user.is_null()) {
        return Err(QrError::Configuration(
            "options must be a JSON object".to_string(),
        ));
    }
    let mut merged = merge_deep(default_options(), user);
    coerce(&mut merged)?;
    let options: Options = serde_json::from_value(merged)?;
    options.sanitize()
}

fn coerce(options: &mut Value) -> Result<()> {
    let Some(root) = options.as_object_mut() else {
        return Err(QrError::Configuration("options must be a JSON object".to_string()));
    };
    for field in ["width", "height", "margin"] {
        coerce_number_field(root, field, field)?;
    }
    if let Some(Value::Object(image_options)) = root.get_mut("imageOptions") {
        coerce_number_field(image_options, "imageSize", "imageOptions.imageSize")?;
        coerce_number_field(image_options, "margin", "imageOptions.margin")?;
        if let Some(flag) = image_options.get_mut("hideBackgroundDots") {
            *flag = Value::Bool(truthy(flag));
        }
    }
    Ok(())
}

fn coerce_number_field(object: &mut Map<String, Value>, key: &str, path: &str) -> Result<()> {
    if let Some(value) = object.get_mut(key) {
        let number = to_number(value)
            .filter(|n| n.is_finite())
            .ok_or_else(|| QrError::Configuration(format!("{} is not a number: {}", path, value)))?;
        *value = Value::from(number);
    }
    Ok(())
}

/// Numeric reading of loosely typed input: numeric strings parse, booleans are 1/0.
fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::GradientType;

    #[test]
    fn test_resolve_empty_matches_default() {
        let resolved = resolve(json!({})).unwrap();
        let default = Options::default();
        assert_eq!(resolved.width, default.width);
        assert_eq!(resolved.height, default.height);
        assert_eq!(resolved.margin, default.margin);
        assert_eq!(resolved.data, default.data);
        assert_eq!(resolved.qr_options.type_number, 0);
        assert_eq!(
            resolved.qr_options.error_correction_level,
            ErrorCorrectionLevel::Quartile
        );
        assert!(resolved.qr_options.mode.is_none());
        assert!(resolved.image_options.hide_background_dots);
        assert_eq!(resolved.image_options.image_size, 0.4);
        assert_eq!(resolved.dots_options.kind, DotType::Square);
        assert_eq!(resolved.dots_options.color, Some(Color::BLACK));
        assert!(resolved.corners_square_options.is_none());
        assert!(resolved.background_options.is_none());
    }

    #[test]
    fn test_merge_keeps_sibling_fields() {
        let resolved = resolve(json!({ "dotsOptions": { "color": "#fff" } })).unwrap();
        assert_eq!(resolved.dots_options.kind, DotType::Square);
        assert_eq!(resolved.dots_options.color, Some(Color::WHITE));
    }

    #[test]
    fn test_merge_replaces_arrays() {
        let merged = merge_deep(
            json!({ "stops": [1, 2, 3], "nested": { "keep": true, "list": ["a"] } }),
            json!({ "stops": [9], "nested": { "list": ["b", "c"] } }),
        );
        assert_eq!(
            merged,
            json!({ "stops": [9], "nested": { "keep": true, "list": ["b", "c"] } })
        );
    }

    #[test]
    fn test_merge_ignores_null() {
        let merged = merge_deep(json!({ "width": 300, "a": { "b": 1 } }), json!({ "width": null, "a": null }));
        assert_eq!(merged, json!({ "width": 300, "a": { "b": 1 } }));
    }

    #[test]
    fn test_merge_scalar_over_object() {
        let merged = merge_deep(json!({ "a": { "b": 1 } }), json!({ "a": 5 }));
        assert_eq!(merged, json!({ "a": 5 }));
    }

    #[test]
    fn test_coercion() {
        let resolved = resolve(json!({
            "width": "400",
            "height": 250,
            "margin": "10",
            "imageOptions": { "hideBackgroundDots": 0, "imageSize": "0.5", "margin": "" }
        }))
        .unwrap();
        assert_eq!(resolved.width, 400.0);
        assert_eq!(resolved.margin, 10.0);
        assert!(!resolved.image_options.hide_background_dots);
        assert_eq!(resolved.image_options.image_size, 0.5);
        assert_eq!(resolved.image_options.margin, 0.0);

        let resolved = resolve(json!({ "imageOptions": { "hideBackgroundDots": "no" } })).unwrap();
        assert!(resolved.image_options.hide_background_dots);
    }

    #[test]
    fn test_margin_clamped() {
        let resolved = resolve(json!({ "width": 100, "height": 80, "margin": 500 })).unwrap();
        assert_eq!(resolved.margin, 80.0);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            resolve(json!({ "width": "wide" })),
            Err(QrError::Configuration(_))
        ));
        assert!(matches!(
            resolve(json!({ "dotsOptions": { "type": "hexagon" } })),
            Err(QrError::Configuration(_))
        ));
        assert!(matches!(
            resolve(json!({ "dotsOptions": { "color": "#12" } })),
            Err(QrError::Configuration(_))
        ));
        assert!(matches!(
            resolve(json!({ "qrOptions": { "typeNumber": 41 } })),
            Err(QrError::Configuration(_))
        ));
        assert!(matches!(
            resolve(json!({ "imageOptions": { "imageSize": 1.5 } })),
            Err(QrError::Configuration(_))
        ));
        assert!(matches!(resolve(json!([1, 2])), Err(QrError::Configuration(_))));
    }

    #[test]
    fn test_full_style_options() {
        let resolved = resolve(json!({
            "data": "https://example.com",
            "qrOptions": { "typeNumber": 5, "mode": "Byte", "errorCorrectionLevel": "H" },
            "dotsOptions": {
                "type": "classy-rounded",
                "gradient": {
                    "type": "radial",
                    "colorStops": [{ "offset": 0, "color": "#f00" }, { "offset": 1, "color": "#00f" }]
                }
            },
            "cornersSquareOptions": { "type": "extra-rounded", "color": "#333" },
            "cornersDotOptions": { "type": "dot" },
            "backgroundOptions": { "color": "white" }
        }))
        .unwrap();
        assert_eq!(resolved.qr_options.type_number, 5);
        assert_eq!(resolved.qr_options.mode, Some(Mode::Byte));
        assert_eq!(resolved.qr_options.error_correction_level, ErrorCorrectionLevel::High);
        assert_eq!(resolved.dots_options.kind, DotType::ClassyRounded);
        // The default color survives next to the user's gradient.
        assert_eq!(resolved.dots_options.color, Some(Color::BLACK));
        let gradient = resolved.dots_options.gradient.unwrap();
        assert_eq!(gradient.kind, GradientType::Radial);
        let corners = resolved.corners_square_options.unwrap();
        assert_eq!(corners.kind, Some(CornerSquareType::ExtraRounded));
        assert_eq!(corners.color, Some(Color::rgb(0x33, 0x33, 0x33)));
        assert_eq!(
            resolved.corners_dot_options.unwrap().kind,
            Some(CornerDotType::Dot)
        );
        assert_eq!(resolved.background_options.unwrap().color, Some(Color::WHITE));
    }

    #[test]
    fn test_image_source_strings() {
        let source = ImageSource::try_from("logo.png".to_string()).unwrap();
        assert!(matches!(source, ImageSource::Path(p) if p == PathBuf::from("logo.png")));

        let source = ImageSource::try_from("https://example.com/logo.png".to_string()).unwrap();
        assert!(matches!(source, ImageSource::Url(_)));

        let source = ImageSource::try_from("data:image/png;base64,AAEC".to_string()).unwrap();
        assert!(matches!(source, ImageSource::Bytes(b) if b == vec![0u8, 1, 2]));

        assert!(ImageSource::try_from("data:image/png,raw".to_string()).is_err());
    }
}
