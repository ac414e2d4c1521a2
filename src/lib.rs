//! # qirust-canvas
//!
//! A Rust library for rendering styled QR codes.
//!
//! `qirust-canvas` encodes text into a QR symbol and draws every module as a vector shape instead
//! of a plain square: rounded or "classy" dots that connect to their neighbors, custom finder
//! pattern corners, solid or gradient paints, and an embedded logo whose keep-clear area never
//! hides more modules than the error-correction level can recover.
//!
//! ## Features
//!
//! - Six dot styles: `square`, `dots`, `rounded`, `extra-rounded`, `classy`, `classy-rounded`.
//! - Corner squares (`square`, `dot`, `extra-rounded`) and corner dots (`square`, `dot`).
//! - Solid colors and linear or radial gradients for dots, corners and background.
//! - Logo embedding sized against the error-correction budget, from files, bytes, `data:` URLs
//!   or `http(s)` URLs.
//! - PNG, JPEG and SVG export, as bytes, `data:` URLs or files.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Installation
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! qirust-canvas = "0.2" # Replace with the latest version
//! ```
//!
//! ## Example
//!
//! Render a styled QR code and save it as PNG:
//!
//! ```rust,no_run
//! use qirust_canvas::{ExportFormat, QrCodeCanvas};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), qirust_canvas::QrError> {
//!     let canvas = QrCodeCanvas::from_json(json!({
//!         "width": 400,
//!         "height": 400,
//!         "data": "https://example.com",
//!         "image": "logo.png",
//!         "qrOptions": { "errorCorrectionLevel": "H" },
//!         "dotsOptions": { "type": "classy-rounded", "color": "#ff8c00" },
//!         "cornersSquareOptions": { "type": "extra-rounded" },
//!         "backgroundOptions": { "color": "#ffffff" }
//!     }))?;
//!     canvas.to_file("output/styled_qr.png", ExportFormat::Png).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`options`]: Option defaults, deep merge and validation.
//! - [`canvas`]: The render pipeline and exports.
//! - [`figures`]: Dot and corner shapes.
//! - [`image_size`]: Logo keep-clear planning.
//! - [`helper`]: Rasterizing and encoding finished scenes.
//! - [`qrcode`]: Encoder adapter and module matrix access.

#![forbid(unsafe_code)]

pub mod canvas;
pub mod color;
pub mod error;
pub mod figures;
pub mod helper;
pub mod image_size;
pub mod options;
pub mod path;
pub mod qrcode;
pub mod scene;

pub use canvas::QrCodeCanvas;
pub use color::{Color, ColorStop, Gradient, GradientType};
pub use error::{QrError, Result};
pub use figures::{CornerDotType, CornerSquareType, DotType};
pub use helper::ExportFormat;
pub use options::{resolve, Options};
pub use qrcode::{ErrorCorrectionLevel, Mode, ModuleMatrix};
pub use scene::Scene;
