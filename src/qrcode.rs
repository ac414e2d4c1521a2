//! QR code encoding adapter.
//!
//! The styling engine only needs a finished grid of dark and light modules. This module wraps the
//! `qrcode` crate behind the small surface the renderer consumes: [`QrEncoder::add_data`],
//! [`QrEncoder::make`], and the [`ModuleMatrix`] accessors `module_count` / `is_dark`.
use ::qrcode::bits::Bits;
use ::qrcode::types::QrError as EncodeError;
use ::qrcode::{Color, EcLevel, QrCode, Version};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{QrError, Result};

/// Highest QR Code Model 2 version ("type number").
pub const MAX_TYPE_NUMBER: u8 = 40;

/// A read-only square grid of modules.
///
/// `row` and `col` are both in `0..module_count()`.
pub trait ModuleMatrix {
    /// Width and height of the grid in modules.
    fn module_count(&self) -> usize;

    /// Whether the module at `(row, col)` is dark. Out-of-range positions are light.
    fn is_dark(&self, row: usize, col: usize) -> bool;
}

/// Error correction level for a QR code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Deserialize)]
pub enum ErrorCorrectionLevel {
    /// Tolerates ~7% erroneous codewords.
    #[serde(rename = "L")]
    Low,
    /// Tolerates ~15% erroneous codewords.
    #[serde(rename = "M")]
    Medium,
    /// Tolerates ~25% erroneous codewords.
    #[default]
    #[serde(rename = "Q")]
    Quartile,
    /// Tolerates ~30% erroneous codewords.
    #[serde(rename = "H")]
    High,
}

impl ErrorCorrectionLevel {
    /// Fraction of the symbol that may be obscured while it stays scannable.
    pub fn tolerance(self) -> f64 {
        use ErrorCorrectionLevel::*;
        match self {
            Low => 0.07,
            Medium => 0.15,
            Quartile => 0.25,
            High => 0.30,
        }
    }

    fn ec_level(self) -> EcLevel {
        use ErrorCorrectionLevel::*;
        match self {
            Low => EcLevel::L,
            Medium => EcLevel::M,
            Quartile => EcLevel::Q,
            High => EcLevel::H,
        }
    }
}

/// Data encoding mode of a segment.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub enum Mode {
    Numeric,
    Alphanumeric,
    Byte,
}

static ALPHANUMERIC_CHARSET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

impl Mode {
    /// Picks the most compact mode able to hold `text`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use qirust_canvas::qrcode::Mode;
    ///
    /// assert_eq!(Mode::detect("0123"), Mode::Numeric);
    /// assert_eq!(Mode::detect("HELLO WORLD"), Mode::Alphanumeric);
    /// assert_eq!(Mode::detect("Hello"), Mode::Byte);
    /// ```
    pub fn detect(text: &str) -> Mode {
        if is_numeric(text) {
            Mode::Numeric
        } else if is_alphanumeric(text) {
            Mode::Alphanumeric
        } else {
            Mode::Byte
        }
    }

    /// Whether every character of `text` is representable in this mode.
    pub fn accepts(self, text: &str) -> bool {
        match self {
            Mode::Numeric => is_numeric(text),
            Mode::Alphanumeric => is_alphanumeric(text),
            Mode::Byte => true,
        }
    }
}

pub fn is_numeric(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_digit())
}

pub fn is_alphanumeric(text: &str) -> bool {
    text.chars().all(|c| ALPHANUMERIC_CHARSET.contains(c))
}

#[derive(Clone, Debug)]
struct Segment {
    data: String,
    mode: Mode,
}

/// Builds a QR symbol from text segments.
///
/// Mirrors the usual `addData` / `make` flow: segments are collected first, then
/// [`make`](QrEncoder::make) picks the version and fixes the module grid. The module count never
/// changes after a successful `make`.
///
/// # Example
///
/// ```rust
/// use qirust_canvas::qrcode::{ErrorCorrectionLevel, ModuleMatrix, QrEncoder};
///
/// let mut encoder = QrEncoder::new(0, ErrorCorrectionLevel::Quartile).unwrap();
/// encoder.add_data("HELLO", None).unwrap();
/// encoder.make().unwrap();
/// assert_eq!(encoder.module_count(), 21);
/// ```
#[derive(Clone, Debug)]
pub struct QrEncoder {
    type_number: u8,
    level: ErrorCorrectionLevel,
    segments: Vec<Segment>,
    modules: Vec<bool>,
    count: usize,
}

impl QrEncoder {
    /// Creates an encoder. `type_number` 0 selects the smallest version that fits the data.
    pub fn new(type_number: u8, level: ErrorCorrectionLevel) -> Result<Self> {
        if type_number > MAX_TYPE_NUMBER {
            return Err(QrError::Configuration(format!(
                "type number {} is outside 0..={}",
                type_number, MAX_TYPE_NUMBER
            )));
        }
        Ok(QrEncoder {
            type_number,
            level,
            segments: Vec::new(),
            modules: Vec::new(),
            count: 0,
        })
    }

    /// Queues `data` as a new segment. Without an explicit `mode` it is detected from the content.
    pub fn add_data(&mut self, data: &str, mode: Option<Mode>) -> Result<()> {
        let mode = mode.unwrap_or_else(|| Mode::detect(data));
        if !mode.accepts(data) {
            return Err(QrError::Encoding(format!(
                "data cannot be represented in {:?} mode",
                mode
            )));
        }
        trace!(?mode, len = data.len(), "queued QR segment");
        self.segments.push(Segment {
            data: data.to_owned(),
            mode,
        });
        Ok(())
    }

    /// Encodes the queued segments and fixes the module grid.
    pub fn make(&mut self) -> Result<()> {
        if self.count != 0 {
            return Ok(());
        }
        let code = if self.type_number == 0 {
            self.make_auto()?
        } else {
            self.encode_at(self.type_number)?
        };
        self.count = code.width();
        self.modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();
        debug!(count = self.count, level = ?self.level, "QR symbol built");
        Ok(())
    }

    /// Version chosen by [`make`](QrEncoder::make), if it has run.
    pub fn version(&self) -> Option<u8> {
        if self.count == 0 {
            None
        } else {
            Some(((self.count - 17) / 4) as u8)
        }
    }

    pub fn error_correction_level(&self) -> ErrorCorrectionLevel {
        self.level
    }

    fn make_auto(&self) -> Result<QrCode> {
        for version in 1..=MAX_TYPE_NUMBER {
            match self.encode_at(version) {
                Ok(code) => return Ok(code),
                Err(QrError::Encoding(reason)) => {
                    trace!(version, %reason, "data does not fit, trying next version");
                }
                Err(other) => return Err(other),
            }
        }
        Err(QrError::Encoding(format!(
            "data too long for any version at level {:?}",
            self.level
        )))
    }

    fn encode_at(&self, version: u8) -> Result<QrCode> {
        let mut bits = Bits::new(Version::Normal(i16::from(version)));
        for segment in &self.segments {
            let bytes = segment.data.as_bytes();
            let pushed = match segment.mode {
                Mode::Numeric => bits.push_numeric_data(bytes),
                Mode::Alphanumeric => bits.push_alphanumeric_data(bytes),
                Mode::Byte => bits.push_byte_data(bytes),
            };
            pushed.map_err(|err| too_long(err, version))?;
        }
        bits.push_terminator(self.level.ec_level())
            .map_err(|err| too_long(err, version))?;
        Ok(QrCode::with_bits(bits, self.level.ec_level())?)
    }
}

fn too_long(err: EncodeError, version: u8) -> QrError {
    QrError::Encoding(format!("{} (version {})", err, version))
}

impl ModuleMatrix for QrEncoder {
    fn module_count(&self) -> usize {
        self.count
    }

    fn is_dark(&self, row: usize, col: usize) -> bool {
        row < self.count && col < self.count && self.modules[row * self.count + col]
    }
}
