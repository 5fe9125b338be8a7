use std::{fmt, io::Cursor, str::FromStr};

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, Rgba, RgbaImage, imageops};
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::domain::errors::ExchangeError;

pub const DEFAULT_SIZE: u32 = 300;
pub const DEFAULT_MARGIN: u32 = 4;

/// QR error correction level, from ~7% (low) to ~30% (high) recoverable codewords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    #[serde(alias = "L")]
    Low,
    #[serde(alias = "M")]
    Medium,
    #[serde(alias = "Q")]
    Quartile,
    #[default]
    #[serde(alias = "H")]
    High,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

/// An opaque RGB color written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color([u8; 3]);

impl Color {
    pub const BLACK: Color = Color([0x00, 0x00, 0x00]);
    pub const WHITE: Color = Color([0xff, 0xff, 0xff]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    fn to_rgba(self) -> Rgba<u8> {
        let [r, g, b] = self.0;
        Rgba([r, g, b, 0xff])
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('#').unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| format!("invalid color `{s}`: {e}"))?;
        let rgb: [u8; 3] = bytes
            .try_into()
            .map_err(|_| format!("invalid color `{s}`: expected 6 hex digits"))?;
        Ok(Self(rgb))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", hex::encode(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Pixel width (and height) of the output image.
    pub size: u32,
    /// Quiet zone width, in modules.
    pub margin: u32,
    pub error_correction: ErrorCorrection,
    pub foreground: Color,
    pub background: Color,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            margin: DEFAULT_MARGIN,
            error_correction: ErrorCorrection::High,
            foreground: Color::BLACK,
            background: Color::WHITE,
        }
    }
}

/// A rendered QR symbol, or an empty placeholder when rendering failed.
#[derive(Debug, Clone, PartialEq)]
pub struct QrImage {
    raster: Option<RgbaImage>,
}

impl QrImage {
    pub fn placeholder() -> Self {
        Self { raster: None }
    }

    pub fn is_placeholder(&self) -> bool {
        self.raster.is_none()
    }

    /// Pixel width of the image, zero for the placeholder.
    pub fn width(&self) -> u32 {
        self.raster.as_ref().map_or(0, |raster| raster.width())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let raster = self.raster.as_ref()?;
        if x >= raster.width() || y >= raster.height() {
            return None;
        }
        let Rgba([r, g, b, _]) = *raster.get_pixel(x, y);
        Some(Color::rgb(r, g, b))
    }

    /// PNG encoding of the image. The placeholder encodes to no bytes.
    pub fn to_png(&self) -> Result<Vec<u8>, ExchangeError> {
        let Some(raster) = &self.raster else {
            return Ok(Vec::new());
        };

        let mut png = Vec::new();
        raster
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| ExchangeError::EncodingFailed(e.to_string()))?;
        Ok(png)
    }

    /// `data:image/png;base64,...` URL. The placeholder yields an empty string.
    pub fn to_data_url(&self) -> Result<String, ExchangeError> {
        if self.is_placeholder() {
            return Ok(String::new());
        }
        let png = self.to_png()?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

/// Renders `payload` as a QR symbol scaled into a `size x size` raster.
///
/// The symbol is drawn without its own quiet zone and centred on a background
/// canvas, so the margin and the output size are both exact.
pub fn render(payload: &str, options: &RenderOptions) -> Result<QrImage, ExchangeError> {
    let code =
        QrCode::with_error_correction_level(payload.as_bytes(), options.error_correction.into())
            .map_err(|e| ExchangeError::EncodingFailed(e.to_string()))?;

    let modules = u32::try_from(code.width())
        .map_err(|_| ExchangeError::EncodingFailed("symbol too wide".to_string()))?;
    let total = options
        .margin
        .checked_mul(2)
        .and_then(|quiet_zone| quiet_zone.checked_add(modules))
        .ok_or_else(|| {
            ExchangeError::EncodingFailed(format!(
                "a margin of {} modules is too large",
                options.margin
            ))
        })?;
    if total > options.size {
        return Err(ExchangeError::EncodingFailed(format!(
            "{} px is too small for {total} modules",
            options.size
        )));
    }

    // scale * total <= size, so neither term can overflow
    let scale = options.size / total;
    let offset = (options.size - scale * total) / 2 + options.margin * scale;

    let symbol = code
        .render::<Rgba<u8>>()
        .quiet_zone(false)
        .module_dimensions(scale, scale)
        .dark_color(options.foreground.to_rgba())
        .light_color(options.background.to_rgba())
        .build();

    let mut raster =
        RgbaImage::from_pixel(options.size, options.size, options.background.to_rgba());
    imageops::overlay(&mut raster, &symbol, i64::from(offset), i64::from(offset));

    tracing::debug!(modules, scale, size = options.size, "Rendered QR symbol");

    Ok(QrImage {
        raster: Some(raster),
    })
}

/// Like [`render`], but falls back to an empty placeholder so a view never fails on it.
pub fn render_or_placeholder(payload: &str, options: &RenderOptions) -> QrImage {
    render(payload, options).unwrap_or_else(|e| {
        tracing::warn!("QR rendering failed, using placeholder: {e}");
        QrImage::placeholder()
    })
}
