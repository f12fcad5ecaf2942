//! Scannable-code rendering for payment payloads.

use qrcode::QrCode;
use qrcode::render::svg;

use super::request::PaymentError;

/// Renders a payment payload as a machine-scannable representation.
///
/// Implementations must encode the exact payload string with no data loss;
/// the output format (SVG, terminal art, raster image) is theirs to choose.
pub trait CodeRenderer: Send + Sync {
    /// Renders the payload.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Render`] if the payload cannot be encoded.
    fn render(&self, payload: &str) -> Result<String, PaymentError>;
}

/// Default renderer producing an SVG QR code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgQrRenderer {
    /// Minimum edge length of the rendered image, in SVG units.
    pub min_dimensions: u32,
}

impl SvgQrRenderer {
    /// Creates a renderer with the conventional 300-unit minimum size.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_dimensions: 300,
        }
    }
}

impl CodeRenderer for SvgQrRenderer {
    fn render(&self, payload: &str) -> Result<String, PaymentError> {
        let code = QrCode::new(payload.as_bytes()).map_err(|err| PaymentError::Render {
            reason: err.to_string(),
        })?;

        Ok(code
            .render::<svg::Color<'_>>()
            .min_dimensions(self.min_dimensions, self.min_dimensions)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build())
    }
}
