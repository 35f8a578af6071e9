//! QR code rendering

use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

use crate::errors::{Result, TallyError};

/// Default rendered size in pixels
pub const DEFAULT_QR_SIZE: u32 = 256;
const MIN_QR_SIZE: u32 = 64;
const MAX_QR_SIZE: u32 = 2048;

/// Render `payload` as an SVG QR code
///
/// Medium error correction leaves room for a printed logo overlay.
pub fn render_svg(payload: &str, size: Option<u32>) -> Result<String> {
    let size = size.unwrap_or(DEFAULT_QR_SIZE).clamp(MIN_QR_SIZE, MAX_QR_SIZE);
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| TallyError::invalid_request(format!("cannot encode QR payload: {}", e)))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(size, size)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}
