//! Photo encoding: raw capture bytes to a base64 JPEG for transport.

use crate::error::ClientError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// JPEG start-of-image marker.
const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Turns captured image bytes into the transport-safe representation.
///
/// JPEG input is forwarded untouched; any other format the `image` crate
/// can decode is flattened to RGB and re-encoded at `jpeg_quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoEncoder {
    jpeg_quality: u8,
}

impl PhotoEncoder {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Normalize to JPEG bytes.
    pub fn to_jpeg(&self, raw: &[u8]) -> Result<Vec<u8>, ClientError> {
        if raw.is_empty() {
            return Err(ClientError::Encode("empty image".into()));
        }
        if raw.starts_with(&JPEG_SOI) {
            return Ok(raw.to_vec());
        }

        let decoded = image::load_from_memory(raw).map_err(|e| ClientError::Encode(e.to_string()))?;
        let rgb = decoded.to_rgb8();

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.jpeg_quality)
            .encode_image(&rgb)
            .map_err(|e| ClientError::Encode(e.to_string()))?;

        tracing::debug!(
            width = rgb.width(),
            height = rgb.height(),
            quality = self.jpeg_quality,
            bytes = out.len(),
            "re-encoded photo as JPEG"
        );
        Ok(out)
    }

    /// Normalize to JPEG and base64-encode (standard alphabet, padded).
    pub fn encode(&self, raw: &[u8]) -> Result<String, ClientError> {
        Ok(STANDARD.encode(self.to_jpeg(raw)?))
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
