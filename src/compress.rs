//! Upload-time image compression.
//!
//! Originals under the size threshold pass through byte-identical. Larger
//! files are decoded, downscaled so the longer dimension fits the tier's
//! maximum, and re-encoded at the tier's quality; the bigger the original,
//! the smaller the cap and the lower the quality. A failed decode falls back
//! to the original bytes so the upload never fails here.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder, ImageFormat};
use tracing::{debug, warn};

/// Files below this size are never touched.
pub const SIZE_THRESHOLD_BYTES: u64 = 3 * 1024 * 1024;

const MIB: u64 = 1024 * 1024;

/// One size-range-to-(max dimension, quality) mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Originals strictly larger than this many bytes select the tier.
    pub min_bytes: u64,
    /// Cap on the longer output dimension in pixels.
    pub max_dimension: u32,
    /// JPEG re-encode quality (0-100).
    pub jpeg_quality: u8,
}

/// Tiers from most to least aggressive. The last entry is the baseline for
/// anything at or over the threshold.
pub const TIERS: [Tier; 4] = [
    Tier { min_bytes: 20 * MIB, max_dimension: 1200, jpeg_quality: 50 },
    Tier { min_bytes: 10 * MIB, max_dimension: 1300, jpeg_quality: 60 },
    Tier { min_bytes: 5 * MIB, max_dimension: 1400, jpeg_quality: 65 },
    Tier { min_bytes: 0, max_dimension: 1500, jpeg_quality: 70 },
];

/// Pick the tier for an original of `size` bytes, or `None` below threshold.
pub fn tier_for(size: u64) -> Option<Tier> {
    if size < SIZE_THRESHOLD_BYTES {
        return None;
    }
    TIERS.iter().copied().find(|t| size > t.min_bytes)
}

/// Output dimensions after applying a tier's cap. Never upscales.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let ratio = (max_dimension as f64 / width as f64)
        .min(max_dimension as f64 / height as f64)
        .min(1.0);
    (
        ((width as f64 * ratio).round() as u32).max(1),
        ((height as f64 * ratio).round() as u32).max(1),
    )
}

/// Result of preparing a file for upload.
#[derive(Debug, Clone)]
pub struct ProcessedUpload {
    /// Bytes to upload: re-encoded, or the untouched original.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime_type: String,
    /// Pixel dimensions of `bytes`, when the image was decoded.
    pub dimensions: Option<(u32, u32)>,
    /// Whether the original was downscaled/re-encoded.
    pub compressed: bool,
}

impl ProcessedUpload {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn passthrough(bytes: Vec<u8>, mime_type: &str) -> Self {
        Self {
            bytes,
            mime_type: mime_type.to_string(),
            dimensions: None,
            compressed: false,
        }
    }
}

/// Prepare a source file for upload, compressing only when it exceeds the
/// size threshold.
///
/// PNG originals stay PNG (resize only); everything else re-encodes as JPEG
/// at the tier quality with alpha dropped. On any decode or encode failure
/// the original bytes come back unchanged.
pub fn process_upload(bytes: Vec<u8>, declared_mime: &str) -> ProcessedUpload {
    let Some(tier) = tier_for(bytes.len() as u64) else {
        return ProcessedUpload::passthrough(bytes, declared_mime);
    };

    let format = image::guess_format(&bytes).ok();
    let image = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(err) => {
            warn!(%err, "Upload decode failed, keeping original");
            return ProcessedUpload::passthrough(bytes, declared_mime);
        }
    };

    let (w, h) = image.dimensions();
    let (tw, th) = scaled_dimensions(w, h, tier.max_dimension);
    let resized = if (tw, th) == (w, h) {
        image
    } else {
        image.resize_exact(tw, th, FilterType::CatmullRom)
    };

    match encode(&resized, format, tier.jpeg_quality) {
        Ok((encoded, mime)) => {
            debug!(
                original = bytes.len(),
                encoded = encoded.len(),
                w,
                h,
                tw,
                th,
                quality = tier.jpeg_quality,
                "Compressed upload"
            );
            ProcessedUpload {
                bytes: encoded,
                mime_type: mime.to_string(),
                dimensions: Some((tw, th)),
                compressed: true,
            }
        }
        Err(err) => {
            warn!(%err, "Upload re-encode failed, keeping original");
            let mut out = ProcessedUpload::passthrough(bytes, declared_mime);
            out.dimensions = Some((w, h));
            out
        }
    }
}

fn encode(
    image: &DynamicImage,
    format: Option<ImageFormat>,
    quality: u8,
) -> anyhow::Result<(Vec<u8>, &'static str)> {
    let mut buffer = Vec::new();
    if format == Some(ImageFormat::Png) {
        let rgba = image.to_rgba8();
        PngEncoder::new(&mut buffer).write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            ExtendedColorType::Rgba8,
        )?;
        Ok((buffer, "image/png"))
    } else {
        // JPEG has no alpha channel.
        let rgb = image.to_rgb8();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)?;
        Ok((buffer, "image/jpeg"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use xxhash_rust::xxh3::xxh3_64;

    /// Noisy (poorly compressible) image so encoded sizes stay large.
    fn noise_image(w: u32, h: u32) -> RgbaImage {
        let mut img = RgbaImage::new(w, h);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let n = xxh3_64(&[(x & 0xff) as u8, (y & 0xff) as u8, (x ^ y) as u8]);
            *px = Rgba([(n >> 8) as u8, (n >> 16) as u8, (n >> 24) as u8, 255]);
        }
        img
    }

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
            .unwrap();
        buf
    }

    #[test]
    fn test_tier_selection() {
        assert_eq!(tier_for(MIB), None);
        assert_eq!(tier_for(SIZE_THRESHOLD_BYTES - 1), None);
        assert_eq!(tier_for(4 * MIB).unwrap().max_dimension, 1500);
        assert_eq!(tier_for(6 * MIB).unwrap().max_dimension, 1400);
        assert_eq!(tier_for(12 * MIB).unwrap().max_dimension, 1300);
        assert_eq!(tier_for(25 * MIB).unwrap().max_dimension, 1200);
        assert_eq!(tier_for(25 * MIB).unwrap().jpeg_quality, 50);
    }

    #[test]
    fn test_scaled_dimensions_cap_longer_side() {
        assert_eq!(scaled_dimensions(4000, 3000, 1500), (1500, 1125));
        assert_eq!(scaled_dimensions(3000, 4000, 1500), (1125, 1500));
        // Never upscale.
        assert_eq!(scaled_dimensions(800, 600, 1500), (800, 600));
    }

    #[test]
    fn test_small_file_passes_through_byte_identical() {
        let bytes = png_bytes(&noise_image(64, 64));
        assert!((bytes.len() as u64) < SIZE_THRESHOLD_BYTES);
        let original = bytes.clone();
        let out = process_upload(bytes, "image/png");
        assert!(!out.compressed);
        assert_eq!(out.bytes, original);
        assert_eq!(out.mime_type, "image/png");
    }

    #[test]
    fn test_undecodable_file_falls_back_to_original() {
        let bytes = vec![0xabu8; (SIZE_THRESHOLD_BYTES + 1) as usize];
        let original = bytes.clone();
        let out = process_upload(bytes, "image/jpeg");
        assert!(!out.compressed);
        assert_eq!(out.bytes, original);
    }

    #[test]
    fn test_large_png_is_downscaled_within_tier_cap() {
        // Noise compresses poorly: 1800x1800 RGBA lands well over 3 MiB.
        let bytes = png_bytes(&noise_image(1800, 1800));
        assert!(bytes.len() as u64 >= SIZE_THRESHOLD_BYTES, "fixture too small");
        let tier = tier_for(bytes.len() as u64).unwrap();

        let out = process_upload(bytes, "image/png");
        assert!(out.compressed);
        assert_eq!(out.mime_type, "image/png");
        let (w, h) = out.dimensions.unwrap();
        assert!(w.max(h) <= tier.max_dimension);
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (w, h));
    }

    #[test]
    fn test_large_jpeg_reencodes_as_jpeg() {
        let rgb = DynamicImage::ImageRgba8(noise_image(2400, 1600)).to_rgb8();
        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, 100);
        rgb.write_with_encoder(encoder).unwrap();
        if (bytes.len() as u64) < SIZE_THRESHOLD_BYTES {
            // Encoder stayed under the threshold; nothing to compress.
            return;
        }
        let out = process_upload(bytes, "image/jpeg");
        assert!(out.compressed);
        assert_eq!(out.mime_type, "image/jpeg");
        let (w, h) = out.dimensions.unwrap();
        assert!(w.max(h) <= 1500);
    }
}
