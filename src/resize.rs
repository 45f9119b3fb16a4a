//! Aspect-aware resize-and-pad to a fixed set of target resolutions.
//!
//! The bucket with the nearest aspect ratio is chosen, the image is scaled to
//! fit inside it (bicubic) and pasted centred on a canvas filled with the
//! image's average colour.
//!
//! Re-encoding drops any embedded XMP, so resize before embedding.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, Rgb, RgbImage};
use std::path::Path;

use crate::config::ResizeConfig;
use crate::xmp::ImageKind;

/// What [`resize_to_bucket`] did to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Already exactly a target size.
    Unchanged((u32, u32)),
    Resized { from: (u32, u32), to: (u32, u32) },
}

/// Target whose aspect ratio is nearest to `width / height`.
///
/// The first bucket wins ties and buckets with a zero side are ignored.
/// `None` for an empty list or a zero dimension.
pub fn closest_resolution(width: u32, height: u32, buckets: &[(u32, u32)]) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let aspect = width as f64 / height as f64;

    let mut best = None;
    let mut best_diff = f64::INFINITY;
    for &(w, h) in buckets.iter().filter(|(w, h)| *w > 0 && *h > 0) {
        let diff = (w as f64 / h as f64 - aspect).abs();
        if diff < best_diff {
            best_diff = diff;
            best = Some((w, h));
        }
    }
    best
}

/// Largest size with the source's aspect ratio that fits inside `target`.
///
/// Each side is at least 1 and at most the target side; a zero-sized
/// source or target yields `(0, 0)`.
pub fn fit_within(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    if source.0 == 0 || source.1 == 0 || target.0 == 0 || target.1 == 0 {
        return (0, 0);
    }
    let scale = f64::min(
        target.0 as f64 / source.0 as f64,
        target.1 as f64 / source.1 as f64,
    );
    let w = ((source.0 as f64 * scale).round() as u32).clamp(1, target.0);
    let h = ((source.1 as f64 * scale).round() as u32).clamp(1, target.1);
    (w, h)
}

/// Mean colour over all pixels, truncated per channel.
pub fn average_color(img: &RgbImage) -> Rgb<u8> {
    let count = img.width() as u64 * img.height() as u64;
    if count == 0 {
        return Rgb([0, 0, 0]);
    }

    let mut sums = [0u64; 3];
    for px in img.pixels() {
        for (sum, &c) in sums.iter_mut().zip(px.0.iter()) {
            *sum += c as u64;
        }
    }
    Rgb(sums.map(|s| (s / count) as u8))
}

/// Scale `img` into `target` and pad the rest with its average colour.
pub fn resize_and_pad(img: &DynamicImage, target: (u32, u32)) -> RgbImage {
    let rgb = img.to_rgb8();
    let fill = average_color(&rgb);
    let (new_w, new_h) = fit_within(rgb.dimensions(), target);

    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::CatmullRom);
    let mut canvas = RgbImage::from_pixel(target.0, target.1, fill);
    let x = (target.0 - new_w) / 2;
    let y = (target.1 - new_h) / 2;
    imageops::replace(&mut canvas, &resized, x as i64, y as i64);
    canvas
}

fn encode(canvas: &RgbImage, kind: ImageKind, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoded = match kind {
        ImageKind::Jpeg => {
            canvas.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, jpeg_quality))
        }
        ImageKind::Png => canvas.write_with_encoder(PngEncoder::new(&mut buf)),
        ImageKind::WebP => canvas.write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
    };
    encoded.with_context(|| format!("Failed to encode {}", kind.name()))?;
    Ok(buf)
}

/// Resize the image at `path` to its closest target and overwrite it in the
/// same format.
pub fn resize_to_bucket(path: &Path, config: &ResizeConfig) -> Result<ResizeOutcome> {
    let kind = ImageKind::from_path(path)
        .with_context(|| format!("Unsupported image type: {}", path.display()))?;

    let img = ImageReader::open(path)
        .context("Failed to open image")?
        .with_guessed_format()
        .context("Failed to detect image format")?
        .decode()
        .context("Failed to decode image")?;

    let from = (img.width(), img.height());
    let to = closest_resolution(from.0, from.1, &config.resolutions)
        .with_context(|| format!("No target resolution for {}x{}", from.0, from.1))?;

    if from == to {
        return Ok(ResizeOutcome::Unchanged(from));
    }

    let canvas = resize_and_pad(&img, to);
    let bytes = encode(&canvas, kind, config.jpeg_quality)?;
    crate::xmp::write_atomic(path, &bytes).context("Failed to write resized image")?;

    log::debug!("Resized {}: {}x{} -> {}x{}", path.display(), from.0, from.1, to.0, to.1);
    Ok(ResizeOutcome::Resized { from, to })
}
